use {
    super::error::SettlementError,
    super::money::MoneyAmount,
    chrono::{DateTime, Datelike, NaiveDate, Utc},
    serde::Serialize,
    std::fmt,
};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Open,
    Late,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Late => "late",
            Self::Paid => "paid",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for InvoiceStatus {
    type Error = SettlementError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "open" => Ok(Self::Open),
            "late" => Ok(Self::Late),
            "paid" => Ok(Self::Paid),
            other => Err(SettlementError::Validation(format!(
                "unknown invoice status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreditInvoice {
    pub id: i64,
    pub user_id: i64,
    pub amount: MoneyAmount,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Rate constants for [`charges`], in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceRates {
    pub service_fee_bps: u32,
    pub daily_late_fee_bps: u32,
}

impl Default for InvoiceRates {
    fn default() -> Self {
        Self {
            service_fee_bps: 1_000,
            daily_late_fee_bps: 250,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InvoiceCharges {
    pub principal: MoneyAmount,
    pub service_fee: MoneyAmount,
    pub interest: MoneyAmount,
    pub total: MoneyAmount,
}

impl InvoiceCharges {
    pub fn zero() -> Self {
        Self {
            principal: MoneyAmount::ZERO,
            service_fee: MoneyAmount::ZERO,
            interest: MoneyAmount::ZERO,
            total: MoneyAmount::ZERO,
        }
    }

    pub fn checked_add(self, other: InvoiceCharges) -> Option<InvoiceCharges> {
        Some(Self {
            principal: self.principal.checked_add(other.principal)?,
            service_fee: self.service_fee.checked_add(other.service_fee)?,
            interest: self.interest.checked_add(other.interest)?,
            total: self.total.checked_add(other.total)?,
        })
    }
}

/// The one place fees and late interest are computed. Interest accrues per
/// whole day strictly after `due_date`.
pub fn charges(
    principal: MoneyAmount,
    due_date: NaiveDate,
    evaluated_on: NaiveDate,
    rates: InvoiceRates,
) -> Result<InvoiceCharges, SettlementError> {
    let overflow = || SettlementError::Validation("invoice charges overflow".into());

    let service_fee = principal.bps(rates.service_fee_bps).ok_or_else(overflow)?;
    let days_late = (evaluated_on - due_date).num_days().max(0);
    let daily = u32::try_from(days_late)
        .ok()
        .and_then(|d| d.checked_mul(rates.daily_late_fee_bps))
        .ok_or_else(overflow)?;
    let interest = principal.bps(daily).ok_or_else(overflow)?;
    let total = principal
        .checked_add(service_fee)
        .and_then(|t| t.checked_add(interest))
        .ok_or_else(overflow)?;

    Ok(InvoiceCharges {
        principal,
        service_fee,
        interest,
        total,
    })
}

/// Next billing due date for a day-of-month, clamped to short months. A due
/// date equal to `today` is still current.
pub fn next_due_date(due_day: u32, today: NaiveDate) -> Option<NaiveDate> {
    let this_month = clamped_date(today.year(), today.month(), due_day)?;
    if today <= this_month {
        return Some(this_month);
    }
    let (year, month) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };
    clamped_date(year, month, due_day)
}

fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last_day = first_of_next.pred_opt()?.day();
    NaiveDate::from_ymd_opt(year, month, day.clamp(1, last_day))
}
