use {
    super::error::SettlementError,
    serde::{Deserialize, Deserializer, Serialize, Serializer},
    std::fmt,
    std::str::FromStr,
};

/// Non-negative amount of BRL centavos. All order totals, wallet balances
/// and credit figures go through this type; floats never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MoneyAmount(i64);

impl MoneyAmount {
    pub const ZERO: MoneyAmount = MoneyAmount(0);
    pub const MAX: MoneyAmount = MoneyAmount(i64::MAX);

    pub fn new(cents: i64) -> Result<Self, SettlementError> {
        if cents < 0 {
            return Err(SettlementError::Validation(format!(
                "MoneyAmount cannot be negative, got: {cents}"
            )));
        }
        Ok(Self(cents))
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: MoneyAmount) -> Option<MoneyAmount> {
        self.0.checked_add(other.0).map(MoneyAmount)
    }

    pub fn checked_sub(self, other: MoneyAmount) -> Option<MoneyAmount> {
        self.0
            .checked_sub(other.0)
            .filter(|&v| v >= 0)
            .map(MoneyAmount)
    }

    /// `self - other`, clamped at zero.
    pub fn saturating_sub(self, other: MoneyAmount) -> MoneyAmount {
        self.checked_sub(other).unwrap_or(MoneyAmount::ZERO)
    }

    pub fn checked_mul(self, quantity: i64) -> Option<MoneyAmount> {
        if quantity < 0 {
            return None;
        }
        self.0.checked_mul(quantity).map(MoneyAmount)
    }

    /// Fraction expressed in basis points (1 bps = 0.01%), rounded half-up
    /// to the centavo.
    pub fn bps(self, basis_points: u32) -> Option<MoneyAmount> {
        let scaled = (self.0 as i128) * (basis_points as i128) + 5_000;
        i64::try_from(scaled / 10_000).ok().map(MoneyAmount)
    }

    /// Parses `"13"`, `"13.5"` or `"13.50"`. More than two fractional digits
    /// is rejected rather than rounded.
    pub fn parse_decimal(s: &str) -> Result<Self, SettlementError> {
        let invalid = || SettlementError::Validation(format!("invalid money amount: {s:?}"));
        let s = s.trim();
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if int_part.is_empty()
            || frac_part.len() > 2
            || !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }
        let units: i64 = int_part.parse().map_err(|_| invalid())?;
        let frac: i64 = match frac_part.len() {
            0 => 0,
            1 => frac_part.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => frac_part.parse().map_err(|_| invalid())?,
        };
        units
            .checked_mul(100)
            .and_then(|c| c.checked_add(frac))
            .map(MoneyAmount)
            .ok_or_else(invalid)
    }

    /// Converts a JSON number from the gateway (`13.5`) into centavos
    /// without passing through binary floating point arithmetic.
    pub fn from_json_number(n: &serde_json::Number) -> Result<Self, SettlementError> {
        if let Some(units) = n.as_i64() {
            return units
                .checked_mul(100)
                .map(MoneyAmount)
                .filter(|m| m.0 >= 0)
                .ok_or_else(|| SettlementError::Validation(format!("invalid amount: {n}")));
        }
        Self::parse_decimal(&n.to_string())
    }

    /// Value for JSON bodies sent to the gateway, which only accepts numbers.
    pub fn to_json_number(self) -> serde_json::Value {
        serde_json::json!(self.0 as f64 / 100.0)
    }
}

impl fmt::Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for MoneyAmount {
    type Err = SettlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_decimal(s)
    }
}

impl Serialize for MoneyAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MoneyAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse_decimal(&raw).map_err(serde::de::Error::custom)
    }
}
