use {
    crate::domain::account::{NewLedgerEntry, WalletAccount},
    crate::domain::error::SettlementError,
    crate::domain::invoice::{CreditInvoice, InvoiceStatus},
    crate::domain::money::MoneyAmount,
    chrono::{DateTime, NaiveDate, Utc},
    sqlx::PgPool,
};

const ACCOUNT_COLUMNS: &str =
    "id, wallet_balance_cents, credit_limit_cents, credit_used_cents, credit_due_day";

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: i64,
    wallet_balance_cents: i64,
    credit_limit_cents: i64,
    credit_used_cents: i64,
    credit_due_day: i32,
}

impl TryFrom<AccountRow> for WalletAccount {
    type Error = SettlementError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(WalletAccount {
            user_id: row.id,
            balance: MoneyAmount::new(row.wallet_balance_cents)?,
            credit_limit: MoneyAmount::new(row.credit_limit_cents)?,
            credit_used: MoneyAmount::new(row.credit_used_cents)?,
            credit_due_day: u32::try_from(row.credit_due_day).map_err(|_| {
                SettlementError::Validation(format!("invalid due day: {}", row.credit_due_day))
            })?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct InvoiceRow {
    id: i64,
    user_id: i64,
    amount_cents: i64,
    due_date: NaiveDate,
    status: String,
    paid_at: Option<DateTime<Utc>>,
}

impl TryFrom<InvoiceRow> for CreditInvoice {
    type Error = SettlementError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        Ok(CreditInvoice {
            id: row.id,
            user_id: row.user_id,
            amount: MoneyAmount::new(row.amount_cents)?,
            due_date: row.due_date,
            status: InvoiceStatus::try_from(row.status.as_str())?,
            paid_at: row.paid_at,
        })
    }
}

/// Contact data the gateway needs for a payer.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub cpf: String,
}

/// Row lock on the user's balance/credit fields. Always taken before any
/// order row lock.
pub async fn lock_account(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: i64,
) -> Result<Option<WalletAccount>, SettlementError> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE id = $1 FOR UPDATE");
    let row = sqlx::query_as::<_, AccountRow>(&sql)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;

    row.map(WalletAccount::try_from).transpose()
}

pub async fn get_account(
    pool: &PgPool,
    user_id: i64,
) -> Result<Option<WalletAccount>, SettlementError> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE id = $1");
    let row = sqlx::query_as::<_, AccountRow>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    row.map(WalletAccount::try_from).transpose()
}

pub async fn get_profile(pool: &PgPool, user_id: i64) -> Result<Option<ProfileRow>, SettlementError> {
    let row = sqlx::query_as::<_, ProfileRow>("SELECT id, name, email, cpf FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn set_wallet_balance(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: i64,
    balance: MoneyAmount,
) -> Result<(), SettlementError> {
    sqlx::query("UPDATE users SET wallet_balance_cents = $2 WHERE id = $1")
        .bind(user_id)
        .bind(balance.cents())
        .execute(&mut **tx)
        .await?;

    Ok(())
}

pub async fn set_credit_used(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: i64,
    credit_used: MoneyAmount,
) -> Result<(), SettlementError> {
    sqlx::query("UPDATE users SET credit_used_cents = $2 WHERE id = $1")
        .bind(user_id)
        .bind(credit_used.cents())
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Inserts a ledger row. Returns `false` when a row with the same
/// `gateway_ref` already exists, which is how replays are detected.
pub async fn insert_ledger_entry(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    entry: &NewLedgerEntry,
) -> Result<bool, SettlementError> {
    let inserted: Option<bool> = sqlx::query_scalar(
        r#"
        INSERT INTO wallet_transactions
            (id, user_id, type, amount_cents, related_order_id, gateway_ref, description)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (gateway_ref) DO NOTHING
        RETURNING true
        "#,
    )
    .bind(entry.id)
    .bind(entry.user_id)
    .bind(entry.kind.as_str())
    .bind(entry.amount.cents())
    .bind(entry.related_order_id.map(|id| id.get()))
    .bind(entry.gateway_ref.as_deref())
    .bind(&entry.description)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(inserted.is_some())
}

pub async fn outstanding_invoices<'e, E>(
    executor: E,
    user_id: i64,
) -> Result<Vec<CreditInvoice>, SettlementError>
where
    E: sqlx::PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, InvoiceRow>(
        r#"
        SELECT id, user_id, amount_cents, due_date, status, paid_at
        FROM credit_invoices
        WHERE user_id = $1 AND status IN ('open', 'late')
        ORDER BY due_date
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(CreditInvoice::try_from).collect()
}

pub async fn outstanding_invoice_total(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: i64,
) -> Result<MoneyAmount, SettlementError> {
    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(amount_cents), 0)::BIGINT
        FROM credit_invoices
        WHERE user_id = $1 AND status IN ('open', 'late')
        "#,
    )
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await?;

    MoneyAmount::new(total)
}

pub async fn list_invoices(pool: &PgPool, user_id: i64) -> Result<Vec<CreditInvoice>, SettlementError> {
    let rows = sqlx::query_as::<_, InvoiceRow>(
        r#"
        SELECT id, user_id, amount_cents, due_date, status, paid_at
        FROM credit_invoices
        WHERE user_id = $1
        ORDER BY due_date DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(CreditInvoice::try_from).collect()
}

/// Marks every open/late invoice of the user as paid. Returns the count.
pub async fn settle_outstanding_invoices(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: i64,
) -> Result<u64, SettlementError> {
    let result = sqlx::query(
        r#"
        UPDATE credit_invoices
        SET status = 'paid', paid_at = now()
        WHERE user_id = $1 AND status IN ('open', 'late')
        "#,
    )
    .bind(user_id)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}
