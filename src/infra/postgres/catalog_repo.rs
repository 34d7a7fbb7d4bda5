use crate::domain::error::SettlementError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CondoRow {
    pub id: i64,
    pub name: String,
    pub fridge_id: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub name: String,
    pub sale_price_cents: i64,
}

pub async fn find_condo(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    condo_id: i64,
) -> Result<Option<CondoRow>, SettlementError> {
    let row = sqlx::query_as::<_, CondoRow>(
        "SELECT id, name, fridge_id FROM condominiums WHERE id = $1",
    )
    .bind(condo_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row)
}

/// Current catalog prices for the given products. Missing ids are simply
/// absent from the result.
pub async fn find_products(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    product_ids: &[i64],
) -> Result<Vec<ProductRow>, SettlementError> {
    let rows = sqlx::query_as::<_, ProductRow>(
        "SELECT id, name, sale_price_cents FROM products WHERE id = ANY($1)",
    )
    .bind(product_ids)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows)
}
