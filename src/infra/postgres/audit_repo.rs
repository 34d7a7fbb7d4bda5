use {crate::domain::audit::NewAuditEntry, crate::domain::error::SettlementError};

pub async fn insert_audit_entry<'e, E>(
    executor: E,
    entry: &NewAuditEntry,
) -> Result<(), SettlementError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO audit_log (id, entity_type, entity_id, action, actor, detail)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(entry.id)
    .bind(&entry.entity_type)
    .bind(entry.entity_id.as_deref())
    .bind(&entry.action)
    .bind(&entry.actor)
    .bind(&entry.detail)
    .execute(executor)
    .await?;

    Ok(())
}
