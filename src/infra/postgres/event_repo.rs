use {crate::domain::error::OrderError, crate::domain::gateway::WebhookEvent};

/// Record a verified webhook event for dedup.
/// Returns `true` if inserted, `false` if the event was already recorded.
pub async fn record_event(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event: &WebhookEvent,
) -> Result<bool, OrderError> {
    let inserted: Option<bool> = sqlx::query_scalar(
        r#"
        INSERT INTO processed_events (event_id, event_type, object_id, provider_ts)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (event_id) DO NOTHING
        RETURNING true
        "#,
    )
    .bind(event.id.as_str())
    .bind(&event.event_type)
    .bind(event.intent_id().map(|id| id.as_str()))
    .bind(event.created)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(inserted.is_some())
}
