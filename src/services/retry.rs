use {
    crate::domain::error::OrderError,
    std::{future::Future, time::Duration},
};

pub const MAX_ATTEMPTS: u32 = 3;

/// Run `attempt` again from scratch while it fails with a retryable storage
/// conflict, up to [`MAX_ATTEMPTS`] times.
pub async fn retry_on_abort<T, F, Fut>(
    operation: &'static str,
    mut attempt: F,
) -> Result<T, OrderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OrderError>>,
{
    let mut tries = 1;
    loop {
        match attempt().await {
            Err(e) if e.is_retryable() && tries < MAX_ATTEMPTS => {
                tracing::warn!(operation, attempt = tries, "transaction aborted, retrying");
                tokio::time::sleep(Duration::from_millis(20 * u64::from(tries))).await;
                tries += 1;
            }
            other => return other,
        }
    }
}
