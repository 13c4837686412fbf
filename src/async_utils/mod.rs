//! Asynchronous utilities for use with Tokio.

/// Wrapper around [`tokio::task::spawn_blocking`] that propagates panics from
/// the background task.
///
/// We use this for CPU-bound PDF work, so that parsing a large document
/// doesn't stall the executor.
pub async fn spawn_blocking_propagating_panics<F, T>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(value) => value,
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => panic!("blocking task did not complete: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_value_from_blocking_task() {
        let value = spawn_blocking_propagating_panics(|| 6 * 7).await;
        assert_eq!(value, 42);
    }

    #[tokio::test]
    #[should_panic(expected = "boom")]
    async fn propagates_panics() {
        spawn_blocking_propagating_panics(|| panic!("boom")).await
    }
}
