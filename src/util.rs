use crate::error::ChatError;

/// Run a blocking closure on the spawn_blocking pool and map JoinError.
/// All file I/O in the stores goes through here so async workers never
/// block on disk.
pub async fn blocking<T, F>(f: F) -> Result<T, ChatError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ChatError::Internal(e.to_string()))
}

/// Truncate a string to `max` characters, appending "…" if truncated.
/// Handles multi-byte text correctly via char boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{truncated}…")
    }
}

pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_millis() as i64
}
