use anyhow::Result;

/// Unlock triggers and display reads run on separate workers, so the daemon always gets a
/// multi-threaded runtime.
pub fn multi_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}
