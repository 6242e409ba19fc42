use anyhow::Result;

/// The whole application runs on one OS thread. This matters for the
/// execution-state strategy, which asserts per-thread state that must always
/// be issued and reset from the same thread.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
