use std::{path::Path, sync::LazyLock};

use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::{Rotation, RollingFileAppender};
use tracing_subscriber::fmt::format::FmtSpan;

pub const LOG_PREFIX: &str = "stayawake";

fn rolling_appender(prefix: &str, application_data_path: &Path) -> Result<RollingFileAppender> {
    Ok(tracing_appender::rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(5)
        .filename_prefix(prefix)
        .build(application_data_path.join("logs"))?)
}

/// Routes all diagnostics into a rolling file under the application state
/// directory. Stdout stays untouched since it belongs to the interactive
/// console.
pub fn enable_logging(prefix: &str, application_data_path: &Path) -> Result<()> {
    let appender = rolling_appender(prefix, application_data_path)?;

    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(format!(
            "{}={level}",
            env!("CARGO_PKG_NAME").replace("-", "_"),
        )))
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(appender)
        .with_ansi(false)
        .pretty()
        .init();
    Ok(())
}

pub static TEST_LOGGING: LazyLock<()> = LazyLock::new(|| {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .pretty()
        .init()
});
