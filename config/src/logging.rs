//! Subscriber setup shared by the `acp` binaries.
//!
//! - **RUST_LOG**: filter, e.g. `info`, `acp=debug,acp::model=debug`. Default: `info`.
//! - **ACP_LOG_DIR**: when set, events are also appended to a daily-rolling `acp.log` in this
//!   directory (plain text, no ANSI).
//!
//! Console output goes to stderr so stdout stays clean for JSON results.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub const LOG_DIR_ENV: &str = "ACP_LOG_DIR";
const LOG_FILE_PREFIX: &str = "acp.log";

/// Installs the global subscriber. Keep the returned guard alive for the life of the
/// process; dropping it flushes and stops the file writer.
pub fn init() -> Result<Option<WorkerGuard>, tracing_subscriber::util::TryInitError> {
    let dir = std::env::var_os(LOG_DIR_ENV).filter(|d| !d.is_empty());
    init_with(dir.as_deref().map(Path::new))
}

pub fn init_with(
    log_dir: Option<&Path>,
) -> Result<Option<WorkerGuard>, tracing_subscriber::util::TryInitError> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter());

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter());
            tracing_subscriber::registry()
                .with(console)
                .with(file)
                .try_init()?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(console).try_init()?;
            Ok(None)
        }
    }
}
