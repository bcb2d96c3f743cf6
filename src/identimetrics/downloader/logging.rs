//! Console logging via `tracing-subscriber`.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

use crate::identimetrics::downloader::error::{DownloaderError, Result};

/// Level used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_LEVEL: &str = "info";

/// Installs the global subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence; `level` is the fallback.
pub fn init(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|err| DownloaderError::Logging(format!("invalid log level '{level}': {err}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .try_init()
        .map_err(|err| DownloaderError::Logging(format!("failed to set subscriber: {err}")))
}
