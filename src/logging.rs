//! Tracing subscriber bootstrap for binaries and tests.

use tracing_subscriber::{fmt, EnvFilter};

use crate::types::{PageLogError, Result};

/// Installs a global fmt subscriber filtered by `level`.
///
/// `level` accepts any `EnvFilter` directive, such as `info` or
/// `pagelog::recovery=debug,warn`. Fails if a subscriber is already set.
pub fn init_logging(level: &str) -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_new(level)
                .map_err(|e| PageLogError::InvalidOwned(format!("invalid log level: {e}")))?,
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|_| PageLogError::Invalid("logging already initialized"))
}
