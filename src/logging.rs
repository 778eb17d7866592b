//! Log subscriber installation.
//!
//! Components only emit `tracing` events. Where those events go is decided
//! once by the embedding application through a [`LogConfig`] handed to
//! [`init`].

use crate::error::{Error, Result};

use tracing_subscriber::EnvFilter;

/// Settings for the `fmt` subscriber installed by [`init`].
#[derive(Clone, Debug)]
pub struct LogConfig {
    /// An `EnvFilter` directive such as `info` or `netbase=trace`.
    pub filter: String,
    pub ansi: bool,
    pub with_target: bool,
    pub with_thread_names: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
            ansi: true,
            with_target: true,
            with_thread_names: true,
        }
    }
}

impl LogConfig {
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }
}

/// Installs the global subscriber described by `config`.
///
/// Fails with [`Error::Logging`] if the filter directive does not parse or a
/// subscriber is already installed.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter =
        EnvFilter::try_new(&config.filter).map_err(|error| Error::Logging(error.to_string()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(config.with_target)
        .with_thread_names(config.with_thread_names)
        .try_init()
        .map_err(|error| Error::Logging(error.to_string()))
}
