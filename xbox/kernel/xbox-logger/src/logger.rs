use crate::host_trace;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::sync::{Mutex, OnceLock, PoisonError};

static LOGGER: OnceLock<HostLogger> = OnceLock::new();
static INSTALLED: Mutex<bool> = Mutex::new(false);

/// `log` sink writing `[LEVEL] target: message` lines to standard error.
#[derive(Debug, Copy, Clone)]
pub struct HostLogger {
    max_level: LevelFilter,
}

impl HostLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self { max_level }
    }

    /// Install the logger as the global `log` sink.
    ///
    /// Calling this again once a `HostLogger` is installed is a no-op that
    /// keeps the first logger, which lets every test call it unconditionally.
    ///
    /// # Errors
    /// Fails, on this and every later call, if a different logger
    /// implementation was installed first.
    pub fn init(self) -> Result<(), SetLoggerError> {
        let mut installed = INSTALLED.lock().unwrap_or_else(PoisonError::into_inner);
        if *installed {
            return Ok(());
        }
        let logger = LOGGER.get_or_init(|| self);
        log::set_logger(logger)?;
        log::set_max_level(logger.max_level);
        *installed = true;
        Ok(())
    }

    /// Level configured from `XBOX_LOG` (`error`..`trace`), or `default`.
    #[must_use]
    pub fn level_from_env(default: LevelFilter) -> LevelFilter {
        std::env::var("XBOX_LOG")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

impl Log for HostLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        host_trace!(
            "[{}] {}: {}\n",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        crate::host_fmt::host_flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    #[test]
    fn level_filtering() {
        let logger = HostLogger::new(LevelFilter::Warn);
        let warn = Metadata::builder().level(Level::Warn).build();
        let debug = Metadata::builder().level(Level::Debug).build();
        assert!(logger.enabled(&warn));
        assert!(!logger.enabled(&debug));
    }

    #[test]
    fn init_is_idempotent() {
        HostLogger::new(LevelFilter::Trace).init().unwrap();
        HostLogger::new(LevelFilter::Error).init().unwrap();
        log::info!("logger installed twice");
    }
}
