//! # Host Log Sink
//!
//! The memory manager only talks to the `log` facade. This crate provides
//! the sink used when the core runs on the host: [`HostLogger`] forwards
//! records to standard error, one line per record.
//!
//! ```rust,no_run
//! use log::LevelFilter;
//! use xbox_logger::HostLogger;
//!
//! let level = HostLogger::level_from_env(LevelFilter::Info);
//! HostLogger::new(level).init().expect("logger initialization");
//! log::info!("physical memory manager ready");
//! ```
//!
//! Disabling the default `enabled` feature turns all output into a no-op,
//! while keeping the logger installable.

mod logger;

pub use logger::HostLogger;

#[cfg(feature = "enabled")]
#[doc(hidden)]
pub mod host_fmt {
    use std::fmt;
    use std::io::Write;

    #[doc(hidden)]
    #[inline]
    pub fn host_write(args: fmt::Arguments) {
        // best effort; a closed stderr must not take the emulator down
        let _ = std::io::stderr().lock().write_fmt(args);
    }

    #[doc(hidden)]
    #[inline]
    pub fn host_flush() {
        let _ = std::io::stderr().flush();
    }
}

#[cfg(not(feature = "enabled"))]
#[doc(hidden)]
pub mod host_fmt {
    use std::fmt;

    #[doc(hidden)]
    #[inline]
    pub fn host_write(_: fmt::Arguments) {}

    #[doc(hidden)]
    #[inline]
    pub fn host_flush() {}
}

/// Write formatted text straight to the host sink, bypassing `log`.
#[macro_export]
macro_rules! host_trace {
    ($($arg:tt)*) => {{
        $crate::host_fmt::host_write(::core::format_args!($($arg)*));
    }};
}
