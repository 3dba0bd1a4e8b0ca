//! Thin logging facade bracketing protocol-runner phases.
//!
//! Forwards to the process-wide `log`/`env_logger` facade. Components take a
//! `Logger` by value (it is `Clone`, zero-sized beyond an optional component
//! tag) rather than reaching for a hidden global — `Logger::default()` is
//! the final fallback.

use std::fmt;

#[derive(Debug, Clone, Default)]
pub struct Logger {
    component: Option<&'static str>,
}

impl Logger {
    pub fn for_component(component: &'static str) -> Self {
        Self { component: Some(component) }
    }

    fn tag(&self) -> &str {
        self.component.unwrap_or("engine")
    }

    pub fn in_progress(&self, what: &str) {
        log::debug!("[{}] {} ...", self.tag(), what);
    }

    pub fn complete(&self, what: &str, err: Option<&crate::error::Error>) {
        match err {
            None => log::debug!("[{}] {} - ok", self.tag(), what),
            Some(e) => log::warn!("[{}] {} - failed: {}", self.tag(), what, e),
        }
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        log::info!("[{}] {}", self.tag(), args);
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        log::warn!("[{}] {}", self.tag(), args);
    }
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.info(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.warn(format_args!($($arg)*))
    };
}
