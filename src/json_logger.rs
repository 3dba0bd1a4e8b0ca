//! Structured JSON logging for jq parsing.
//!
//! Optional companion to [`crate::logger::Logger`]'s `log`/`env_logger`
//! facade: emits one JSON object per line on stdout instead, for callers
//! that pipe engine output into log aggregation tooling.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub component: String,
    pub message: String,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

impl LogEntry {
    pub fn new(level: LogLevel, component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: humantime::format_rfc3339(SystemTime::now()).to_string(),
            level,
            component: component.into(),
            message: message.into(),
            data: serde_json::Value::Null,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn add_field(mut self, key: &str, value: serde_json::Value) -> Self {
        if let serde_json::Value::Object(ref mut map) = self.data {
            map.insert(key.to_string(), value);
        } else {
            let mut map = serde_json::Map::new();
            map.insert(key.to_string(), value);
            self.data = serde_json::Value::Object(map);
        }
        self
    }

    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{json}");
        }
    }
}

pub struct JsonLogger;

impl JsonLogger {
    pub fn debug(component: impl Into<String>, message: impl Into<String>) {
        LogEntry::new(LogLevel::Debug, component, message).emit();
    }

    pub fn debug_data(component: impl Into<String>, message: impl Into<String>, data: serde_json::Value) {
        LogEntry::new(LogLevel::Debug, component, message).with_data(data).emit();
    }

    pub fn info(component: impl Into<String>, message: impl Into<String>) {
        LogEntry::new(LogLevel::Info, component, message).emit();
    }

    pub fn info_data(component: impl Into<String>, message: impl Into<String>, data: serde_json::Value) {
        LogEntry::new(LogLevel::Info, component, message).with_data(data).emit();
    }

    pub fn warn(component: impl Into<String>, message: impl Into<String>) {
        LogEntry::new(LogLevel::Warn, component, message).emit();
    }

    pub fn warn_data(component: impl Into<String>, message: impl Into<String>, data: serde_json::Value) {
        LogEntry::new(LogLevel::Warn, component, message).with_data(data).emit();
    }

    pub fn error(component: impl Into<String>, message: impl Into<String>) {
        LogEntry::new(LogLevel::Error, component, message).emit();
    }

    pub fn error_data(component: impl Into<String>, message: impl Into<String>, data: serde_json::Value) {
        LogEntry::new(LogLevel::Error, component, message).with_data(data).emit();
    }
}

#[macro_export]
macro_rules! jlog_debug {
    ($component:expr, $message:expr) => {
        $crate::json_logger::JsonLogger::debug($component, $message)
    };
    ($component:expr, $message:expr, $data:expr) => {
        $crate::json_logger::JsonLogger::debug_data($component, $message, $data)
    };
}

#[macro_export]
macro_rules! jlog_info {
    ($component:expr, $message:expr) => {
        $crate::json_logger::JsonLogger::info($component, $message)
    };
    ($component:expr, $message:expr, $data:expr) => {
        $crate::json_logger::JsonLogger::info_data($component, $message, $data)
    };
}

#[macro_export]
macro_rules! jlog_warn {
    ($component:expr, $message:expr) => {
        $crate::json_logger::JsonLogger::warn($component, $message)
    };
    ($component:expr, $message:expr, $data:expr) => {
        $crate::json_logger::JsonLogger::warn_data($component, $message, $data)
    };
}

#[macro_export]
macro_rules! jlog_error {
    ($component:expr, $message:expr) => {
        $crate::json_logger::JsonLogger::error($component, $message)
    };
    ($component:expr, $message:expr, $data:expr) => {
        $crate::json_logger::JsonLogger::error_data($component, $message, $data)
    };
}
