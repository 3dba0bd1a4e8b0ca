//! One measurement record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single line of a report file. `test_keys` is opaque per-test data,
/// carried as a free-form JSON value rather than a fixed schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub test_name: String,
    pub test_version: String,
    /// UTC `YYYY-MM-DD HH:MM:SSZ`.
    pub measurement_start_time: String,
    pub test_runtime: f64,
    pub test_keys: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    pub software_name: String,
    pub software_version: String,
    pub data_format_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_asn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_cc: Option<String>,
}

impl Entry {
    pub fn new(test_name: impl Into<String>, test_version: impl Into<String>, test_keys: Value) -> Self {
        Self {
            test_name: test_name.into(),
            test_version: test_version.into(),
            measurement_start_time: chrono::Utc::now().format("%Y-%m-%d %H:%M:%SZ").to_string(),
            test_runtime: 0.0,
            test_keys,
            input: None,
            software_name: "measurement_kit".to_string(),
            software_version: env!("CARGO_PKG_VERSION").to_string(),
            data_format_version: "0.2.0".to_string(),
            probe_ip: None,
            probe_asn: None,
            probe_cc: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let entry = Entry::new("ndt", "3.7.0", serde_json::json!({}));
        assert_eq!(entry.software_name, "measurement_kit");
        assert_eq!(entry.data_format_version, "0.2.0");
    }
}
