use serde::Deserialize;

use crate::types::HumanDuration;

/// Ambient metrics-exporter configuration. Not a section SPEC_FULL.md names
/// directly, but carried the same way the rest of the ambient stack is:
/// always present, defaulted, parsed the same way as every other section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    #[serde(default = "default_report_interval")]
    pub report_interval: HumanDuration,
    #[serde(default = "default_prometheus_listen")]
    pub prometheus_listen: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            report_interval: default_report_interval(),
            prometheus_listen: default_prometheus_listen(),
        }
    }
}

fn default_report_interval() -> HumanDuration {
    std::time::Duration::from_secs(2).into()
}

fn default_prometheus_listen() -> String {
    "127.0.0.1:9901".to_string()
}
