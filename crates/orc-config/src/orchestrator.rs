use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use orc_plan::{AgentSelection, AgentSelectionMode};

use crate::logging::LoggingConfig;
use crate::metrics::MetricsConfig;
use crate::types::HumanDuration;
use crate::validate;

// ---------------------------------------------------------------------------
// Raw TOML structure (intermediate representation)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OrchestratorConfigRaw {
    quality_control: QualityControlConfig,
    concurrency: ConcurrencyConfig,
    logging: LoggingConfig,
    metrics: MetricsConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct QualityControlConfig {
    pub enabled: bool,
    pub review_agent: Option<String>,
    /// `None` = unset, `Some(0)` = explicit opt-out, `Some(n)` = retry budget.
    pub retry_on_red: Option<u32>,
    pub agents: AgentSelection,
}

impl Default for QualityControlConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            review_agent: None,
            retry_on_red: None,
            agents: AgentSelection::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    pub max_concurrency: usize,
    pub task_timeout: HumanDuration,
    pub test_command_timeout: HumanDuration,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            task_timeout: std::time::Duration::from_secs(600).into(),
            test_command_timeout: std::time::Duration::from_secs(120).into(),
        }
    }
}

// ---------------------------------------------------------------------------
// OrchestratorConfig (resolved, validated)
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct OrchestratorConfig {
    pub quality_control: QualityControlConfig,
    pub concurrency: ConcurrencyConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

impl OrchestratorConfig {
    /// Read and parse an `orchestrator.toml` file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.as_ref().display()))?;
        content.parse()
    }
}

impl FromStr for OrchestratorConfig {
    type Err = anyhow::Error;

    fn from_str(toml_str: &str) -> anyhow::Result<Self> {
        let raw: OrchestratorConfigRaw = toml::from_str(toml_str)?;

        let config = OrchestratorConfig {
            quality_control: raw.quality_control,
            concurrency: raw.concurrency,
            logging: raw.logging,
            metrics: raw.metrics,
        };

        validate::validate(&config)?;

        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const FULL_TOML: &str = r#"
[quality_control]
enabled = true
review_agent = "qc-reviewer"
retry_on_red = 2

[quality_control.agents]
mode = "explicit"
explicit_list = ["claude-sonnet", "claude-opus"]
blocked = ["legacy-agent"]
additional = []

[concurrency]
max_concurrency = 8
task_timeout = "10m"
test_command_timeout = "2m"

[logging]
level = "debug"
format = "json"
"#;

    #[test]
    fn load_full_toml() {
        let cfg: OrchestratorConfig = FULL_TOML.parse().unwrap();

        assert!(cfg.quality_control.enabled);
        assert_eq!(
            cfg.quality_control.review_agent.as_deref(),
            Some("qc-reviewer")
        );
        assert_eq!(cfg.quality_control.retry_on_red, Some(2));
        assert_eq!(
            cfg.quality_control.agents.mode,
            Some(AgentSelectionMode::Explicit)
        );
        assert_eq!(
            cfg.quality_control.agents.explicit_list,
            vec!["claude-sonnet", "claude-opus"]
        );
        assert_eq!(cfg.quality_control.agents.blocked, vec!["legacy-agent"]);

        assert_eq!(cfg.concurrency.max_concurrency, 8);
        assert_eq!(
            cfg.concurrency.task_timeout.as_duration(),
            Duration::from_secs(600)
        );
        assert_eq!(
            cfg.concurrency.test_command_timeout.as_duration(),
            Duration::from_secs(120)
        );

        assert_eq!(cfg.logging.level, "debug");
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let cfg: OrchestratorConfig = "".parse().unwrap();
        assert!(!cfg.quality_control.enabled);
        assert_eq!(cfg.concurrency.max_concurrency, 4);
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.metrics.enabled);
    }

    #[test]
    fn reject_zero_max_concurrency() {
        let toml = FULL_TOML.replace("max_concurrency = 8", "max_concurrency = 0");
        let err = toml.parse::<OrchestratorConfig>().unwrap_err();
        assert!(err.to_string().contains("max_concurrency"));
    }

    #[test]
    fn reject_unknown_agent_selection_mode() {
        let toml = FULL_TOML.replace(r#"mode = "explicit""#, r#"mode = "whatever""#);
        assert!(toml.parse::<OrchestratorConfig>().is_err());
    }

    #[test]
    fn reject_zero_test_command_timeout() {
        let toml = FULL_TOML.replace(r#"test_command_timeout = "2m""#, r#"test_command_timeout = "0s""#);
        let err = toml.parse::<OrchestratorConfig>().unwrap_err();
        assert!(err.to_string().contains("test_command_timeout"));
    }

    #[test]
    fn reject_zero_task_timeout() {
        let toml = FULL_TOML.replace(r#"task_timeout = "10m""#, r#"task_timeout = "0s""#);
        let err = toml.parse::<OrchestratorConfig>().unwrap_err();
        assert!(err.to_string().contains("task_timeout"));
    }
}
