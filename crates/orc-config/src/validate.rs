use crate::orchestrator::OrchestratorConfig;

/// Internal validation, called automatically during `OrchestratorConfig::from_str` / `load`.
pub(crate) fn validate(config: &OrchestratorConfig) -> anyhow::Result<()> {
    if config.concurrency.max_concurrency == 0 {
        anyhow::bail!("concurrency.max_concurrency must be > 0");
    }

    if config.concurrency.task_timeout.as_duration().is_zero() {
        anyhow::bail!("concurrency.task_timeout must be > 0");
    }

    if config.concurrency.test_command_timeout.as_duration().is_zero() {
        anyhow::bail!("concurrency.test_command_timeout must be > 0");
    }

    if config.quality_control.enabled && config.quality_control.review_agent.is_none() {
        anyhow::bail!("quality_control.review_agent is required when quality_control.enabled=true");
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_qc_requires_review_agent() {
        let toml = r#"
[quality_control]
enabled = true
"#;
        let err = toml.parse::<OrchestratorConfig>().unwrap_err();
        assert!(err.to_string().contains("review_agent"));
    }
}
