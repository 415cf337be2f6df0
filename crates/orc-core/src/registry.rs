use std::collections::HashSet;

use orion_error::StructError;

use orc_plan::{DataFlowRegistry, Task};

use crate::error::{CoreReason, CoreResult};

const REQUIRED_FEATURE: &str = "data_flow_registry";

// ---------------------------------------------------------------------------
// Registry Validator — checks data-flow producer/consumer references
// against the task graph at plan admission.
// ---------------------------------------------------------------------------

/// Validate `registry` against `tasks` if `required_features` names
/// `data_flow_registry`; a no-op otherwise.
pub fn validate(
    registry: &DataFlowRegistry,
    tasks: &[Task],
    required_features: &[String],
) -> CoreResult<()> {
    if !required_features.iter().any(|f| f == REQUIRED_FEATURE) {
        return Ok(());
    }

    if registry.is_empty() {
        return StructError::from(CoreReason::RegistryViolation)
            .with_detail("data_flow_registry is required but the plan's registry is empty")
            .err();
    }

    let numbers: HashSet<&str> = tasks.iter().map(|t| t.number.as_str()).collect();

    for (symbol, entries) in &registry.producers {
        for entry in entries {
            if !numbers.contains(entry.task.as_str()) {
                return StructError::from(CoreReason::RegistryViolation)
                    .with_detail(format!(
                        "producer of {symbol:?} references unknown task {:?}",
                        entry.task
                    ))
                    .err();
            }
        }
    }

    for (symbol, entries) in &registry.consumers {
        for entry in entries {
            if !numbers.contains(entry.task.as_str()) {
                return StructError::from(CoreReason::RegistryViolation)
                    .with_detail(format!(
                        "consumer of {symbol:?} references unknown task {:?}",
                        entry.task
                    ))
                    .err();
            }
        }
    }

    for (task_number, targets) in &registry.documentation_targets {
        if !numbers.contains(task_number.as_str()) {
            return StructError::from(CoreReason::RegistryViolation)
                .with_detail(format!(
                    "documentation targets reference unknown task {task_number:?}"
                ))
                .err();
        }
        let _ = targets;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_plan::{RegistryDocTarget, RegistryEntry};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn task(number: &str) -> Task {
        Task {
            number: number.to_string(),
            name: String::new(),
            prompt: String::new(),
            files: Vec::new(),
            depends_on: Vec::new(),
            task_type: Default::default(),
            success_criteria: Vec::new(),
            integration_criteria: Vec::new(),
            structured_criteria: Vec::new(),
            test_commands: Vec::new(),
            runtime_metadata: None,
            status: Default::default(),
            completed_at: None,
            agent: None,
            worktree_group: None,
            source_file: PathBuf::new(),
            estimated_time: None,
        }
    }

    #[test]
    fn skipped_when_feature_not_required() {
        let registry = DataFlowRegistry::default();
        assert!(validate(&registry, &[], &[]).is_ok());
    }

    #[test]
    fn empty_registry_fails_when_required() {
        let registry = DataFlowRegistry::default();
        let tasks = vec![task("1")];
        let err = validate(&registry, &tasks, &[REQUIRED_FEATURE.to_string()]);
        assert!(err.is_err());
    }

    #[test]
    fn valid_references_pass() {
        let mut producers = HashMap::new();
        producers.insert(
            "token".to_string(),
            vec![RegistryEntry {
                task: "1".to_string(),
                symbol: None,
                description: None,
            }],
        );
        let mut documentation_targets = HashMap::new();
        documentation_targets.insert(
            "1".to_string(),
            vec![RegistryDocTarget {
                location: PathBuf::from("docs/api.md"),
                section: Some("## Token".to_string()),
            }],
        );
        let registry = DataFlowRegistry {
            producers,
            consumers: HashMap::new(),
            documentation_targets,
        };
        let tasks = vec![task("1")];
        assert!(validate(&registry, &tasks, &[REQUIRED_FEATURE.to_string()]).is_ok());
    }

    #[test]
    fn unknown_producer_task_fails() {
        let mut producers = HashMap::new();
        producers.insert(
            "token".to_string(),
            vec![RegistryEntry {
                task: "99".to_string(),
                symbol: None,
                description: None,
            }],
        );
        let registry = DataFlowRegistry {
            producers,
            consumers: HashMap::new(),
            documentation_targets: HashMap::new(),
        };
        let tasks = vec![task("1")];
        let err = validate(&registry, &tasks, &[REQUIRED_FEATURE.to_string()]);
        assert!(err.is_err());
    }
}
