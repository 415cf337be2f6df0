use std::path::Path;

use orion_error::StructError;
use tokio_util::sync::CancellationToken;

use orc_plan::Task;

use crate::error::{RuntimeReason, RuntimeResult};
use crate::ports::CommandRunner;

// ---------------------------------------------------------------------------
// Preflight Runner — executes dependency-check commands before a task.
// ---------------------------------------------------------------------------

/// Run every `RuntimeMetadata.DependencyChecks` command sequentially.
/// First non-zero exit short-circuits the remaining checks.
pub async fn run(
    task: &Task,
    runner: &dyn CommandRunner,
    repo_root: &Path,
    cancel: &CancellationToken,
) -> RuntimeResult<()> {
    let Some(metadata) = &task.runtime_metadata else {
        return Ok(());
    };

    for check in &metadata.dependency_checks {
        orc_info!(sys, task = %task.number, command = %check.command, "running dependency check");
        let outcome = runner.run(&check.command, repo_root, cancel).await;
        if !outcome.succeeded() {
            return StructError::from(RuntimeReason::DependencyCheckFailed)
                .with_detail(format!(
                    "task {}: dependency check {:?} exited {}: {}",
                    task.number, check.command, outcome.exit_code, outcome.combined_output
                ))
                .err();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::CommandOutcome;
    use async_trait::async_trait;
    use orc_plan::{DependencyCheck, RuntimeMetadata};
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct ScriptedRunner {
        responses: Mutex<Vec<CommandOutcome>>,
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, _command: &str, _repo_root: &Path, _cancel: &CancellationToken) -> CommandOutcome {
            self.responses.lock().unwrap().remove(0)
        }
    }

    fn task_with_checks(checks: Vec<DependencyCheck>) -> Task {
        Task {
            number: "1".to_string(),
            name: String::new(),
            prompt: String::new(),
            files: Vec::new(),
            depends_on: Vec::new(),
            task_type: Default::default(),
            success_criteria: Vec::new(),
            integration_criteria: Vec::new(),
            structured_criteria: Vec::new(),
            test_commands: Vec::new(),
            runtime_metadata: Some(RuntimeMetadata {
                dependency_checks: checks,
                documentation_targets: Vec::new(),
                prompt_blocks: Vec::new(),
            }),
            status: Default::default(),
            completed_at: None,
            agent: None,
            worktree_group: None,
            source_file: PathBuf::new(),
            estimated_time: None,
        }
    }

    #[tokio::test]
    async fn all_checks_pass() {
        let task = task_with_checks(vec![DependencyCheck {
            command: "true".to_string(),
            description: None,
        }]);
        let runner = ScriptedRunner {
            responses: Mutex::new(vec![CommandOutcome {
                combined_output: String::new(),
                exit_code: 0,
            }]),
        };
        assert!(run(&task, &runner, Path::new("."), &CancellationToken::new()).await.is_ok());
    }

    #[tokio::test]
    async fn first_failure_short_circuits() {
        let task = task_with_checks(vec![
            DependencyCheck {
                command: "false".to_string(),
                description: None,
            },
            DependencyCheck {
                command: "true".to_string(),
                description: None,
            },
        ]);
        let runner = ScriptedRunner {
            responses: Mutex::new(vec![CommandOutcome {
                combined_output: "boom".to_string(),
                exit_code: 1,
            }]),
        };
        assert!(run(&task, &runner, Path::new("."), &CancellationToken::new()).await.is_err());
    }

    #[tokio::test]
    async fn no_metadata_is_noop() {
        let task = Task {
            runtime_metadata: None,
            ..task_with_checks(Vec::new())
        };
        let runner = ScriptedRunner {
            responses: Mutex::new(Vec::new()),
        };
        assert!(run(&task, &runner, Path::new("."), &CancellationToken::new()).await.is_ok());
    }
}
