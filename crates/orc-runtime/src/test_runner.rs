use std::path::Path;

use orion_error::StructError;
use tokio_util::sync::CancellationToken;

use orc_plan::Task;

use crate::error::{RuntimeReason, RuntimeResult};
use crate::ports::CommandRunner;

// ---------------------------------------------------------------------------
// Test Command Runner — executes post-task verification commands.
// ---------------------------------------------------------------------------

const OUTPUT_TRUNCATE_LEN: usize = 4096;

/// Truncate `s` to at most `max_len` bytes, backing off to the nearest
/// preceding char boundary so lossy-decoded multibyte output never panics.
fn truncate_at_char_boundary(s: &mut String, max_len: usize) {
    if s.len() <= max_len {
        return;
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

/// Run `task.test_commands` sequentially. Any non-zero exit aborts with
/// `TestCommandFailed`, truncated stdout/stderr included for diagnostics.
pub async fn run(
    task: &Task,
    runner: &dyn CommandRunner,
    repo_root: &Path,
    cancel: &CancellationToken,
) -> RuntimeResult<()> {
    for command in &task.test_commands {
        let outcome = runner.run(command, repo_root, cancel).await;
        if !outcome.succeeded() {
            let mut output = outcome.combined_output;
            truncate_at_char_boundary(&mut output, OUTPUT_TRUNCATE_LEN);
            return StructError::from(RuntimeReason::TestCommandFailed)
                .with_detail(format!(
                    "task {}: command {command:?} exited {}: {output}",
                    task.number, outcome.exit_code
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

    fn task(commands: Vec<&str>) -> Task {
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
            test_commands: commands.into_iter().map(String::from).collect(),
            runtime_metadata: None,
            status: Default::default(),
            completed_at: None,
            agent: None,
            worktree_group: None,
            source_file: PathBuf::new(),
            estimated_time: None,
        }
    }

    #[tokio::test]
    async fn all_commands_pass() {
        let t = task(vec!["cargo test"]);
        let runner = ScriptedRunner {
            responses: Mutex::new(vec![CommandOutcome {
                combined_output: String::new(),
                exit_code: 0,
            }]),
        };
        assert!(run(&t, &runner, Path::new("."), &CancellationToken::new()).await.is_ok());
    }

    #[tokio::test]
    async fn failing_command_aborts() {
        let t = task(vec!["cargo test"]);
        let runner = ScriptedRunner {
            responses: Mutex::new(vec![CommandOutcome {
                combined_output: "FAILED".to_string(),
                exit_code: 1,
            }]),
        };
        assert!(run(&t, &runner, Path::new("."), &CancellationToken::new()).await.is_err());
    }

    #[test]
    fn truncation_backs_off_to_char_boundary() {
        let mut s = "a".repeat(OUTPUT_TRUNCATE_LEN - 1);
        s.push('€');
        s.push('x');
        truncate_at_char_boundary(&mut s, OUTPUT_TRUNCATE_LEN);
        assert_eq!(s.len(), OUTPUT_TRUNCATE_LEN - 1);
        assert!(s.is_char_boundary(s.len()));
    }
}
