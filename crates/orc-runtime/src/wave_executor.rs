use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use orc_core::PackageGuard;
use orc_plan::{Plan, TaskResult, Verdict, Wave};

use crate::ports::{AgentInvoker, CommandRunner};
use crate::task_executor::{self, ExecutorContext};

// ---------------------------------------------------------------------------
// Wave Executor — drives a plan's waves to completion, one wave at a time,
// running each wave's tasks concurrently bounded by `max_concurrency`.
// ---------------------------------------------------------------------------

pub struct WaveExecutorConfig {
    pub max_concurrency: usize,
    pub task_timeout: Duration,
    pub default_agent: Option<String>,
    pub qc_enabled: bool,
    pub review_agent: Option<String>,
    pub retry_budget: u32,
    pub skip_completed: bool,
    /// Stop launching new tasks in the current wave once a RED verdict is
    /// observed. Tasks already in flight are allowed to finish.
    pub cancel_wave_on_red: bool,
}

pub struct WaveOutcome {
    pub wave_index: usize,
    pub results: Vec<(String, TaskResult)>,
    pub any_red: bool,
    pub duration: Duration,
}

pub struct RunOutcome {
    pub waves: Vec<WaveOutcome>,
    pub any_red: bool,
}

/// Drive every wave in `plan.waves` to completion, short-circuiting before
/// the next wave starts if the previous wave produced any RED verdict.
pub async fn run(
    plan: &Plan,
    config: &WaveExecutorConfig,
    agent_invoker: Arc<dyn AgentInvoker>,
    command_runner: Arc<dyn CommandRunner>,
    repo_root: &std::path::Path,
    package_guard: &PackageGuard,
    cancel: CancellationToken,
) -> RunOutcome {
    let all_tasks = Arc::new(plan.tasks.clone());
    let mut outcomes = Vec::new();
    let mut any_red_overall = false;

    for wave in &plan.waves {
        if cancel.is_cancelled() {
            break;
        }
        let outcome = run_wave(
            wave,
            plan,
            &all_tasks,
            config,
            Arc::clone(&agent_invoker),
            Arc::clone(&command_runner),
            repo_root.to_path_buf(),
            package_guard,
            cancel.child_token(),
        )
        .await;
        any_red_overall |= outcome.any_red;
        let stop = outcome.any_red;
        outcomes.push(outcome);
        if stop {
            break;
        }
    }

    RunOutcome {
        waves: outcomes,
        any_red: any_red_overall,
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_wave(
    wave: &Wave,
    plan: &Plan,
    all_tasks: &Arc<Vec<orc_plan::Task>>,
    config: &WaveExecutorConfig,
    agent_invoker: Arc<dyn AgentInvoker>,
    command_runner: Arc<dyn CommandRunner>,
    repo_root: PathBuf,
    package_guard: &PackageGuard,
    wave_cancel: CancellationToken,
) -> WaveOutcome {
    let start = Instant::now();
    let semaphore = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
    let mut join_set = JoinSet::new();

    for task_number in &wave.task_numbers {
        let Some(task) = plan.tasks.iter().find(|t| &t.number == task_number) else {
            continue;
        };
        let task = task.clone();
        let semaphore = Arc::clone(&semaphore);
        let task_cancel = wave_cancel.child_token();
        let cancel_on_red = wave_cancel.clone();
        let cancel_wave_on_red = config.cancel_wave_on_red;
        let skip_completed = config.skip_completed;

        let ctx = ExecutorContext {
            package_guard: package_guard.clone(),
            agent_invoker: Arc::clone(&agent_invoker),
            command_runner: Arc::clone(&command_runner),
            repo_root: repo_root.clone(),
            default_agent: config.default_agent.clone(),
            qc_enabled: config.qc_enabled,
            review_agent: config.review_agent.clone(),
            retry_budget: config.retry_budget,
            task_timeout: config.task_timeout,
            cancel: task_cancel.clone(),
            all_tasks: Arc::clone(all_tasks),
        };

        join_set.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(p) => p,
                Err(_) => return None,
            };
            if task_cancel.is_cancelled() {
                return None;
            }

            let exec = task_executor::execute(&task, &ctx, skip_completed).await;

            let number = task.number.clone();
            let task_result = TaskResult {
                task,
                verdict: exec.verdict,
                output: exec.output,
                duration: exec.duration,
                error: exec.error,
                retry_count: exec.retry_count,
                criteria_outcomes: exec.criteria_outcomes,
            };

            if exec.verdict == Verdict::Red && cancel_wave_on_red {
                cancel_on_red.cancel();
            }

            Some((number, task_result))
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(Some(pair)) => results.push(pair),
            Ok(None) => {}
            Err(e) => orc_warn!(wave, error = %e, "task execution panicked"),
        }
    }

    let any_red = results
        .iter()
        .any(|(_, r)| matches!(r.verdict, Verdict::Red));

    WaveOutcome {
        wave_index: wave.index,
        results,
        any_red,
        duration: start.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{AgentOutcome, CommandOutcome};
    use async_trait::async_trait;
    use orc_core::PackageGuard;
    use orc_plan::{Plan, Task, TaskType};
    use std::path::Path;

    struct AlwaysGreenAgent;

    #[async_trait]
    impl AgentInvoker for AlwaysGreenAgent {
        async fn invoke(
            &self,
            _agent: &str,
            _prompt: &str,
            _repo_root: &Path,
            _cancel: &CancellationToken,
        ) -> AgentOutcome {
            AgentOutcome {
                stdout: "done".to_string(),
                exit_code: 0,
            }
        }
    }

    struct NoopRunner;

    #[async_trait]
    impl CommandRunner for NoopRunner {
        async fn run(&self, _command: &str, _repo_root: &Path, _cancel: &CancellationToken) -> CommandOutcome {
            CommandOutcome {
                combined_output: String::new(),
                exit_code: 0,
            }
        }
    }

    fn task(number: &str) -> Task {
        Task {
            number: number.to_string(),
            name: String::new(),
            prompt: String::new(),
            files: Vec::new(),
            depends_on: Vec::new(),
            task_type: TaskType::Component,
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

    #[tokio::test]
    async fn single_wave_all_tasks_execute_and_go_green() {
        let tasks = vec![task("1"), task("2")];
        let waves = vec![Wave {
            index: 0,
            task_numbers: vec!["1".to_string(), "2".to_string()],
        }];
        let plan = Plan {
            tasks,
            waves,
            ..Default::default()
        };
        let config = WaveExecutorConfig {
            max_concurrency: 2,
            task_timeout: Duration::from_secs(5),
            default_agent: Some("default".to_string()),
            qc_enabled: false,
            review_agent: None,
            retry_budget: 0,
            skip_completed: false,
            cancel_wave_on_red: true,
        };
        let outcome = run(
            &plan,
            &config,
            Arc::new(AlwaysGreenAgent),
            Arc::new(NoopRunner),
            Path::new("."),
            &PackageGuard::new(),
            CancellationToken::new(),
        )
        .await;
        assert!(!outcome.any_red);
        assert_eq!(outcome.waves.len(), 1);
        assert_eq!(outcome.waves[0].results.len(), 2);
    }
}
