use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use orion_error::StructError;
use tokio_util::sync::CancellationToken;

use orc_core::PackageGuard;
use orc_plan::{CriterionOutcome, Task, TaskType, Verdict};

use crate::error::{RuntimeReason, RuntimeResult};
use crate::ports::{AgentInvoker, CommandRunner};
use crate::{doc_verify, isolation, preflight, qc_reviewer, test_runner};

// ---------------------------------------------------------------------------
// Task Executor — one task's end-to-end lifecycle (§4.J).
// ---------------------------------------------------------------------------

/// Effective retry-on-red budget resolution per the decided tri-state
/// fallback chain: plan value if set, else config value if set, else 2.
pub fn effective_retry_budget(plan_value: Option<u32>, config_value: Option<u32>) -> u32 {
    plan_value.or(config_value).unwrap_or(2)
}

/// All per-task collaborators, owned or `Arc`-shared so a context can be
/// cloned cheaply into a spawned task without borrowing from its caller.
#[derive(Clone)]
pub struct ExecutorContext {
    pub package_guard: PackageGuard,
    pub agent_invoker: Arc<dyn AgentInvoker>,
    pub command_runner: Arc<dyn CommandRunner>,
    pub repo_root: PathBuf,
    pub default_agent: Option<String>,
    pub qc_enabled: bool,
    pub review_agent: Option<String>,
    pub retry_budget: u32,
    pub task_timeout: Duration,
    pub cancel: CancellationToken,
    pub all_tasks: Arc<Vec<Task>>,
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub verdict: Verdict,
    pub output: String,
    pub error: Option<String>,
    pub retry_count: u32,
    pub criteria_outcomes: Vec<CriterionOutcome>,
    pub duration: Duration,
}

/// Run one task to completion, including retry-on-red. Bypassed entirely
/// (synthetic GREEN, output "Skipped") when `skip_completed` is set and
/// the task's stored status is already `completed`.
pub async fn execute(task: &Task, ctx: &ExecutorContext, skip_completed: bool) -> ExecutionResult {
    let start = Instant::now();

    if skip_completed && task.status == orc_plan::TaskStatus::Completed {
        return ExecutionResult {
            verdict: Verdict::Green,
            output: "Skipped".to_string(),
            error: None,
            retry_count: 0,
            criteria_outcomes: Vec::new(),
            duration: start.elapsed(),
        };
    }

    match run_lifecycle(task, ctx).await {
        Ok(result) => ExecutionResult {
            duration: start.elapsed(),
            ..result
        },
        Err(e) => ExecutionResult {
            verdict: Verdict::Red,
            output: String::new(),
            error: Some(e.to_string()),
            retry_count: 0,
            criteria_outcomes: Vec::new(),
            duration: start.elapsed(),
        },
    }
}

async fn run_lifecycle(task: &Task, ctx: &ExecutorContext) -> RuntimeResult<ExecutionResult> {
    let packages = task.package_set();

    // Step 1: package acquisition.
    let acquired = tokio::time::timeout(
        ctx.task_timeout,
        ctx.package_guard.acquire(&task.number, &packages, &ctx.cancel),
    )
    .await;
    let _lease = match acquired {
        Ok(result) => result?,
        Err(_) => {
            return StructError::from(RuntimeReason::Core(orc_core::CoreReason::PackageContention))
                .with_detail(format!(
                    "task {}: timed out acquiring packages {:?}",
                    task.number, packages
                ))
                .err();
        }
    };

    // Step 2: preflight.
    let preflight_result = tokio::time::timeout(
        ctx.task_timeout,
        preflight::run(task, ctx.command_runner.as_ref(), &ctx.repo_root, &ctx.cancel),
    )
    .await;
    match preflight_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            return Ok(ExecutionResult {
                verdict: Verdict::Red,
                output: String::new(),
                error: Some(e.to_string()),
                retry_count: 0,
                criteria_outcomes: Vec::new(),
                duration: Duration::ZERO,
            });
        }
        Err(_) => return Ok(timed_out_result(task)),
    }

    let agent_name = task
        .agent
        .as_deref()
        .or(ctx.default_agent.as_deref())
        .unwrap_or("default");

    let mut retry_count = 0u32;
    let mut feedback: Option<String> = None;

    loop {
        // Steps 3-4: dependency context + target-files injection.
        let prompt = build_prompt(task, &ctx.all_tasks, feedback.as_deref());

        // Step 5: agent invocation.
        let before = isolation::changed_files(ctx.command_runner.as_ref(), &ctx.repo_root, &ctx.cancel).await;
        let invoke_result = tokio::time::timeout(
            ctx.task_timeout,
            ctx.agent_invoker
                .invoke(agent_name, &prompt, &ctx.repo_root, &ctx.cancel),
        )
        .await;
        let outcome = match invoke_result {
            Ok(outcome) => outcome,
            Err(_) => return Ok(timed_out_result(task)),
        };
        if !outcome.succeeded() {
            return StructError::from(RuntimeReason::AgentFailed)
                .with_detail(format!(
                    "task {}: agent {agent_name:?} exited {}",
                    task.number, outcome.exit_code
                ))
                .err();
        }

        // Step 6: isolation audit.
        let after = isolation::changed_files(ctx.command_runner.as_ref(), &ctx.repo_root, &ctx.cancel).await;
        let newly_changed: std::collections::HashSet<PathBuf> =
            after.difference(&before).cloned().collect();
        let isolation_check = isolation::audit(task, &newly_changed);

        let mut verdict = Verdict::Green;
        let mut last_error = None;

        if let Err(e) = isolation_check {
            verdict = Verdict::Red;
            last_error = Some(e.to_string());
        }

        // Step 7: test commands.
        if verdict != Verdict::Red {
            let test_result = tokio::time::timeout(
                ctx.task_timeout,
                test_runner::run(task, ctx.command_runner.as_ref(), &ctx.repo_root, &ctx.cancel),
            )
            .await;
            match test_result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    verdict = Verdict::Red;
                    last_error = Some(e.to_string());
                }
                Err(_) => return Ok(timed_out_result(task)),
            }
        }

        // Step 8: documentation targets.
        let mut doc_failed = false;
        if verdict != Verdict::Red {
            for target in doc_verify::verify(task, &ctx.repo_root) {
                if !target.passed {
                    doc_failed = true;
                    last_error = target.error;
                }
            }
            if doc_failed {
                verdict = Verdict::Red;
            }
        }

        let mut criteria_outcomes = Vec::new();

        // Step 9: QC review.
        if verdict != Verdict::Red && ctx.qc_enabled {
            if let Some(review_agent) = ctx.review_agent.as_deref() {
                let review_result = tokio::time::timeout(
                    ctx.task_timeout,
                    qc_reviewer::review(
                        task,
                        &outcome.stdout,
                        review_agent,
                        ctx.agent_invoker.as_ref(),
                        &ctx.repo_root,
                        &ctx.cancel,
                    ),
                )
                .await;
                match review_result {
                    Ok(Ok(review)) => {
                        verdict = review.verdict;
                        criteria_outcomes = review.criteria_outcomes;
                        feedback = Some(review.feedback);
                    }
                    Ok(Err(e)) => {
                        verdict = Verdict::Red;
                        last_error = Some(e.to_string());
                    }
                    Err(_) => return Ok(timed_out_result(task)),
                }
            }
        }

        if verdict != Verdict::Red {
            orc_info!(exec, task = %task.number, retries = retry_count, "task green");
            return Ok(ExecutionResult {
                verdict,
                output: outcome.stdout,
                error: None,
                retry_count,
                criteria_outcomes,
                duration: Duration::ZERO,
            });
        }

        // Step 10: retry-on-red.
        if retry_count >= ctx.retry_budget {
            orc_warn!(exec, task = %task.number, retries = retry_count, "task red, retries exhausted");
            return Ok(ExecutionResult {
                verdict: Verdict::Red,
                output: outcome.stdout,
                error: last_error,
                retry_count,
                criteria_outcomes,
                duration: Duration::ZERO,
            });
        }
        retry_count += 1;
        orc_warn!(exec, task = %task.number, retry = retry_count, "retrying after RED");
    }
    // Step 11 (release) happens on `_lease` drop at function exit.
}

/// Build a RED result for a suspension point that ran past `task_timeout`,
/// using the otherwise-unused `Cancelled` reason (§5 deadline enforcement).
fn timed_out_result(task: &Task) -> ExecutionResult {
    orc_warn!(exec, task = %task.number, "task timed out");
    let err = StructError::from(RuntimeReason::Cancelled)
        .with_detail(format!("task {}: exceeded task_timeout", task.number));
    ExecutionResult {
        verdict: Verdict::Red,
        output: String::new(),
        error: Some(err.to_string()),
        retry_count: 0,
        criteria_outcomes: Vec::new(),
        duration: Duration::ZERO,
    }
}

fn build_prompt(task: &Task, all_tasks: &[Task], feedback: Option<&str>) -> String {
    let mut prompt = String::new();

    if task.task_type == TaskType::Integration {
        prompt.push_str("## INTEGRATION TASK CONTEXT\n");
        prompt.push_str("Read these upstream dependency files before writing:\n");
        for dep in &task.depends_on {
            let Some(parsed) = orc_plan::normalize::parse(dep) else {
                continue;
            };
            let pred_number = match parsed {
                orc_plan::normalize::DepRef::Local(id) => id,
                orc_plan::normalize::DepRef::CrossFile { task: id, .. } => id,
            };
            if let Some(upstream) = all_tasks.iter().find(|t| t.number == pred_number) {
                for file in &upstream.files {
                    prompt.push_str(&format!("- {}\n", file.display()));
                }
            }
        }
        prompt.push('\n');
    }

    prompt.push_str("## Target Files (REQUIRED)\n");
    for file in &task.files {
        prompt.push_str(&format!("- {}\n", file.display()));
    }
    prompt.push('\n');

    if let Some(feedback) = feedback {
        prompt.push_str(&format!("## PREVIOUS REVIEW FEEDBACK\n{feedback}\n\n"));
    }

    prompt.push_str(&task.prompt);
    prompt
}
