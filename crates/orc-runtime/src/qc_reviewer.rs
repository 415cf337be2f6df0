use std::path::Path;

use orion_error::StructError;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use orc_plan::{AgentSelection, AgentSelectionMode, CriterionOutcome, Task, TaskType, Verdict};

use crate::error::{RuntimeReason, RuntimeResult};
use crate::ports::AgentInvoker;

// ---------------------------------------------------------------------------
// QC Reviewer — builds the structured review prompt, parses the verdict,
// and enforces per-criterion pass/fail against the declared criteria.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub verdict: Verdict,
    pub feedback: String,
    pub criteria_outcomes: Vec<CriterionOutcome>,
}

#[derive(Debug, Deserialize)]
struct RawVerdictResponse {
    verdict: String,
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    criteria_results: Vec<RawCriterionResult>,
}

#[derive(Debug, Deserialize)]
struct RawCriterionResult {
    index: usize,
    passed: bool,
    #[serde(default)]
    evidence: String,
}

/// Build the structured review prompt per §4.I: task metadata, agent
/// output, a numbered `## SUCCESS CRITERIA` section, and — for
/// integration-typed tasks only — a `## INTEGRATION CRITERIA` section
/// continuing the same numbering.
pub fn build_prompt(task: &Task, agent_output: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!(
        "## TASK\nNumber: {}\nName: {}\nType: {:?}\n\n{}\n\n",
        task.number, task.name, task.task_type, task.prompt
    ));
    prompt.push_str(&format!("## AGENT OUTPUT\n{agent_output}\n\n"));

    let mut index = 0usize;
    prompt.push_str("## SUCCESS CRITERIA\n");
    for criterion in &task.success_criteria {
        prompt.push_str(&format!("{index}. {criterion}\n"));
        index += 1;
    }
    for criterion in &task.structured_criteria {
        prompt.push_str(&format!("{index}. {}\n", criterion.text));
        index += 1;
    }

    if task.task_type == TaskType::Integration {
        prompt.push_str("\n## INTEGRATION CRITERIA\n");
        for criterion in &task.integration_criteria {
            prompt.push_str(&format!("{index}. {criterion}\n"));
            index += 1;
        }
    }

    prompt.push_str(
        "\nReturn a JSON object: {\"verdict\": \"GREEN|YELLOW|RED\", \"feedback\": string, \
         \"criteria_results\": [{\"index\": int, \"passed\": bool, \"evidence\": string}, ...]}\n",
    );
    prompt
}

/// Run the QC review: invoke `review_agent` with the structured prompt and
/// parse its response. Any criterion failing downgrades the verdict to
/// RED regardless of the declared verdict; an empty `criteria_results`
/// while criteria were declared is itself RED.
pub async fn review(
    task: &Task,
    agent_output: &str,
    review_agent: &str,
    invoker: &dyn AgentInvoker,
    repo_root: &Path,
    cancel: &CancellationToken,
) -> RuntimeResult<ReviewOutcome> {
    let prompt = build_prompt(task, agent_output);
    let outcome = invoker.invoke(review_agent, &prompt, repo_root, cancel).await;
    if !outcome.succeeded() {
        return StructError::from(RuntimeReason::AgentFailed)
            .with_detail(format!(
                "task {}: QC review agent {review_agent:?} exited {}",
                task.number, outcome.exit_code
            ))
            .err();
    }

    parse(task, &outcome.stdout)
}

fn parse(task: &Task, raw_output: &str) -> RuntimeResult<ReviewOutcome> {
    let Some(json) = extract_json_object(raw_output) else {
        return StructError::from(RuntimeReason::CriteriaFailed)
            .with_detail(format!(
                "task {}: QC response did not contain a JSON object",
                task.number
            ))
            .err();
    };

    let parsed: RawVerdictResponse = match serde_json::from_str(json) {
        Ok(p) => p,
        Err(e) => {
            return StructError::from(RuntimeReason::CriteriaFailed)
                .with_detail(format!("task {}: malformed QC response: {e}", task.number))
                .err();
        }
    };

    let declared_verdict = match parsed.verdict.trim().to_ascii_uppercase().as_str() {
        "GREEN" => Verdict::Green,
        "YELLOW" => Verdict::Yellow,
        _ => Verdict::Red,
    };

    let total_criteria = task.success_criteria.len()
        + task.structured_criteria.len()
        + if task.task_type == TaskType::Integration {
            task.integration_criteria.len()
        } else {
            0
        };

    let criteria_outcomes: Vec<CriterionOutcome> = parsed
        .criteria_results
        .into_iter()
        .map(|r| CriterionOutcome {
            index: r.index,
            passed: r.passed,
            evidence: r.evidence,
        })
        .collect();

    let any_failed = criteria_outcomes.iter().any(|c| !c.passed);
    let empty_despite_criteria = total_criteria > 0 && criteria_outcomes.is_empty();

    let verdict = if any_failed || empty_despite_criteria {
        Verdict::Red
    } else {
        declared_verdict
    };

    Ok(ReviewOutcome {
        verdict,
        feedback: parsed.feedback,
        criteria_outcomes,
    })
}

/// Extract the first top-level `{...}` object from free-form agent text.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0i32;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Resolve the effective agent list for `selection`, applying the block
/// list and (for `mixed`/`intelligent`) the additional-agents list.
/// Case-insensitive, whitespace-trimmed mode normalization; an invalid
/// mode literal or an `explicit` mode with an empty list is a validation
/// error caught at plan admission, not here.
pub fn resolve_agents(selection: &AgentSelection) -> Vec<String> {
    let mut agents = match selection.mode {
        Some(AgentSelectionMode::Explicit) => selection.explicit_list.clone(),
        Some(AgentSelectionMode::Mixed) | Some(AgentSelectionMode::Intelligent) => {
            let mut list = selection.explicit_list.clone();
            list.extend(selection.additional.iter().cloned());
            list
        }
        Some(AgentSelectionMode::Auto) | None => selection.explicit_list.clone(),
    };
    agents.retain(|a| !selection.blocked.contains(a));
    agents
}
