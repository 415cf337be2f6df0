use orion_error::StructError;

use orc_plan::{AgentSelectionMode, Plan, PlanReason, TaskType};

use crate::error::{CoreReason, CoreResult};
use crate::{registry, scheduler};

// ---------------------------------------------------------------------------
// Plan admission — wires the Dependency Normalizer, Cross-File Resolver,
// Wave Scheduler, Doc Target declaration check, QC agent selection check,
// and Registry Validator into one pass over a loaded plan.
// ---------------------------------------------------------------------------

/// Admit `plan`: validate dependency references, compute waves, check that
/// documentation-typed tasks declare targets, check the QC agent selection,
/// and check the data-flow registry. On success `plan.waves` is populated.
/// Mutates nothing else; the plan's tasks are left as loaded.
pub fn admit(plan: &mut Plan) -> CoreResult<()> {
    orc_plan::resolve::resolve(&plan.tasks)?;

    let waves = scheduler::schedule(&plan.tasks)?;

    check_doc_targets(&plan.tasks)?;
    check_agent_selection(plan)?;

    registry::validate(
        &plan.data_flow_registry,
        &plan.tasks,
        &plan.planner_compliance.required_features,
    )?;

    plan.waves = waves;
    Ok(())
}

/// `explicit` agent-selection mode requires a non-empty `explicit_list`
/// (§4.I); `resolve_agents` relies on this already having been rejected.
fn check_agent_selection(plan: &Plan) -> CoreResult<()> {
    let agents = &plan.quality_control.agents;
    if agents.mode == Some(AgentSelectionMode::Explicit) && agents.explicit_list.is_empty() {
        return StructError::from(CoreReason::Plan(PlanReason::InvalidAgentSelection))
            .with_detail("quality_control.agents: mode=explicit requires a non-empty explicit_list")
            .err();
    }
    Ok(())
}

/// Every `documentation`-typed task must declare at least one
/// `DocumentationTarget`; a hard admission failure otherwise (§4.G/§7).
fn check_doc_targets(tasks: &[orc_plan::Task]) -> CoreResult<()> {
    for task in tasks {
        if task.task_type != TaskType::Documentation {
            continue;
        }
        let has_targets = task
            .runtime_metadata
            .as_ref()
            .is_some_and(|m| !m.documentation_targets.is_empty());
        if !has_targets {
            return StructError::from(CoreReason::Plan(PlanReason::DocTaskMissingTargets))
                .with_detail(format!(
                    "task {}: type documentation declares no DocumentationTargets",
                    task.number
                ))
                .err();
        }
    }
    Ok(())
}
