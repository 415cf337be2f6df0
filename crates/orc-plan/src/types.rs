use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TaskType — component / integration / documentation / unspecified
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Component,
    Integration,
    Documentation,
    #[serde(other)]
    Unspecified,
}

impl Default for TaskType {
    fn default() -> Self {
        Self::Unspecified
    }
}

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Skipped,
}

// ---------------------------------------------------------------------------
// Verdict — GREEN / YELLOW / RED
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Green,
    Yellow,
    Red,
}

// ---------------------------------------------------------------------------
// StructuredCriterion — a criterion with an optional machine-checkable block
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationBlock {
    pub command: String,
    pub expected: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredCriterion {
    pub text: String,
    pub verification: Option<VerificationBlock>,
}

// ---------------------------------------------------------------------------
// RuntimeMetadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyCheck {
    pub command: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentationTarget {
    pub location: PathBuf,
    pub section: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptBlock {
    pub block_type: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeMetadata {
    pub dependency_checks: Vec<DependencyCheck>,
    pub documentation_targets: Vec<DocumentationTarget>,
    pub prompt_blocks: Vec<PromptBlock>,
}

// ---------------------------------------------------------------------------
// Task — the unit of scheduling and execution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub number: String,
    pub name: String,
    pub prompt: String,
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default, rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub success_criteria: Vec<String>,
    #[serde(default)]
    pub integration_criteria: Vec<String>,
    #[serde(default)]
    pub structured_criteria: Vec<StructuredCriterion>,
    #[serde(default)]
    pub test_commands: Vec<String>,
    #[serde(default)]
    pub runtime_metadata: Option<RuntimeMetadata>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub worktree_group: Option<String>,
    #[serde(default)]
    pub source_file: PathBuf,
    #[serde(default)]
    pub estimated_time: Option<Duration>,
}

impl Task {
    /// Directory portions of every `.go` file declared by this task — the
    /// package set used by the Wave Scheduler and Package Guard.
    pub fn package_set(&self) -> Vec<PathBuf> {
        let mut packages: Vec<PathBuf> = Vec::new();
        for file in &self.files {
            if file.extension().and_then(|e| e.to_str()) != Some("go") {
                continue;
            }
            if let Some(dir) = file.parent() {
                let dir = dir.to_path_buf();
                if !packages.contains(&dir) {
                    packages.push(dir);
                }
            }
        }
        packages
    }
}

// ---------------------------------------------------------------------------
// QualityControl
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentSelectionMode {
    Auto,
    Explicit,
    Mixed,
    Intelligent,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSelection {
    pub mode: Option<AgentSelectionMode>,
    pub explicit_list: Vec<String>,
    pub blocked: Vec<String>,
    pub additional: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityControl {
    pub enabled: bool,
    pub review_agent: Option<String>,
    /// Plan-level retry-on-red override. `None` = unset (defer to config
    /// fallback); `Some(0)` = explicit opt-out; `Some(n)` = retry budget.
    pub retry_on_red: Option<u32>,
    pub agents: AgentSelection,
    pub stop_on_failure: bool,
}

impl Default for QualityControl {
    fn default() -> Self {
        Self {
            enabled: false,
            review_agent: None,
            retry_on_red: None,
            agents: AgentSelection::default(),
            stop_on_failure: true,
        }
    }
}

// ---------------------------------------------------------------------------
// PlannerCompliance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerCompliance {
    pub planner_version: Option<String>,
    pub strict: bool,
    pub required_features: Vec<String>,
}

// ---------------------------------------------------------------------------
// DataFlowRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub task: String,
    pub symbol: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryDocTarget {
    pub location: PathBuf,
    pub section: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataFlowRegistry {
    pub producers: HashMap<String, Vec<RegistryEntry>>,
    pub consumers: HashMap<String, Vec<RegistryEntry>>,
    pub documentation_targets: HashMap<String, Vec<RegistryDocTarget>>,
}

impl DataFlowRegistry {
    pub fn is_empty(&self) -> bool {
        self.producers.is_empty() && self.consumers.is_empty()
    }

    /// Merge another registry's entries into this one. Lists for the same
    /// symbol concatenate; no deduplication.
    pub fn merge(&mut self, other: DataFlowRegistry) {
        for (symbol, entries) in other.producers {
            self.producers.entry(symbol).or_default().extend(entries);
        }
        for (symbol, entries) in other.consumers {
            self.consumers.entry(symbol).or_default().extend(entries);
        }
        for (task, targets) in other.documentation_targets {
            self.documentation_targets
                .entry(task)
                .or_default()
                .extend(targets);
        }
    }
}

// ---------------------------------------------------------------------------
// Wave
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wave {
    pub index: usize,
    pub task_numbers: Vec<String>,
}

// ---------------------------------------------------------------------------
// Plan — the admitted container
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Plan {
    pub tasks: Vec<Task>,
    pub quality_control: QualityControl,
    pub default_agent: Option<String>,
    pub planner_compliance: PlannerCompliance,
    pub data_flow_registry: DataFlowRegistry,
    pub waves: Vec<Wave>,
    pub file_path: PathBuf,
}

impl Default for Plan {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            quality_control: QualityControl::default(),
            default_agent: None,
            planner_compliance: PlannerCompliance::default(),
            data_flow_registry: DataFlowRegistry::default(),
            waves: Vec::new(),
            file_path: PathBuf::new(),
        }
    }
}

impl Plan {
    pub fn task_by_number(&self, number: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.number == number)
    }
}

// ---------------------------------------------------------------------------
// TaskResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionOutcome {
    pub index: usize,
    pub passed: bool,
    pub evidence: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task: Task,
    pub verdict: Verdict,
    pub output: String,
    pub duration: Duration,
    pub error: Option<String>,
    pub retry_count: u32,
    pub criteria_outcomes: Vec<CriterionOutcome>,
}
