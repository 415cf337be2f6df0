pub mod error;
pub mod normalize;
pub mod resolve;
pub mod types;

pub use error::{PlanError, PlanReason, PlanResult};
pub use types::{
    AgentSelection, AgentSelectionMode, CriterionOutcome, DataFlowRegistry, DependencyCheck,
    DocumentationTarget, Plan, PlannerCompliance, PromptBlock, QualityControl, RegistryDocTarget,
    RegistryEntry, RuntimeMetadata, StructuredCriterion, Task, TaskResult, TaskStatus, TaskType,
    Verdict, VerificationBlock, Wave,
};
