use derive_more::From;
use orion_error::{ErrorCode, StructError, UvsReason};

#[derive(Debug, Clone, PartialEq, thiserror::Error, From)]
pub enum PlanReason {
    #[error("invalid dependency reference")]
    InvalidDependency,
    #[error("documentation task missing targets")]
    DocTaskMissingTargets,
    #[error("invalid plan compliance declaration")]
    InvalidCompliance,
    #[error("invalid quality control agent selection")]
    InvalidAgentSelection,
    #[error("{0}")]
    Uvs(UvsReason),
}

impl ErrorCode for PlanReason {
    fn error_code(&self) -> i32 {
        match self {
            Self::InvalidDependency => 1001,
            Self::DocTaskMissingTargets => 1003,
            Self::InvalidCompliance => 1004,
            Self::InvalidAgentSelection => 1005,
            Self::Uvs(u) => u.error_code(),
        }
    }
}

pub type PlanError = StructError<PlanReason>;
pub type PlanResult<T> = Result<T, PlanError>;
