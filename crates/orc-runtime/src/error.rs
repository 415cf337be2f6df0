use derive_more::From;
use orion_error::{ErrorCode, StructError, UvsReason};

use orc_core::CoreReason;

#[derive(Debug, Clone, PartialEq, thiserror::Error, From)]
pub enum RuntimeReason {
    #[error("dependency check failed")]
    DependencyCheckFailed,
    #[error("agent invocation failed")]
    AgentFailed,
    #[error("isolation violation")]
    IsolationViolation,
    #[error("test command failed")]
    TestCommandFailed,
    #[error("documentation section not found")]
    DocSectionNotFound,
    #[error("documentation file missing")]
    DocFileMissing,
    #[error("quality control criteria failed")]
    CriteriaFailed,
    #[error("cancelled")]
    Cancelled,
    #[error("missing or unreadable plan file")]
    PlanUnreadable,
    #[error("{0}")]
    Core(CoreReason),
    #[error("{0}")]
    Uvs(UvsReason),
}

impl ErrorCode for RuntimeReason {
    fn error_code(&self) -> i32 {
        match self {
            Self::DependencyCheckFailed => 2010,
            Self::AgentFailed => 2011,
            Self::IsolationViolation => 2012,
            Self::TestCommandFailed => 2013,
            Self::DocSectionNotFound => 2014,
            Self::DocFileMissing => 2015,
            Self::CriteriaFailed => 2016,
            Self::Cancelled => 2017,
            Self::PlanUnreadable => 2018,
            Self::Core(c) => c.error_code(),
            Self::Uvs(u) => u.error_code(),
        }
    }
}

pub type RuntimeError = StructError<RuntimeReason>;
pub type RuntimeResult<T> = Result<T, RuntimeError>;
