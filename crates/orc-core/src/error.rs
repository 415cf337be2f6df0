use derive_more::From;
use orion_error::{ErrorCode, StructError, UvsReason};

use orc_plan::PlanReason;

#[derive(Debug, Clone, PartialEq, thiserror::Error, From)]
pub enum CoreReason {
    #[error("cyclic dependency")]
    CyclicDependency,
    #[error("package conflict")]
    PackageConflict,
    #[error("registry violation")]
    RegistryViolation,
    #[error("package contention timeout")]
    PackageContention,
    #[error("{0}")]
    Plan(PlanReason),
    #[error("{0}")]
    Uvs(UvsReason),
}

impl ErrorCode for CoreReason {
    fn error_code(&self) -> i32 {
        match self {
            Self::CyclicDependency => 1101,
            Self::PackageConflict => 1102,
            Self::RegistryViolation => 1103,
            Self::PackageContention => 2101,
            Self::Plan(p) => p.error_code(),
            Self::Uvs(u) => u.error_code(),
        }
    }
}

pub type CoreError = StructError<CoreReason>;
pub type CoreResult<T> = Result<T, CoreError>;
