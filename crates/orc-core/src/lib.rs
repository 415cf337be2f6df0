pub mod admission;
pub mod error;
pub mod package_guard;
pub mod registry;
pub mod scheduler;

pub use admission::admit;
pub use error::{CoreError, CoreReason, CoreResult};
pub use package_guard::{PackageGuard, PackageLease};
pub use scheduler::schedule;
