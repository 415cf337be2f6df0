pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod types;
pub mod validate;

pub use logging::{LogFormat, LoggingConfig};
pub use metrics::MetricsConfig;
pub use orchestrator::{ConcurrencyConfig, OrchestratorConfig, QualityControlConfig};
pub use types::{ByteSize, HumanDuration};
