#[macro_use]
mod log_macros;

pub mod doc_verify;
pub mod error;
pub mod isolation;
pub mod lifecycle;
pub mod metrics;
pub mod ports;
pub mod preflight;
pub mod qc_reviewer;
pub mod task_executor;
pub mod test_runner;
pub mod tracing_init;
pub mod wave_executor;

pub use error::{RuntimeError, RuntimeReason, RuntimeResult};
pub use wave_executor::{run as run_waves, RunOutcome, WaveExecutorConfig, WaveOutcome};
