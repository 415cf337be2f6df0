use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use orc_config::OrchestratorConfig;
use orc_core::PackageGuard;
use orc_plan::Plan;
use orc_runtime::lifecycle::wait_for_signal;
use orc_runtime::ports::{AgentInvoker, CommandRunner, ProcessAgentInvoker, ProcessCommandRunner};
use orc_runtime::tracing_init::init_tracing;
use orc_runtime::{run_waves, WaveExecutorConfig};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "orc", about = "Multi-agent task orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Admit a plan and drive it to completion.
    Run {
        /// Path to orchestrator.toml config file.
        #[arg(short, long)]
        config: PathBuf,
        /// Path to the normalized plan JSON file.
        #[arg(short, long)]
        plan: PathBuf,
    },
}

/// 0 = all GREEN, 1 = any RED, 2 = admission failure, 3 = missing/unreadable plan file.
const EXIT_OK: u8 = 0;
const EXIT_ANY_RED: u8 = 1;
const EXIT_ADMISSION_FAILED: u8 = 2;
const EXIT_PLAN_UNREADABLE: u8 = 3;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, plan } => run(config, plan).await,
    }
}

async fn run(config_path: PathBuf, plan_path: PathBuf) -> Result<ExitCode> {
    let config = OrchestratorConfig::load(&config_path)?;

    let base_dir = config_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let _guard = init_tracing(&config.logging, &base_dir)?;

    let Ok(plan_content) = std::fs::read_to_string(&plan_path) else {
        eprintln!("plan file not found or unreadable: {}", plan_path.display());
        return Ok(ExitCode::from(EXIT_PLAN_UNREADABLE));
    };
    let Ok(mut plan) = serde_json::from_str::<Plan>(&plan_content) else {
        eprintln!("plan file is not valid plan JSON: {}", plan_path.display());
        return Ok(ExitCode::from(EXIT_PLAN_UNREADABLE));
    };
    plan.file_path = plan_path.clone();

    if let Err(e) = orc_core::admit(&mut plan) {
        eprintln!("plan admission failed: {e}");
        return Ok(ExitCode::from(EXIT_ADMISSION_FAILED));
    }

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move { wait_for_signal(signal_cancel).await });

    let retry_budget = orc_runtime::task_executor::effective_retry_budget(
        plan.quality_control.retry_on_red,
        config.quality_control.retry_on_red,
    );

    let repo_root = base_dir.clone();
    let wave_config = WaveExecutorConfig {
        max_concurrency: config.concurrency.max_concurrency,
        task_timeout: config.concurrency.task_timeout.as_duration(),
        default_agent: plan.default_agent.clone(),
        qc_enabled: config.quality_control.enabled && plan.quality_control.enabled,
        review_agent: plan
            .quality_control
            .review_agent
            .clone()
            .or(config.quality_control.review_agent.clone()),
        retry_budget,
        skip_completed: true,
        cancel_wave_on_red: plan.quality_control.stop_on_failure,
    };

    let agent_invoker: Arc<dyn AgentInvoker> = Arc::new(ProcessAgentInvoker {
        binary: "agent".to_string(),
    });
    let command_runner: Arc<dyn CommandRunner> = Arc::new(ProcessCommandRunner);
    let package_guard = PackageGuard::new();

    let outcome = run_waves(
        &plan,
        &wave_config,
        agent_invoker,
        command_runner,
        &repo_root,
        &package_guard,
        cancel,
    )
    .await;

    let mut total = 0usize;
    let mut completed = 0usize;
    let mut failed = 0usize;
    let mut status_breakdown: std::collections::BTreeMap<String, usize> =
        std::collections::BTreeMap::new();
    for wave in &outcome.waves {
        for (_, result) in &wave.results {
            total += 1;
            let key = format!("{:?}", result.verdict).to_lowercase();
            *status_breakdown.entry(key).or_insert(0) += 1;
            match result.verdict {
                orc_plan::Verdict::Red => failed += 1,
                _ => completed += 1,
            }
        }
    }

    let summary = serde_json::json!({
        "total": total,
        "completed": completed,
        "failed": failed,
        "status_breakdown": status_breakdown,
    });
    println!("{summary}");

    if outcome.any_red {
        Ok(ExitCode::from(EXIT_ANY_RED))
    } else {
        Ok(ExitCode::from(EXIT_OK))
    }
}
