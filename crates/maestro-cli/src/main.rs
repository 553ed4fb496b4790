mod human;
mod plan;

use clap::{Parser, Subcommand};
use human::StdinHumanInterface;
use maestro_compliance::TracingHook;
use maestro_core::{ExecutorId, ExecutorKind, SubtaskId};
use maestro_memory::{FileKnowledgeStore, KnowledgeStore};
use maestro_orchestrator::{
    HumanExecutor, Orchestrator, OrchestratorConfig, PerformanceEntry, PerformanceStore,
};
use maestro_security::{AuditLog, SecurityGate};
use plan::{Plan, ScriptedExecutor, ScriptedReasoning};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "maestro", about = "Maestro: adaptive multi-agent task orchestration")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "maestro.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a plan's subtask graph and executor coverage
    Validate {
        /// Plan file
        plan: PathBuf,
    },
    /// Run a plan and print the task outcome as JSON
    Run {
        /// Plan file
        plan: PathBuf,
        /// Observed quality in [0, 1], fed back to contributing executors
        #[arg(short, long)]
        quality: Option<f64>,
    },
}

#[derive(Deserialize)]
struct MaestroConfig {
    #[serde(default)]
    orchestrator: OrchestratorConfig,
    #[serde(default = "default_data_dir")]
    data_dir: PathBuf,
}

impl Default for MaestroConfig {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

async fn load_config(path: &Path) -> anyhow::Result<MaestroConfig> {
    if !path.exists() {
        info!(path = %path.display(), "config file not found, using defaults");
        return Ok(MaestroConfig::default());
    }
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
    })?;
    let config: MaestroConfig = toml::from_str(&raw)?;
    config.orchestrator.validate()?;
    Ok(config)
}

fn performance_path(data_dir: &Path) -> PathBuf {
    data_dir.join("performance.json")
}

async fn load_performance(data_dir: &Path, alpha: f64) -> anyhow::Result<PerformanceStore> {
    let path = performance_path(data_dir);
    if !path.exists() {
        return Ok(PerformanceStore::new(alpha));
    }
    let raw = tokio::fs::read_to_string(&path).await?;
    let entries: Vec<PerformanceEntry> = serde_json::from_str(&raw)?;
    info!(records = entries.len(), path = %path.display(), "performance records loaded");
    Ok(PerformanceStore::with_records(alpha, entries))
}

async fn save_performance(data_dir: &Path, store: &PerformanceStore) -> anyhow::Result<()> {
    let path = performance_path(data_dir);
    let json = serde_json::to_string_pretty(&store.records())?;
    tokio::fs::write(&path, json).await?;
    info!(records = store.len(), path = %path.display(), "performance records saved");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config).await?;

    match cli.command {
        Commands::Validate { plan } => {
            let plan = Plan::load(&plan)?;
            let report = plan.check()?;
            println!("Plan is valid: {} subtask(s)", plan.subtasks.len());
            for (i, wave) in report.wavefronts.iter().enumerate() {
                let ids: Vec<&str> = wave.iter().map(SubtaskId::as_str).collect();
                println!("  wave {}: {}", i + 1, ids.join(", "));
            }
            println!("Eligible executors:");
            for (subtask, executors) in &report.eligible {
                let ids: Vec<&str> = executors.iter().map(ExecutorId::as_str).collect();
                println!("  {subtask}: {}", ids.join(", "));
            }
        }
        Commands::Run { plan, quality } => {
            let plan = Plan::load(&plan)?;
            plan.check()?;
            tokio::fs::create_dir_all(&config.data_dir).await?;

            let performance = Arc::new(
                load_performance(&config.data_dir, config.orchestrator.alpha).await?,
            );
            let knowledge =
                Arc::new(FileKnowledgeStore::open(config.data_dir.join("knowledge.jsonl")).await?);
            let audit = Arc::new(AuditLog::with_file(config.data_dir.join("audit")));
            let security = Arc::new(SecurityGate::new(
                Arc::new(plan.authorization_policy()),
                audit,
            ));

            let subtask_timeout = config.orchestrator.subtask_timeout();
            let orchestrator =
                Orchestrator::builder(config.orchestrator, Arc::new(ScriptedReasoning::new(&plan)))
                    .performance(performance.clone())
                    .knowledge_store(knowledge.clone())
                    .security(security)
                    .compliance_policy(plan.compliance_policy())
                    .hook(Arc::new(TracingHook))
                    .build()?;

            let human = Arc::new(StdinHumanInterface::stdin());
            for script in &plan.executors {
                let descriptor = Plan::descriptor(script);
                match script.kind {
                    ExecutorKind::Automated => orchestrator
                        .register(descriptor, Arc::new(ScriptedExecutor::new(script.clone())))?,
                    ExecutorKind::Human => orchestrator.register(
                        descriptor,
                        Arc::new(
                            HumanExecutor::new(script.id.clone(), human.clone(), subtask_timeout)
                                .with_bid(script.bid),
                        ),
                    )?,
                }
            }

            let handle = orchestrator.submit(&plan.description, &plan.task_type);
            let task_id = handle.task_id();
            let cancel = tokio::spawn({
                let token = handle.cancel_token();
                async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!(task_id = %task_id, "interrupt received, cancelling task");
                        token.cancel();
                    }
                }
            });
            let outcome = handle.join().await?;
            cancel.abort();

            if let Some(q) = quality {
                let updated = orchestrator.feedback(&outcome, q)?;
                info!(task_id = %task_id, executors = updated.len(), "feedback recorded");
            }
            save_performance(&config.data_dir, &performance).await?;
            if let Err(e) = knowledge.compact().await {
                warn!(error = %e, "knowledge compaction failed");
            }
            info!(entries = knowledge.count().await.unwrap_or_default(), "knowledge store updated");

            let report = serde_json::json!({
                "outcome": outcome,
                "executors": orchestrator.monitor().to_json().await,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);

            if let Some(failure) = &outcome.failure {
                anyhow::bail!("task {task_id} failed ({}): {}", failure.kind, failure.message);
            }
        }
    }

    Ok(())
}
