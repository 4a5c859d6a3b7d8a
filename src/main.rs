use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use switchyard_agent::{
    create_checkpointer, RunLogger, TaskDriver, TaskGraph, TaskQueue, TaskService, WorkerPool,
};
use switchyard_core::config::AppConfig;
use switchyard_core::event::EventBus;
use switchyard_core::traits::TrajectoryStore;
use switchyard_core::types::TaskId;
use switchyard_store::SqliteTrajectoryStore;

#[derive(Parser)]
#[command(
    name = "switchyard",
    version,
    about = "Classify free-text tasks and route them to the right handler"
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "switchyard.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the worker pool and the HTTP gateway
    Serve,
    /// Run a single task in-process and print the result
    Run {
        /// The task prompt (read from stdin when omitted)
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
    },
    /// Print the status of a task as JSON
    Status {
        task_id: String,
    },
    /// Show current configuration with secrets masked
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Everything needed to execute tasks, wired from the config.
struct Runtime {
    store: Arc<SqliteTrajectoryStore>,
    event_bus: Arc<EventBus>,
    driver: Arc<TaskDriver>,
}

impl Runtime {
    fn build(config: &AppConfig) -> anyhow::Result<Self> {
        let store = Arc::new(SqliteTrajectoryStore::open(&config.store_path())?);
        let generator = switchyard_llm::create_generator(config.active_model());
        let search = switchyard_search::create_search_provider(config.web_search.as_ref());
        let checkpointer = create_checkpointer(config)?;
        let event_bus = Arc::new(EventBus::default());
        info!(
            generator = generator.name(),
            search = search.name(),
            store = %config.store_path().display(),
            "Runtime ready"
        );

        let graph = Arc::new(
            TaskGraph::new(store.clone(), generator, search, checkpointer)
                .with_event_bus(event_bus.clone()),
        );
        let driver = Arc::new(TaskDriver::new(graph, store.clone(), event_bus.clone()));
        Ok(Self {
            store,
            event_bus,
            driver,
        })
    }

    /// Start the JSONL run logger if `[log]` is enabled.
    fn spawn_run_logger(
        &self,
        config: &AppConfig,
        cancel: &CancellationToken,
    ) -> Option<JoinHandle<()>> {
        let log_dir = config.log_dir()?;
        let level = config.log.as_ref().map(|l| l.level).unwrap_or(2);
        let logger = RunLogger::new(log_dir, level);
        Some(tokio::spawn(logger.run(self.event_bus.subscribe(), cancel.clone())))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("switchyard=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "switchyard", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config)?;

    match cli.command {
        Some(Commands::Serve) => serve(config).await?,
        Some(Commands::Run { prompt }) => {
            let mut text = prompt.join(" ");
            if text.trim().is_empty() {
                text = io::stdin()
                    .lock()
                    .lines()
                    .map_while(|l| l.ok())
                    .collect::<Vec<_>>()
                    .join("\n");
            }
            run_once(&config, &text).await?;
        }
        Some(Commands::Status { task_id }) => {
            let store = Arc::new(SqliteTrajectoryStore::open(&config.store_path())?);
            // Status lookups never touch the queue
            let (queue, _rx) = TaskQueue::new(1);
            let service = TaskService::new(store, queue);
            let status = service.status(&task_id).await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Some(Commands::Config) => {
            println!("{}", toml::to_string_pretty(&config.masked())?);
        }
        // Handled before config loading
        Some(Commands::Completions { .. }) => {}
        None => {
            Cli::command().print_help()?;
        }
    }

    Ok(())
}

/// Load config from the given path, then `~/.switchyard/config.toml`, then
/// the environment.
fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        return Ok(AppConfig::load(path)?);
    }

    let home_config = dirs_home().map(|h| h.join(".switchyard").join("config.toml"));
    if let Some(home_path) = home_config.filter(|p| p.exists()) {
        info!(path = %home_path.display(), "Loading config from home directory");
        return Ok(AppConfig::load(&home_path)?);
    }

    info!("No config file found, using environment configuration");
    Ok(AppConfig::from_env()?)
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    std::fs::create_dir_all(config.workspace_dir()).ok();
    let runtime = Runtime::build(&config)?;
    let cancel = CancellationToken::new();
    let run_logger = runtime.spawn_run_logger(&config, &cancel);

    let (queue, rx) = TaskQueue::new(config.worker.queue_capacity);
    let service = Arc::new(TaskService::new(runtime.store.clone(), queue));

    let pool = WorkerPool::new(
        runtime.driver.clone(),
        config.worker.concurrency,
        cancel.clone(),
    );
    let workers = tokio::spawn(pool.run(rx));

    // Graceful shutdown on Ctrl-C
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
        cancel_clone.cancel();
    });

    let server = switchyard_gateway::GatewayServer::new(config.gateway.clone(), service);
    let result = server.run(cancel.clone()).await;

    // Stop the workers even if the gateway failed to start
    cancel.cancel();
    if let Err(e) = workers.await {
        error!(error = %e, "Worker pool task failed");
    }
    if let Some(handle) = run_logger {
        handle.await.ok();
    }
    result
}

async fn run_once(config: &AppConfig, prompt: &str) -> anyhow::Result<()> {
    if prompt.trim().is_empty() {
        anyhow::bail!("no prompt given");
    }

    let runtime = Runtime::build(config)?;
    let cancel = CancellationToken::new();
    let run_logger = runtime.spawn_run_logger(config, &cancel);

    let task_id = TaskId::new();
    let outcome = runtime.driver.execute(&task_id, prompt).await;
    // The logger writes everything published so far before it exits
    cancel.cancel();
    if let Some(handle) = run_logger {
        handle.await.ok();
    }
    let state = outcome?;

    println!("{}", state.response);
    println!();
    if let Some(c) = &state.classification {
        println!("Strategy: {} ({})", c.task, c.choice_summary);
    }
    if let Some(err) = &state.search_error {
        println!("Search degraded: {}", err);
    }
    if let Some(record) = runtime.store.get_task(&task_id).await? {
        println!("Trajectory: {}", record.node_names().join(" -> "));
    }
    println!("Task ID: {}", task_id);
    Ok(())
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
