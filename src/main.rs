use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stepgraph_core::config::{AppConfig, StorageBackend};
use stepgraph_core::error::StepgraphError;
use stepgraph_core::graph::GraphDefinition;
use stepgraph_core::traits::{GraphStore, RunStore};
use stepgraph_core::types::StateMap;
use stepgraph_engine::GraphEngine;
use stepgraph_store::{MemoryGraphStore, MemoryRunStore, SqliteStore};

#[derive(Parser)]
#[command(name = "stepgraph", version, about = "Run workflows as graphs of steps over shared state")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "stepgraph.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve,
    /// Create a graph from a JSON definition file
    Create {
        /// Path to the graph definition
        file: PathBuf,
    },
    /// Run a stored graph and print the result
    Run {
        /// Graph to execute
        graph_id: String,
        /// Initial state as a JSON object
        #[arg(long, default_value = "{}")]
        state: String,
        /// Step bound for this run
        #[arg(long)]
        max_iterations: Option<usize>,
    },
    /// Show a stored run
    Show {
        run_id: String,
    },
    /// List stored graphs
    Graphs,
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("stepgraph=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "stepgraph", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config)?;
    let engine = Arc::new(build_engine(&config)?);
    stepgraph_workflows::register_tools(engine.tools());

    if config.workflows.seed_code_review {
        stepgraph_workflows::seed_graphs(&engine)?;
    }

    match cli.command {
        Some(Commands::Serve) | None => {
            info!(bind = %config.gateway.bind, "Starting HTTP gateway");
            let server = stepgraph_gateway::GatewayServer::new(
                config.gateway.clone(),
                engine,
                stepgraph_workflows::node_functions(),
            );
            let cancel = tokio_util::sync::CancellationToken::new();
            let cancel_clone = cancel.clone();

            // Graceful shutdown on Ctrl-C
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutting down gateway...");
                cancel_clone.cancel();
            });

            server.run(cancel).await?;
        }
        Some(Commands::Create { file }) => {
            warn_if_ephemeral(&config);
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let definition: GraphDefinition = serde_json::from_str(&content)?;
            let graph_id = engine.create_graph(definition)?;
            println!("{}", serde_json::json!({ "graph_id": graph_id }));
        }
        Some(Commands::Run {
            graph_id,
            state,
            max_iterations,
        }) => {
            let initial: StateMap = serde_json::from_str(&state)
                .context("--state must be a JSON object")?;
            let mut options = engine
                .default_options()
                .with_node_functions(stepgraph_workflows::node_functions());
            if let Some(max) = max_iterations {
                options = options.with_max_iterations(max);
            }
            let result = engine.run(&graph_id, &initial, &options)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Some(Commands::Show { run_id }) => {
            let result = engine.get_run(&run_id)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Some(Commands::Graphs) => {
            for graph_id in engine.list_graphs()? {
                println!("{}", graph_id);
            }
        }
        Some(Commands::Config) => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        // Handled before config loading
        Some(Commands::Completions { .. }) => {}
    }

    Ok(())
}

/// Load the config file, falling back to defaults when it does not exist.
fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    match AppConfig::load(path) {
        Ok(config) => {
            info!(path = %path.display(), "Loaded config");
            Ok(config)
        }
        Err(StepgraphError::ConfigNotFound(_)) => {
            warn!(path = %path.display(), "No config file found; using defaults");
            Ok(AppConfig::default())
        }
        Err(e) => Err(e.into()),
    }
}

fn build_engine(config: &AppConfig) -> anyhow::Result<GraphEngine> {
    let (graphs, runs): (Arc<dyn GraphStore>, Arc<dyn RunStore>) = match config.storage.backend {
        StorageBackend::Memory => (
            Arc::new(MemoryGraphStore::new()),
            Arc::new(MemoryRunStore::new()),
        ),
        StorageBackend::Sqlite => {
            let db_path = config.database_path();
            info!(path = %db_path.display(), "Opening SQLite store");
            let store = Arc::new(SqliteStore::open(&db_path)?);
            (store.clone(), store)
        }
    };

    Ok(GraphEngine::new(graphs, runs).with_default_max_iterations(config.engine.max_iterations))
}

fn warn_if_ephemeral(config: &AppConfig) {
    if config.storage.backend == StorageBackend::Memory {
        warn!("storage.backend is memory; the graph is discarded when this command exits");
    }
}
