use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use stepgraph_core::config::GatewayConfig;
use stepgraph_engine::{GraphEngine, NodeFunctions};

use crate::routes;
use crate::state::AppState;

/// Build the HTTP routes over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(routes::health))
        .route("/graph/create", post(routes::create_graph))
        .route("/graph/run", post(routes::run_graph))
        .route("/graph/state/{run_id}", get(routes::get_run))
        .route("/graphs", get(routes::list_graphs))
        .route("/graphs/{graph_id}/runs", get(routes::graph_runs))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// HTTP gateway server built on axum.
pub struct GatewayServer {
    config: GatewayConfig,
    engine: Arc<GraphEngine>,
    node_functions: NodeFunctions,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, engine: Arc<GraphEngine>, node_functions: NodeFunctions) -> Self {
        Self {
            config,
            engine,
            node_functions,
        }
    }

    /// Run the gateway server until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let state = Arc::new(AppState {
            engine: self.engine.clone(),
            node_functions: self.node_functions.clone(),
        });

        let listener = TcpListener::bind(&self.config.bind).await?;
        info!(bind = %self.config.bind, "Gateway listening");

        axum::serve(listener, router(state))
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}
