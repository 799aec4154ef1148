use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use tracing::info;

use stepgraph_core::graph::GraphDefinition;
use stepgraph_core::run::RunResult;
use stepgraph_core::types::StateMap;

use crate::error::ApiError;
use crate::state::AppState;

// GET /api/health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// POST /graph/create
pub async fn create_graph(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GraphDefinition>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(definition) = payload?;
    let graph_id = state.engine.create_graph(definition)?;
    Ok(Json(serde_json::json!({ "graph_id": graph_id })))
}

#[derive(Deserialize)]
pub struct RunRequest {
    pub graph_id: String,
    #[serde(default)]
    pub state: StateMap,
    #[serde(default)]
    pub max_iterations: Option<usize>,
}

// POST /graph/run
pub async fn run_graph(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(body) = payload?;
    let mut options = state
        .engine
        .default_options()
        .with_node_functions(state.node_functions.clone());
    if let Some(max) = body.max_iterations {
        options = options.with_max_iterations(max);
    }

    info!(graph_id = %body.graph_id, "Run requested");
    let engine = state.engine.clone();
    let result = tokio::task::spawn_blocking(move || engine.run(&body.graph_id, &body.state, &options))
        .await
        .map_err(|e| ApiError::internal(format!("run task failed: {}", e)))??;

    Ok(Json(serde_json::json!({
        "run_id": result.run_id,
        "final_state": result.state,
        "log": result.log,
        "finished": result.finished,
        "outcome": result.outcome,
    })))
}

// GET /graph/state/{run_id}
pub async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Json<RunResult>, ApiError> {
    Ok(Json(state.engine.get_run(&run_id)?))
}

// GET /graphs
pub async fn list_graphs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let ids = state.engine.list_graphs()?;
    Ok(Json(serde_json::json!({ "graphs": ids })))
}

// GET /graphs/{graph_id}/runs
pub async fn graph_runs(
    State(state): State<Arc<AppState>>,
    Path(graph_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.engine.get_graph(&graph_id)?;
    let runs = state.engine.runs_for_graph(&graph_id)?;
    Ok(Json(serde_json::json!({ "graph_id": graph_id, "runs": runs })))
}
