use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use stepgraph_core::error::{Result, StepgraphError};
use stepgraph_core::graph::Graph;
use stepgraph_core::run::RunResult;
use stepgraph_core::traits::{GraphStore, RunStore};

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    m.lock()
        .map_err(|e| StepgraphError::Database(format!("store lock poisoned: {}", e)))
}

/// Process-lifetime graph store.
#[derive(Default)]
pub struct MemoryGraphStore {
    graphs: Mutex<HashMap<String, Arc<Graph>>>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GraphStore for MemoryGraphStore {
    fn put(&self, graph: Graph) -> Result<()> {
        let mut graphs = lock(&self.graphs)?;
        match graphs.entry(graph.id().to_string()) {
            Entry::Occupied(e) => Err(StepgraphError::AlreadyExists(e.key().clone())),
            Entry::Vacant(e) => {
                e.insert(Arc::new(graph));
                Ok(())
            }
        }
    }

    fn get(&self, graph_id: &str) -> Result<Option<Arc<Graph>>> {
        Ok(lock(&self.graphs)?.get(graph_id).cloned())
    }

    fn exists(&self, graph_id: &str) -> Result<bool> {
        Ok(lock(&self.graphs)?.contains_key(graph_id))
    }

    fn list_ids(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = lock(&self.graphs)?.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// Process-lifetime run store.
#[derive(Default)]
pub struct MemoryRunStore {
    inner: Mutex<RunTable>,
}

#[derive(Default)]
struct RunTable {
    runs: HashMap<String, RunResult>,
    order: Vec<(String, String)>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunStore for MemoryRunStore {
    fn put(&self, result: RunResult) -> Result<()> {
        let mut table = lock(&self.inner)?;
        let run_id = result.run_id.0.clone();
        if !table.runs.contains_key(&run_id) {
            table.order.push((result.graph_id.clone(), run_id.clone()));
        }
        table.runs.insert(run_id, result);
        Ok(())
    }

    fn get(&self, run_id: &str) -> Result<Option<RunResult>> {
        Ok(lock(&self.inner)?.runs.get(run_id).cloned())
    }

    fn list_for_graph(&self, graph_id: &str) -> Result<Vec<String>> {
        Ok(lock(&self.inner)?
            .order
            .iter()
            .filter(|(g, _)| g == graph_id)
            .map(|(_, r)| r.clone())
            .collect())
    }
}
