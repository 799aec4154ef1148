//! Graph execution engine.
//!
//! A graph is an ordered list of named nodes plus a static edge table. A run
//! starts at the first node and repeatedly executes the current node's step
//! (a registered tool or a caller-supplied node-function), merges the
//! returned mapping into the run state, and resolves the next node: a
//! step-set override first, then the static edge. The loop ends when no next
//! node exists, when the iteration cap is reached, or when a step fails.

pub mod edge;
pub mod engine;
pub mod registry;
pub mod state;
pub mod step;
pub mod trace;

pub use edge::{resolve_next, NextHop};
pub use engine::{GraphEngine, RunOptions, DEFAULT_MAX_ITERATIONS};
pub use registry::ToolRegistry;
pub use state::RunState;
pub use step::{NodeFunctions, StepInvoker, StepOutcome};
pub use trace::RunLog;
