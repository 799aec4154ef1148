pub mod config;
pub mod error;
pub mod graph;
pub mod run;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{Result, StepError, StepgraphError};
pub use graph::{Edge, Graph, GraphDefinition, NodeDef};
pub use run::{RunOutcome, RunResult};
pub use traits::{GraphStore, RunStore, StepFn, StepOutput};
pub use types::*;
