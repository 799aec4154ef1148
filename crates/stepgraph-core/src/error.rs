use thiserror::Error;

#[derive(Debug, Error)]
pub enum StepgraphError {
    // Graph errors
    #[error("Graph already exists: {0}")]
    AlreadyExists(String),

    #[error("Graph not found: {0}")]
    GraphNotFound(String),

    #[error("Graph has no nodes: {0}")]
    EmptyGraph(String),

    #[error("Invalid graph definition: {0}")]
    InvalidGraph(String),

    // Run errors
    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("max_iterations must be positive (got {0})")]
    InvalidMaxIterations(usize),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Storage errors
    #[error("Database error: {0}")]
    Database(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StepgraphError {
    /// Whether this error is a rejected request rather than an internal failure.
    ///
    /// User errors are raised before anything is written, so the caller can
    /// retry with a corrected request.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyExists(_)
                | Self::GraphNotFound(_)
                | Self::EmptyGraph(_)
                | Self::InvalidGraph(_)
                | Self::RunNotFound(_)
                | Self::InvalidMaxIterations(_)
        )
    }

    /// Whether this error reports a missing graph or run.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::GraphNotFound(_) | Self::RunNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, StepgraphError>;

/// Failure reported by a tool or node-function.
///
/// A step failure never escapes the run: the engine records the message in
/// the trace and stops the loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StepError {
    pub message: String,
}

impl StepError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for StepError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for StepError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for StepError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_error_classification() {
        assert!(StepgraphError::AlreadyExists("g".into()).is_user_error());
        assert!(StepgraphError::EmptyGraph("g".into()).is_user_error());
        assert!(StepgraphError::InvalidMaxIterations(0).is_user_error());
        assert!(!StepgraphError::Database("locked".into()).is_user_error());
        assert!(!StepgraphError::Config("bad".into()).is_user_error());
    }

    #[test]
    fn test_not_found_classification() {
        assert!(StepgraphError::GraphNotFound("g".into()).is_not_found());
        assert!(StepgraphError::RunNotFound("r".into()).is_not_found());
        assert!(!StepgraphError::AlreadyExists("g".into()).is_not_found());
    }

    #[test]
    fn test_step_error_display() {
        let e = StepError::from("division by zero");
        assert_eq!(e.to_string(), "division by zero");
    }
}
