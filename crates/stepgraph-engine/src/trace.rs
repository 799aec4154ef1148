use chrono::{SecondsFormat, Utc};
use tracing::debug;

/// Scope used for lines emitted by the engine itself rather than a node.
pub const ENGINE_SCOPE: &str = "engine";

/// Format one trace line: `[<utc timestamp>] [<scope>] <message>`.
pub fn log_line(scope: &str, message: &str) -> String {
    let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
    format!("[{}] [{}] {}", ts, scope, message)
}

/// Append-only trace of a single run.
#[derive(Debug, Default)]
pub struct RunLog {
    lines: Vec<String>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, scope: &str, message: impl AsRef<str>) {
        let message = message.as_ref();
        debug!(scope, message, "run trace");
        self.lines.push(log_line(scope, message));
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

/// Render key names the way trace lines list them: `[a, b]`.
pub fn key_list<S: AsRef<str>>(keys: &[S]) -> String {
    let joined = keys.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", ");
    format!("[{}]", joined)
}
