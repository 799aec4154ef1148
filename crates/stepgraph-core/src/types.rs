use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Mutable key/value state shared by the steps of one run.
///
/// Values are JSON so steps can exchange arbitrarily shaped data.
pub type StateMap = serde_json::Map<String, serde_json::Value>;

/// Keys starting with this marker are bookkeeping data and never leave a run.
pub const INTERNAL_KEY_PREFIX: char = '_';

/// State key a step sets to force the next hop.
pub const NEXT_OVERRIDE_KEY: &str = "_next";

/// Whether a state key carries internal control data.
pub fn is_internal_key(key: &str) -> bool {
    key.starts_with(INTERNAL_KEY_PREFIX)
}

/// Unique run identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
