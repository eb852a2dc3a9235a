//! Event source identity

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identity of anything that can originate events
///
/// Drivers, applications, the UI and the system itself are all nodes. A node
/// carries nothing beyond its identifier; ids are opaque and compared
/// case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Node {
    id: Arc<str>,
}

impl Node {
    /// Create a node with the given identifier
    pub fn new(id: impl AsRef<str>) -> Self {
        Self {
            id: Arc::from(id.as_ref()),
        }
    }

    /// The node representing the system core
    pub fn system() -> Self {
        Self::new("system")
    }

    /// The node representing user interface clients
    pub fn ui() -> Self {
        Self::new("ui")
    }

    /// Get the node identifier
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl From<&str> for Node {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Node {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
