//! Search results returned by the journal index.

use serde::{Deserialize, Serialize};

/// One matching entry, in backend relevance order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Backend entry id, when the backend reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub transcript: String,

    #[serde(default)]
    pub summary: String,
}
