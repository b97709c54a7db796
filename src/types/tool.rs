//! Tool call types

use serde::{Deserialize, Serialize};

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// JSON-encoded arguments, exactly as produced upstream.
    pub arguments: String,
}
