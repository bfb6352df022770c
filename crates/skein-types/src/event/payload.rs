use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDeltaPayload {
    /// Assistant text fragment, never empty.
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolStartPayload {
    /// Stable tool-invocation id assigned by the producer.
    pub tool_id: String,
    /// Tool name as declared by the producer (e.g., "Write", "Bash").
    pub name: String,
    /// Input declared at block start. Often `{}` when input streams as deltas.
    pub input: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInputDeltaPayload {
    /// Stable tool-invocation id (resolved from stream position upstream).
    pub tool_id: String,
    /// Partial-JSON input fragment in arrival order.
    pub partial_input: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultPayload {
    /// Id of the invocation this result belongs to.
    pub tool_id: String,
    /// Tool output (text, JSON string, error message, etc.)
    pub output: String,
    /// Execution success or failure
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPayload {
    /// Invocation that declared the artifact.
    pub tool_id: String,
    /// Producer-declared artifact descriptor (path, mime type, ...).
    pub artifact: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageMetaPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecyclePayload {
    /// Producer session id, non-empty by construction.
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalPayload {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<TurnStats>,
    #[serde(default)]
    pub is_error: bool,
}

/// Token usage reported by the producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    #[serde(default)]
    pub cache_creation_input_tokens: Option<u32>,
    #[serde(default)]
    pub cache_read_input_tokens: Option<u32>,
}

/// Turn-level statistics carried by a terminal result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TurnStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}
