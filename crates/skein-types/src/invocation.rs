use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of a tool execution, attached once observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub output: String,
    #[serde(default)]
    pub is_error: bool,
}

/// One tool invocation tracked across its streaming lifetime.
///
/// The producer assigns the stable `id` at block start; before that, input
/// fragments on the wire reference only the transient stream `position`. The
/// position is a turn-scoped correlation token, never a global counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub position: u32,
    pub name: String,

    /// Input declared at block start (often `{}` when input streams).
    pub input: Value,

    /// Partial-JSON input fragments in arrival order.
    #[serde(default)]
    pub fragments: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolOutcome>,
}

impl ToolInvocation {
    pub fn new(id: String, position: u32, name: String, input: Value) -> Self {
        Self {
            id,
            position,
            name,
            input,
            fragments: Vec::new(),
            result: None,
        }
    }

    pub fn push_fragment(&mut self, fragment: &str) {
        self.fragments.push(fragment.to_string());
    }

    /// Resolve the effective input: the parsed fragment stream when fragments
    /// exist, the declared input otherwise. Returns `(input, malformed)`;
    /// a fragment stream that is not valid JSON degrades to a raw string
    /// value with `malformed = true`.
    pub fn resolved_input(&self) -> (Value, bool) {
        if self.fragments.is_empty() {
            return (self.input.clone(), false);
        }

        let raw: String = self.fragments.concat();
        match serde_json::from_str(&raw) {
            Ok(value) => (value, false),
            Err(_) => (Value::String(raw), true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolved_input_prefers_fragments() {
        let mut invocation =
            ToolInvocation::new("t1".to_string(), 2, "Write".to_string(), json!({}));
        invocation.push_fragment("{\"file_path\":");
        invocation.push_fragment("\"notes.md\"}");

        let (input, malformed) = invocation.resolved_input();
        assert!(!malformed);
        assert_eq!(input, json!({"file_path": "notes.md"}));
    }

    #[test]
    fn test_resolved_input_falls_back_to_declared() {
        let invocation = ToolInvocation::new(
            "t1".to_string(),
            0,
            "Bash".to_string(),
            json!({"command": "ls"}),
        );

        let (input, malformed) = invocation.resolved_input();
        assert!(!malformed);
        assert_eq!(input, json!({"command": "ls"}));
    }

    #[test]
    fn test_resolved_input_malformed_fragments_degrade() {
        let mut invocation =
            ToolInvocation::new("t1".to_string(), 1, "Write".to_string(), json!({}));
        invocation.push_fragment("{\"truncated");

        let (input, malformed) = invocation.resolved_input();
        assert!(malformed);
        assert_eq!(input, Value::String("{\"truncated".to_string()));
    }
}
