use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Author of a record's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "tool" => Some(Role::Tool),
            _ => None,
        }
    }
}

/// Persisted record kind. Doubles as the node type of reconstructed trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    UserText,
    ToolInvocation,
    ToolResult,
    AssistantText,
    Artifact,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::UserText => "user_text",
            RecordKind::ToolInvocation => "tool_invocation",
            RecordKind::ToolResult => "tool_result",
            RecordKind::AssistantText => "assistant_text",
            RecordKind::Artifact => "artifact",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user_text" => Some(RecordKind::UserText),
            "tool_invocation" => Some(RecordKind::ToolInvocation),
            "tool_result" => Some(RecordKind::ToolResult),
            "assistant_text" => Some(RecordKind::AssistantText),
            "artifact" => Some(RecordKind::Artifact),
            _ => None,
        }
    }
}

/// Typed record content, stored as JSON text in the backing store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
#[serde(rename_all = "snake_case")]
pub enum RecordPayload {
    UserText {
        text: String,
    },
    ToolInvocation {
        tool_id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_id: String,
        output: String,
        #[serde(default)]
        is_error: bool,
    },
    AssistantText {
        text: String,
    },
    Artifact {
        tool_id: String,
        artifact: Value,
    },
}

impl RecordPayload {
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordPayload::UserText { .. } => RecordKind::UserText,
            RecordPayload::ToolInvocation { .. } => RecordKind::ToolInvocation,
            RecordPayload::ToolResult { .. } => RecordKind::ToolResult,
            RecordPayload::AssistantText { .. } => RecordKind::AssistantText,
            RecordPayload::Artifact { .. } => RecordKind::Artifact,
        }
    }

    /// Role implied by the payload kind. Tool results are authored by the
    /// tool executor, everything else by the user or the assistant.
    pub fn role(&self) -> Role {
        match self {
            RecordPayload::UserText { .. } => Role::User,
            RecordPayload::ToolResult { .. } => Role::Tool,
            RecordPayload::ToolInvocation { .. }
            | RecordPayload::AssistantText { .. }
            | RecordPayload::Artifact { .. } => Role::Assistant,
        }
    }

    /// Tool id for payloads that reference an invocation.
    pub fn tool_id(&self) -> Option<&str> {
        match self {
            RecordPayload::ToolInvocation { tool_id, .. }
            | RecordPayload::ToolResult { tool_id, .. }
            | RecordPayload::Artifact { tool_id, .. } => Some(tool_id),
            _ => None,
        }
    }
}

/// One persisted unit of conversation history.
/// Maps 1:1 to a row in the backing store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique record id, immutable once assigned.
    pub id: Uuid,

    /// Caller-generated turn id; exists before the producer session id.
    pub turn_id: String,

    /// Producer session id. Null until the turn's binder observes one,
    /// then rebound retroactively.
    pub session_id: Option<String>,

    pub role: Role,
    pub kind: RecordKind,
    pub payload: RecordPayload,

    /// A record created strictly earlier in the same turn, or None for roots.
    pub parent_record_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
}

impl Record {
    /// Build a record with a fresh id. Role and kind derive from the payload.
    pub fn new(
        turn_id: &str,
        session_id: Option<String>,
        payload: RecordPayload,
        parent_record_id: Option<Uuid>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            turn_id: turn_id.to_string(),
            session_id,
            role: payload.role(),
            kind: payload.kind(),
            payload,
            parent_record_id,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            RecordKind::UserText,
            RecordKind::ToolInvocation,
            RecordKind::ToolResult,
            RecordKind::AssistantText,
            RecordKind::Artifact,
        ] {
            assert_eq!(RecordKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(RecordKind::parse("bogus"), None);
    }

    #[test]
    fn test_payload_implies_role_and_kind() {
        let payload = RecordPayload::ToolResult {
            tool_id: "t1".to_string(),
            output: "ok".to_string(),
            is_error: false,
        };
        assert_eq!(payload.kind(), RecordKind::ToolResult);
        assert_eq!(payload.role(), Role::Tool);
        assert_eq!(payload.tool_id(), Some("t1"));

        let payload = RecordPayload::UserText {
            text: "hi".to_string(),
        };
        assert_eq!(payload.role(), Role::User);
        assert_eq!(payload.tool_id(), None);
    }

    #[test]
    fn test_record_new_derives_fields() {
        let record = Record::new(
            "T1",
            None,
            RecordPayload::AssistantText {
                text: "hello".to_string(),
            },
            None,
            Utc::now(),
        );

        assert_eq!(record.turn_id, "T1");
        assert_eq!(record.kind, RecordKind::AssistantText);
        assert_eq!(record.role, Role::Assistant);
        assert!(record.session_id.is_none());
    }

    #[test]
    fn test_payload_serialization_tag() {
        let payload = RecordPayload::ToolInvocation {
            tool_id: "t1".to_string(),
            name: "Bash".to_string(),
            input: serde_json::json!({"command": "ls"}),
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"kind\":\"tool_invocation\""));

        let back: RecordPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }
}
