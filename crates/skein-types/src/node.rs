use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::RecordKind;

/// One node of a reconstructed conversation tree. Derived from records on
/// demand, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationNode {
    /// Same id as the record this node was derived from.
    pub id: Uuid,

    pub node_type: RecordKind,

    /// Tool name for invocation nodes, None otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub timestamp: DateTime<Utc>,

    /// Short text preview of the node content for presentation.
    pub content_preview: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_node_id: Option<Uuid>,

    pub child_node_ids: Vec<Uuid>,
}

/// Reconstructed per-turn tree. Nodes appear in record creation order, so a
/// pre-order walk from the root reproduces the original write order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConversationTree {
    /// First user_text record of the turn, or None for an empty tree.
    pub root_node_id: Option<Uuid>,
    pub nodes: Vec<ConversationNode>,
}

impl ConversationTree {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: Uuid) -> Option<&ConversationNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Parentless nodes other than the root: orphans attached as additional
    /// roots when their parent or invocation could not be resolved.
    pub fn additional_roots(&self) -> Vec<&ConversationNode> {
        self.nodes
            .iter()
            .filter(|n| n.parent_node_id.is_none() && Some(n.id) != self.root_node_id)
            .collect()
    }
}
