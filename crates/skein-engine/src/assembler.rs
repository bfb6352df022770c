use std::collections::HashMap;

use serde_json::Value;
use uuid::Uuid;

use skein_types::{ConversationNode, ConversationTree, Record, RecordKind, RecordPayload};

/// Maximum length of a node's content preview.
const PREVIEW_LEN: usize = 80;

// NOTE: Reconstruction design
//
// The store keeps a flat, parent-linked record log; this module derives the
// presentation tree from it on demand. Nodes live in an arena (the tree's
// Vec) addressed through an id index, children are appended as records are
// walked in creation order, so:
// - identical record logs always reconstruct identical trees, and
// - a pre-order walk from the root reproduces the original write order.
//
// Truncated histories are expected (a turn may never have reached its
// terminal result). A record whose parent or invocation cannot be resolved
// becomes an additional root instead of being dropped.

/// Rebuild the conversation tree for one turn from its stored records.
///
/// Records must be in creation order, as returned by the store. An empty
/// slice yields an empty tree, never an error. Pure function: mutates
/// nothing, retains no state across calls.
pub fn assemble_tree(records: &[Record]) -> ConversationTree {
    if records.is_empty() {
        return ConversationTree::default();
    }

    let mut tree = ConversationTree::default();
    // Arena index: record id -> position in tree.nodes.
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    // tool id -> node id of the invocation record, for result pairing.
    let mut invocations: HashMap<&str, Uuid> = HashMap::new();

    for record in records {
        // De-duplicate: ids are immutable and unique; a repeated id in a
        // corrupted log keeps its first occurrence.
        if index.contains_key(&record.id) {
            continue;
        }

        let parent_node_id = resolve_parent(record, &index, &invocations);

        let node = ConversationNode {
            id: record.id,
            node_type: record.kind,
            name: tool_name(record),
            timestamp: record.created_at,
            content_preview: preview(&record.payload),
            parent_node_id,
            child_node_ids: Vec::new(),
        };

        if let Some(parent_id) = parent_node_id
            && let Some(&parent_idx) = index.get(&parent_id)
        {
            tree.nodes[parent_idx].child_node_ids.push(record.id);
        }

        if let RecordPayload::ToolInvocation { tool_id, .. } = &record.payload {
            invocations.insert(tool_id, record.id);
        }

        if tree.root_node_id.is_none() && record.kind == RecordKind::UserText {
            tree.root_node_id = Some(record.id);
        }

        index.insert(record.id, tree.nodes.len());
        tree.nodes.push(node);
    }

    tree
}

/// Derive the parent node id for a record.
///
/// Tool results pair with their invocation's node; everything else follows
/// the explicit parent link. A reference to a node that does not exist (a
/// reconstruction gap) yields None, attaching the record as an extra root.
fn resolve_parent(
    record: &Record,
    index: &HashMap<Uuid, usize>,
    invocations: &HashMap<&str, Uuid>,
) -> Option<Uuid> {
    if let RecordPayload::ToolResult { tool_id, .. } = &record.payload {
        if let Some(&invocation_node) = invocations.get(tool_id.as_str()) {
            return Some(invocation_node);
        }
    }

    record
        .parent_record_id
        .filter(|parent_id| index.contains_key(parent_id))
}

fn tool_name(record: &Record) -> Option<String> {
    match &record.payload {
        RecordPayload::ToolInvocation { name, .. } => Some(name.clone()),
        _ => None,
    }
}

fn preview(payload: &RecordPayload) -> String {
    match payload {
        RecordPayload::UserText { text } | RecordPayload::AssistantText { text } => truncate(text),
        RecordPayload::ToolInvocation { name, input, .. } => {
            truncate(&format!("{} {}", name, compact(input)))
        }
        RecordPayload::ToolResult {
            output, is_error, ..
        } => {
            if *is_error {
                truncate(&format!("error: {}", output))
            } else {
                truncate(output)
            }
        }
        RecordPayload::Artifact { artifact, .. } => truncate(&compact(artifact)),
    }
}

fn compact(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= PREVIEW_LEN {
        text.to_string()
    } else {
        let cut: String = text.chars().take(PREVIEW_LEN - 1).collect();
        format!("{}…", cut)
    }
}
