use std::fmt;

use owo_colors::OwoColorize;
use uuid::Uuid;

use skein_types::{ConversationNode, ConversationTree, RecordKind};

/// View for displaying a reconstructed conversation tree.
pub struct TreeView<'a> {
    pub tree: &'a ConversationTree,
    pub enable_color: bool,
}

impl fmt::Display for TreeView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(root) = self.tree.root_node_id {
            self.write_subtree(f, root, 0)?;
        }

        let orphans = self.tree.additional_roots();
        if !orphans.is_empty() {
            let header = "orphaned (reconstruction gaps):";
            if self.enable_color {
                writeln!(f, "{}", header.bright_black())?;
            } else {
                writeln!(f, "{}", header)?;
            }
            for orphan in orphans {
                self.write_subtree(f, orphan.id, 1)?;
            }
        }

        Ok(())
    }
}

impl TreeView<'_> {
    fn write_subtree(&self, f: &mut fmt::Formatter<'_>, id: Uuid, depth: usize) -> fmt::Result {
        let Some(node) = self.tree.node(id) else {
            return Ok(());
        };

        writeln!(
            f,
            "{}{} {}",
            "  ".repeat(depth),
            self.label(node),
            node.content_preview
        )?;

        for child in &node.child_node_ids {
            self.write_subtree(f, *child, depth + 1)?;
        }

        Ok(())
    }

    fn label(&self, node: &ConversationNode) -> String {
        let text = match node.node_type {
            RecordKind::UserText => "User:".to_string(),
            RecordKind::AssistantText => "Assistant:".to_string(),
            RecordKind::ToolInvocation => {
                format!("Tool[{}]:", node.name.as_deref().unwrap_or("?"))
            }
            RecordKind::ToolResult => "Result:".to_string(),
            RecordKind::Artifact => "Artifact:".to_string(),
        };

        if !self.enable_color {
            return text;
        }

        match node.node_type {
            RecordKind::UserText => format!("{}", text.bold()),
            RecordKind::AssistantText => format!("{}", text.green()),
            RecordKind::ToolInvocation => format!("{}", text.cyan()),
            RecordKind::ToolResult => format!("{}", text.bright_black()),
            RecordKind::Artifact => format!("{}", text.yellow()),
        }
    }
}
