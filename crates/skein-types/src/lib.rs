pub mod event;
pub mod invocation;
pub mod node;
pub mod record;

pub use event::*;
pub use invocation::{ToolInvocation, ToolOutcome};
pub use node::{ConversationNode, ConversationTree};
pub use record::{Record, RecordKind, RecordPayload, Role};
