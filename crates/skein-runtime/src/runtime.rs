use std::sync::Arc;

use skein_engine::assemble_tree;
use skein_store::HistoryStore;
use skein_types::ConversationTree;

use crate::error::Result;
use crate::sink::{EventSink, NullSink};
use crate::turn::TurnContext;

/// Facade over the store for turn lifecycles and history queries.
///
/// The runtime itself holds no mutable state; each turn owns its own
/// context, and concurrent turns share only the store handle.
pub struct Runtime {
    store: Arc<dyn HistoryStore>,
}

impl Runtime {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn HistoryStore> {
        self.store.clone()
    }

    /// Start a turn that only writes history (no outbound forwarding).
    /// The user text, when present, becomes the turn's root record.
    pub fn begin_turn(&self, turn_id: &str, user_text: Option<&str>) -> TurnContext {
        self.begin_turn_with_sink(turn_id, user_text, Box::new(NullSink))
    }

    /// Start a turn that forwards every normalized event through the sink.
    pub fn begin_turn_with_sink(
        &self,
        turn_id: &str,
        user_text: Option<&str>,
        sink: Box<dyn EventSink>,
    ) -> TurnContext {
        TurnContext::new(turn_id, self.store.clone(), sink, user_text)
    }

    /// Rebuild the conversation tree for a turn from stored records alone.
    /// Unknown or empty turns yield an empty tree, not an error.
    pub fn conversation_tree(&self, turn_id: &str) -> Result<ConversationTree> {
        let records = self.store.list_records(turn_id)?;
        Ok(assemble_tree(&records))
    }
}
