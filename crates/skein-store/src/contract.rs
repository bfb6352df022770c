use uuid::Uuid;

use skein_types::Record;

use crate::Result;

/// The storage contract: exactly four operations.
///
/// Everything above this trait (writer, binder, reconstructor) is backend
/// agnostic; any store satisfying these semantics is interchangeable.
///
/// Semantics:
/// - `create_record`: append-only insert. Ids are immutable once written.
/// - `upsert_tool_result`: at most one tool_result row per
///   (turn_id, tool id); redelivery returns the existing record id.
/// - `rebind_session_id`: set the session id on every record of the turn
///   that still has none. Idempotent; returns the number of rows updated.
/// - `list_records`: all records of a turn in creation order. Unknown turns
///   yield an empty list, not an error.
pub trait HistoryStore: Send + Sync {
    fn create_record(&self, record: &Record) -> Result<Uuid>;

    fn upsert_tool_result(&self, record: &Record, tool_id: &str) -> Result<Uuid>;

    fn rebind_session_id(&self, turn_id: &str, session_id: &str) -> Result<usize>;

    fn list_records(&self, turn_id: &str) -> Result<Vec<Record>>;
}
