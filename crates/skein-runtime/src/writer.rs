use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use skein_protocol::{AnomalyKind, AnomalyReport};
use skein_store::HistoryStore;
use skein_types::{Record, RecordPayload, ToolInvocation};

/// Turn-scoped persistence front.
///
/// Owns the de-duplication guards and the failure policy: a failed
/// individual write is logged and skipped, never aborting the surrounding
/// stream. Availability of the live stream outranks completeness of history.
pub struct HistoryWriter {
    turn_id: String,
    store: Arc<dyn HistoryStore>,

    /// tool id -> record id of the already-persisted invocation.
    /// Prevents a duplicate ToolStart (or duplicate flush trigger) from
    /// producing a second record.
    written_invocations: HashMap<String, Uuid>,

    /// Timestamp of the last record written for this turn.
    last_created_at: Option<DateTime<Utc>>,
}

impl HistoryWriter {
    pub fn new(turn_id: &str, store: Arc<dyn HistoryStore>) -> Self {
        Self {
            turn_id: turn_id.to_string(),
            store,
            written_invocations: HashMap::new(),
            last_created_at: None,
        }
    }

    /// Persist one record. Returns the record id, or None when the write
    /// failed and was skipped. `tool_result` payloads are routed through the
    /// idempotent upsert; redelivery returns the existing id.
    pub fn write(
        &mut self,
        payload: RecordPayload,
        parent_record_id: Option<Uuid>,
        session_id: Option<&str>,
    ) -> Option<Uuid> {
        let kind = payload.kind();
        let timestamp = self.next_timestamp();
        let record = Record::new(
            &self.turn_id,
            session_id.map(str::to_string),
            payload,
            parent_record_id,
            timestamp,
        );

        let result = match &record.payload {
            RecordPayload::ToolResult { tool_id, .. } => {
                let tool_id = tool_id.clone();
                self.store.upsert_tool_result(&record, &tool_id)
            }
            _ => self.store.create_record(&record),
        };

        match result {
            Ok(id) => Some(id),
            Err(err) => {
                tracing::warn!(
                    turn_id = %self.turn_id,
                    kind = kind.as_str(),
                    error = %err,
                    "history write failed; skipping record"
                );
                None
            }
        }
    }

    /// Persist a tool invocation exactly once, with its fully accumulated
    /// input. Safe to call from every flush trigger; only the first call
    /// writes.
    pub fn write_invocation(
        &mut self,
        invocation: &ToolInvocation,
        parent_record_id: Option<Uuid>,
        session_id: Option<&str>,
        report: &mut AnomalyReport,
    ) -> Option<Uuid> {
        if let Some(existing) = self.written_invocations.get(&invocation.id) {
            return Some(*existing);
        }

        let (input, malformed) = invocation.resolved_input();
        if malformed {
            report.record(AnomalyKind::MalformedToolInput, invocation.id.clone());
        }

        let record_id = self.write(
            RecordPayload::ToolInvocation {
                tool_id: invocation.id.clone(),
                name: invocation.name.clone(),
                input,
            },
            parent_record_id,
            session_id,
        )?;

        self.written_invocations
            .insert(invocation.id.clone(), record_id);
        Some(record_id)
    }

    /// Record id of an invocation persisted earlier in this turn.
    pub fn invocation_record_id(&self, tool_id: &str) -> Option<Uuid> {
        self.written_invocations.get(tool_id).copied()
    }

    /// Strictly increasing per-turn timestamp, so creation order is total
    /// and parent records always sort before their children.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_created_at
            && now <= last
        {
            now = last + Duration::microseconds(1);
        }
        self.last_created_at = Some(now);
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use skein_store::{Result as StoreResult, SqliteStore};

    fn writer(turn_id: &str) -> (HistoryWriter, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        (HistoryWriter::new(turn_id, store.clone()), store)
    }

    fn invocation(id: &str) -> ToolInvocation {
        ToolInvocation::new(id.to_string(), 0, "Bash".to_string(), json!({"command": "ls"}))
    }

    #[test]
    fn test_write_returns_record_id() {
        let (mut writer, store) = writer("T1");

        let id = writer
            .write(
                RecordPayload::UserText {
                    text: "hi".to_string(),
                },
                None,
                None,
            )
            .unwrap();

        let records = store.list_records("T1").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
    }

    #[test]
    fn test_invocation_written_exactly_once() {
        let (mut writer, store) = writer("T1");
        let mut report = AnomalyReport::new();
        let inv = invocation("t1");

        let first = writer.write_invocation(&inv, None, None, &mut report);
        let second = writer.write_invocation(&inv, None, None, &mut report);

        assert_eq!(first, second);
        assert_eq!(store.list_records("T1").unwrap().len(), 1);
        assert_eq!(writer.invocation_record_id("t1"), first);
    }

    #[test]
    fn test_malformed_input_counted_but_written() {
        let (mut writer, store) = writer("T1");
        let mut report = AnomalyReport::new();

        let mut inv = invocation("t1");
        inv.push_fragment("{\"broken");

        let id = writer.write_invocation(&inv, None, None, &mut report);
        assert!(id.is_some());
        assert_eq!(report.count(AnomalyKind::MalformedToolInput), 1);

        let records = store.list_records("T1").unwrap();
        match &records[0].payload {
            RecordPayload::ToolInvocation { input, .. } => {
                assert_eq!(input, &json!("{\"broken"));
            }
            other => panic!("Expected ToolInvocation, got {:?}", other),
        }
    }

    #[test]
    fn test_result_redelivery_is_single_record() {
        let (mut writer, store) = writer("T1");

        let payload = RecordPayload::ToolResult {
            tool_id: "t1".to_string(),
            output: "ok".to_string(),
            is_error: false,
        };

        let first = writer.write(payload.clone(), None, None).unwrap();
        for _ in 0..3 {
            let id = writer.write(payload.clone(), None, None).unwrap();
            assert_eq!(id, first);
        }

        assert_eq!(store.list_records("T1").unwrap().len(), 1);
    }

    #[test]
    fn test_failed_write_skipped_not_fatal() {
        struct BrokenStore;

        impl HistoryStore for BrokenStore {
            fn create_record(&self, _record: &Record) -> StoreResult<Uuid> {
                Err(skein_store::Error::Query("disk gone".to_string()))
            }
            fn upsert_tool_result(&self, _record: &Record, _tool_id: &str) -> StoreResult<Uuid> {
                Err(skein_store::Error::Query("disk gone".to_string()))
            }
            fn rebind_session_id(&self, _turn_id: &str, _session_id: &str) -> StoreResult<usize> {
                Ok(0)
            }
            fn list_records(&self, _turn_id: &str) -> StoreResult<Vec<Record>> {
                Ok(Vec::new())
            }
        }

        let mut writer = HistoryWriter::new("T1", Arc::new(BrokenStore));
        let id = writer.write(
            RecordPayload::UserText {
                text: "hi".to_string(),
            },
            None,
            None,
        );
        assert!(id.is_none());

        // A failed invocation write is not remembered as written.
        let mut report = AnomalyReport::new();
        let id = writer.write_invocation(&invocation("t1"), None, None, &mut report);
        assert!(id.is_none());
        assert_eq!(writer.invocation_record_id("t1"), None);
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let (mut writer, store) = writer("T1");

        for i in 0..5 {
            writer.write(
                RecordPayload::AssistantText {
                    text: format!("segment {}", i),
                },
                None,
                None,
            );
        }

        let records = store.list_records("T1").unwrap();
        for pair in records.windows(2) {
            assert!(pair[0].created_at < pair[1].created_at);
        }
    }
}
