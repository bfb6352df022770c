use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use skein_types::{Record, RecordKind, RecordPayload, Role};

use crate::contract::HistoryStore;
use crate::error::{Error, Result};

// NOTE: Storage design
//
// Why a single flat table?
// - Records are the source of truth; trees are derived on demand by the
//   engine. Keeping storage flat and parent-linked means no pointer graphs
//   to migrate and deterministic reconstruction from a plain scan.
//
// Why a partial unique index for tool results?
// - "At most one tool_result per invocation" is a data invariant, not a
//   writer courtesy. Enforcing it in the schema makes redelivery a no-op
//   even across writer restarts.
//
// Why TEXT timestamps?
// - created_at is written with fixed-width microsecond precision so
//   lexicographic order equals chronological order and ORDER BY needs no
//   parsing.

/// SQLite-backed history store.
///
/// The connection sits behind a mutex so the store can be shared across
/// concurrently running turns (`Send + Sync`); each operation is one short
/// transaction-free statement.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn init_schema(&self) -> Result<()> {
        self.conn()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                turn_id TEXT NOT NULL,
                session_id TEXT,
                role TEXT NOT NULL,
                kind TEXT NOT NULL,
                tool_id TEXT,
                payload TEXT NOT NULL,
                parent_record_id TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_records_turn ON records(turn_id, created_at);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_records_tool_result
                ON records(turn_id, tool_id) WHERE kind = 'tool_result';
            "#,
        )?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Query("store connection mutex poisoned".to_string()))
    }

    fn insert(&self, conn: &Connection, record: &Record) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO records (id, turn_id, session_id, role, kind, tool_id, payload, parent_record_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                record.id.to_string(),
                &record.turn_id,
                &record.session_id,
                record.role.as_str(),
                record.kind.as_str(),
                record.payload.tool_id(),
                serde_json::to_string(&record.payload)?,
                record.parent_record_id.map(|id| id.to_string()),
                format_timestamp(&record.created_at),
            ],
        )?;

        Ok(())
    }
}

impl HistoryStore for SqliteStore {
    fn create_record(&self, record: &Record) -> Result<Uuid> {
        let conn = self.conn()?;
        self.insert(&conn, record)?;
        Ok(record.id)
    }

    fn upsert_tool_result(&self, record: &Record, tool_id: &str) -> Result<Uuid> {
        let conn = self.conn()?;

        let inserted = conn.execute(
            r#"
            INSERT INTO records (id, turn_id, session_id, role, kind, tool_id, payload, parent_record_id, created_at)
            VALUES (?1, ?2, ?3, 'tool', 'tool_result', ?4, ?5, ?6, ?7)
            ON CONFLICT(turn_id, tool_id) WHERE kind = 'tool_result' DO NOTHING
            "#,
            params![
                record.id.to_string(),
                &record.turn_id,
                &record.session_id,
                tool_id,
                serde_json::to_string(&record.payload)?,
                record.parent_record_id.map(|id| id.to_string()),
                format_timestamp(&record.created_at),
            ],
        )?;

        if inserted > 0 {
            return Ok(record.id);
        }

        // Redelivery: hand back the id of the row that already exists.
        let existing: String = conn
            .query_row(
                r#"
                SELECT id FROM records
                WHERE turn_id = ?1 AND tool_id = ?2 AND kind = 'tool_result'
                "#,
                params![&record.turn_id, tool_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| {
                Error::Query(format!(
                    "tool_result upsert conflicted but no row found for tool {}",
                    tool_id
                ))
            })?;

        parse_uuid(&existing)
    }

    fn rebind_session_id(&self, turn_id: &str, session_id: &str) -> Result<usize> {
        let updated = self.conn()?.execute(
            r#"
            UPDATE records SET session_id = ?2
            WHERE turn_id = ?1 AND session_id IS NULL
            "#,
            params![turn_id, session_id],
        )?;

        Ok(updated)
    }

    fn list_records(&self, turn_id: &str) -> Result<Vec<Record>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, turn_id, session_id, role, kind, payload, parent_record_id, created_at
            FROM records
            WHERE turn_id = ?1
            ORDER BY created_at ASC, id ASC
            "#,
        )?;

        let rows = stmt
            .query_map([turn_id], |row| {
                Ok(RawRow {
                    id: row.get(0)?,
                    turn_id: row.get(1)?,
                    session_id: row.get(2)?,
                    role: row.get(3)?,
                    kind: row.get(4)?,
                    payload: row.get(5)?,
                    parent_record_id: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(RawRow::into_record).collect()
    }
}

struct RawRow {
    id: String,
    turn_id: String,
    session_id: Option<String>,
    role: String,
    kind: String,
    payload: String,
    parent_record_id: Option<String>,
    created_at: String,
}

impl RawRow {
    fn into_record(self) -> Result<Record> {
        let role = Role::parse(&self.role)
            .ok_or_else(|| Error::Query(format!("unknown role '{}'", self.role)))?;
        let kind = RecordKind::parse(&self.kind)
            .ok_or_else(|| Error::Query(format!("unknown record kind '{}'", self.kind)))?;
        let payload: RecordPayload = serde_json::from_str(&self.payload)?;

        Ok(Record {
            id: parse_uuid(&self.id)?,
            turn_id: self.turn_id,
            session_id: self.session_id,
            role,
            kind,
            payload,
            parent_record_id: self
                .parent_record_id
                .as_deref()
                .map(parse_uuid)
                .transpose()?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Query(format!("invalid timestamp '{}': {}", s, e)))
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Query(format!("invalid record id '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn record_at(turn_id: &str, payload: RecordPayload, micros: i64) -> Record {
        Record::new(
            turn_id,
            None,
            payload,
            None,
            Utc.timestamp_micros(1_700_000_000_000_000 + micros).unwrap(),
        )
    }

    fn user_text(turn_id: &str, text: &str, micros: i64) -> Record {
        record_at(
            turn_id,
            RecordPayload::UserText {
                text: text.to_string(),
            },
            micros,
        )
    }

    fn tool_result(turn_id: &str, tool_id: &str, output: &str, micros: i64) -> Record {
        record_at(
            turn_id,
            RecordPayload::ToolResult {
                tool_id: tool_id.to_string(),
                output: output.to_string(),
                is_error: false,
            },
            micros,
        )
    }

    #[test]
    fn test_schema_initialization_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init_schema().unwrap();

        assert!(store.list_records("T1").unwrap().is_empty());
    }

    #[test]
    fn test_create_and_list_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();

        let record = user_text("T1", "hello", 0);
        let id = store.create_record(&record).unwrap();
        assert_eq!(id, record.id);

        let records = store.list_records("T1").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], record);
    }

    #[test]
    fn test_list_orders_by_created_at() {
        let store = SqliteStore::open_in_memory().unwrap();

        let second = user_text("T1", "second", 1_000);
        let first = user_text("T1", "first", 0);
        store.create_record(&second).unwrap();
        store.create_record(&first).unwrap();

        let records = store.list_records("T1").unwrap();
        assert_eq!(records[0].id, first.id);
        assert_eq!(records[1].id, second.id);
    }

    #[test]
    fn test_list_unknown_turn_is_empty_not_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.list_records("never-seen").unwrap().is_empty());
    }

    #[test]
    fn test_tool_result_upsert_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();

        let original = tool_result("T1", "t1", "ok", 0);
        let first_id = store.upsert_tool_result(&original, "t1").unwrap();
        assert_eq!(first_id, original.id);

        // Redelivery with a different record id returns the original id.
        for i in 1..4 {
            let redelivered = tool_result("T1", "t1", "ok", i * 100);
            let id = store.upsert_tool_result(&redelivered, "t1").unwrap();
            assert_eq!(id, original.id);
        }

        let records = store.list_records("T1").unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_tool_result_uniqueness_is_per_turn() {
        let store = SqliteStore::open_in_memory().unwrap();

        store
            .upsert_tool_result(&tool_result("T1", "t1", "a", 0), "t1")
            .unwrap();
        store
            .upsert_tool_result(&tool_result("T2", "t1", "b", 0), "t1")
            .unwrap();

        assert_eq!(store.list_records("T1").unwrap().len(), 1);
        assert_eq!(store.list_records("T2").unwrap().len(), 1);
    }

    #[test]
    fn test_rebind_updates_exactly_null_rows_then_zero() {
        let store = SqliteStore::open_in_memory().unwrap();

        for i in 0..3 {
            store
                .create_record(&user_text("T1", &format!("m{}", i), i * 100))
                .unwrap();
        }
        // A record of another turn must be untouched.
        store.create_record(&user_text("T2", "other", 0)).unwrap();

        let updated = store.rebind_session_id("T1", "S1").unwrap();
        assert_eq!(updated, 3);

        // Idempotent no-op on the second call.
        let updated = store.rebind_session_id("T1", "S1").unwrap();
        assert_eq!(updated, 0);

        for record in store.list_records("T1").unwrap() {
            assert_eq!(record.session_id.as_deref(), Some("S1"));
        }
        assert_eq!(store.list_records("T2").unwrap()[0].session_id, None);
    }

    #[test]
    fn test_rebind_skips_already_bound_rows() {
        let store = SqliteStore::open_in_memory().unwrap();

        let mut bound = user_text("T1", "bound", 0);
        bound.session_id = Some("S1".to_string());
        store.create_record(&bound).unwrap();
        store.create_record(&user_text("T1", "unbound", 100)).unwrap();

        let updated = store.rebind_session_id("T1", "S1").unwrap();
        assert_eq!(updated, 1);
    }

    #[test]
    fn test_parent_link_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();

        let parent = user_text("T1", "root", 0);
        store.create_record(&parent).unwrap();

        let mut child = record_at(
            "T1",
            RecordPayload::ToolInvocation {
                tool_id: "t1".to_string(),
                name: "Bash".to_string(),
                input: json!({"command": "ls"}),
            },
            100,
        );
        child.parent_record_id = Some(parent.id);
        store.create_record(&child).unwrap();

        let records = store.list_records("T1").unwrap();
        assert_eq!(records[1].parent_record_id, Some(parent.id));
        assert_eq!(records[1].kind, RecordKind::ToolInvocation);
    }

    #[test]
    fn test_timestamp_format_is_lexicographically_ordered() {
        let early = Utc.timestamp_micros(1_700_000_000_000_005).unwrap();
        let late = Utc.timestamp_micros(1_700_000_000_000_050).unwrap();

        let a = format_timestamp(&early);
        let b = format_timestamp(&late);
        assert!(a < b);
        assert_eq!(parse_timestamp(&a).unwrap(), early);
    }
}
