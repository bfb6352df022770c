// Durable conversation-history store.
// Append-only records; session ids rebound in place once known.

mod contract;
mod db;
mod error;

// Public API
pub use contract::HistoryStore;
pub use db::SqliteStore;
pub use error::{Error, Result};
