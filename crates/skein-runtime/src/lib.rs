pub mod binder;
pub mod error;
pub mod runtime;
pub mod sink;
pub mod turn;
pub mod writer;

pub use binder::{BindState, SessionBinder};
pub use error::{Error, Result};
pub use runtime::Runtime;
pub use sink::{ChannelSink, EventSink, NullSink, TurnEvent};
pub use turn::TurnContext;
pub use writer::HistoryWriter;
