pub mod adapter;
pub mod anomaly;
pub mod correlate;
pub mod normalize;
pub mod schema;

pub use adapter::{StreamAdapter, StreamOutput};
pub use anomaly::{AnomalyKind, AnomalyReport};
pub use correlate::{Correlated, Correlator};
pub use normalize::{Frame, normalize_item};
pub use schema::{RawBlock, RawDelta, RawStreamItem, parse_raw_line};
