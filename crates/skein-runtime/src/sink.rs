use std::sync::mpsc::{Receiver, Sender, channel};

use skein_types::NormalizedEvent;

/// Outbound transport seam.
///
/// The turn context forwards every normalized event through its sink as one
/// discrete push unit, in emission order, before reading the next raw item.
pub trait EventSink: Send {
    fn emit(&mut self, turn_id: &str, event: &NormalizedEvent);
}

/// Sink that discards everything. Used when a caller only wants history.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _turn_id: &str, _event: &NormalizedEvent) {}
}

/// One forwarded event with its turn id, as carried over a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnEvent {
    pub turn_id: String,
    pub event: NormalizedEvent,
}

/// Channel-backed sink for push transports (one receiver drain per SSE
/// message, WebSocket frame, etc.)
pub struct ChannelSink {
    tx: Sender<TurnEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<TurnEvent>) {
        let (tx, rx) = channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&mut self, turn_id: &str, event: &NormalizedEvent) {
        // A dropped receiver means the client went away; history writing
        // continues regardless.
        let _ = self.tx.send(TurnEvent {
            turn_id: turn_id.to_string(),
            event: event.clone(),
        });
    }
}
