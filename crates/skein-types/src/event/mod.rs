mod payload;

pub use payload::{
    ArtifactPayload, LifecyclePayload, MessageMetaPayload, TerminalPayload, TextDeltaPayload,
    ToolInputDeltaPayload, ToolResultPayload, ToolStartPayload, TurnStats, Usage,
};

use serde::{Deserialize, Serialize};

// NOTE: Schema Design Goals
//
// 1. Normalization: Collapse the producer's heterogeneous stream items into a
//    small closed set the rest of the system can exhaustively match on.
//    Unknown wire shapes never reach this enum; the normalizer drops and
//    counts them so producer protocol additions cannot break consumers.
//
// 2. Correlation: Tool events here always carry a stable tool id. The wire
//    protocol references tool blocks by transient stream position; resolving
//    position -> id (and buffering fragments that arrive early) is the
//    correlator's job, upstream of this type.
//
// 3. Replayability: Every event that matters for history maps onto exactly
//    one persisted record kind, so a turn's record log replays into the same
//    tree regardless of delivery timing.

/// One normalized event derived from the raw producer stream.
///
/// This is the only event shape that crosses component boundaries: the
/// correlator emits it, the writer persists from it, and outbound transport
/// forwards it one-per-push-unit with ordering preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content")]
#[serde(rename_all = "snake_case")]
pub enum NormalizedEvent {
    /// Assistant text fragment. Empty fragments are suppressed upstream.
    TextDelta(TextDeltaPayload),

    /// A tool invocation was declared, with whatever input was known at
    /// declaration time. Input streamed afterwards arrives as ToolInputDelta.
    ToolStart(ToolStartPayload),

    /// Partial tool-input fragment, already re-tagged with its stable tool id.
    ToolInputDelta(ToolInputDeltaPayload),

    /// Execution result for a previously started tool invocation.
    ToolResult(ToolResultPayload),

    /// A derived artifact declared alongside a tool invocation
    /// (composite emission from a single tool-use block).
    ArtifactDeclared(ArtifactPayload),

    /// Message-level metadata: stop reason and token usage.
    MessageMeta(MessageMetaPayload),

    /// The current assistant message finished streaming.
    MessageStop,

    /// The producer's session id became known mid-stream.
    LifecycleInit(LifecyclePayload),

    /// Terminal result for the whole turn. Closes the turn.
    TerminalResult(TerminalPayload),
}

impl NormalizedEvent {
    /// Short event name for logging and counters.
    pub fn kind_str(&self) -> &'static str {
        match self {
            NormalizedEvent::TextDelta(_) => "text_delta",
            NormalizedEvent::ToolStart(_) => "tool_start",
            NormalizedEvent::ToolInputDelta(_) => "tool_input_delta",
            NormalizedEvent::ToolResult(_) => "tool_result",
            NormalizedEvent::ArtifactDeclared(_) => "artifact_declared",
            NormalizedEvent::MessageMeta(_) => "message_meta",
            NormalizedEvent::MessageStop => "message_stop",
            NormalizedEvent::LifecycleInit(_) => "lifecycle_init",
            NormalizedEvent::TerminalResult(_) => "terminal_result",
        }
    }
}
