use serde_json::Value;

use skein_types::{
    LifecyclePayload, MessageMetaPayload, NormalizedEvent, TerminalPayload, TextDeltaPayload,
    TurnStats,
};

use crate::anomaly::{AnomalyKind, AnomalyReport};
use crate::schema::{RawBlock, RawDelta, RawStreamItem};

/// Normalizer output, consumed by the correlator.
///
/// Events that need no correlation pass through untouched; tool frames stay
/// keyed by their wire position until the correlator resolves them to stable
/// tool ids.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Passthrough(NormalizedEvent),
    ToolStart {
        position: u32,
        id: String,
        name: String,
        input: Value,
        artifact: Option<Value>,
    },
    ToolInputDelta {
        position: u32,
        fragment: String,
    },
    ToolResult {
        tool_use_id: String,
        output: String,
        is_error: bool,
    },
    BlockStop {
        position: u32,
    },
}

/// Convert one raw stream item into zero or more frames.
///
/// Never fails: empty text fragments are suppressed, unrecognized shapes are
/// dropped and counted. Stateless except for the anomaly accounting it
/// delegates to.
pub fn normalize_item(item: RawStreamItem, report: &mut AnomalyReport) -> Vec<Frame> {
    match item {
        RawStreamItem::TextDelta { text } => {
            if text.is_empty() {
                return Vec::new();
            }
            vec![Frame::Passthrough(NormalizedEvent::TextDelta(
                TextDeltaPayload { text },
            ))]
        }

        RawStreamItem::BlockStart { index, block } => match block {
            RawBlock::ToolUse {
                id,
                name,
                input,
                artifact,
            } => vec![Frame::ToolStart {
                position: index,
                id,
                name,
                input,
                artifact,
            }],
            RawBlock::Unknown => {
                report.record(
                    AnomalyKind::UnknownShape,
                    format!("unrecognized block at position {}", index),
                );
                Vec::new()
            }
        },

        RawStreamItem::BlockDelta { index, delta } => match delta {
            RawDelta::InputJsonDelta { partial_json } => vec![Frame::ToolInputDelta {
                position: index,
                fragment: partial_json,
            }],
            RawDelta::Unknown => {
                report.record(
                    AnomalyKind::UnknownShape,
                    format!("unrecognized delta at position {}", index),
                );
                Vec::new()
            }
        },

        RawStreamItem::BlockStop { index } => vec![Frame::BlockStop { position: index }],

        RawStreamItem::MessageDelta { stop_reason, usage } => {
            vec![Frame::Passthrough(NormalizedEvent::MessageMeta(
                MessageMetaPayload {
                    stop_reason,
                    usage: usage.map(|u| u.into_usage()),
                },
            ))]
        }

        RawStreamItem::MessageStop => vec![Frame::Passthrough(NormalizedEvent::MessageStop)],

        RawStreamItem::Lifecycle { session_id } => {
            vec![Frame::Passthrough(NormalizedEvent::LifecycleInit(
                LifecyclePayload { session_id },
            ))]
        }

        RawStreamItem::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => vec![Frame::ToolResult {
            tool_use_id,
            output: content.map(render_output).unwrap_or_default(),
            is_error,
        }],

        RawStreamItem::TerminalResult {
            session_id,
            stats,
            is_error,
        } => {
            // Stats are best-effort metadata; an unexpected shape degrades
            // to None rather than failing the terminal event.
            let stats = stats.and_then(|v| serde_json::from_value::<TurnStats>(v).ok());
            vec![Frame::Passthrough(NormalizedEvent::TerminalResult(
                TerminalPayload {
                    session_id,
                    stats,
                    is_error,
                },
            ))]
        }

        RawStreamItem::Unknown => {
            report.record(AnomalyKind::UnknownShape, "unrecognized stream item");
            Vec::new()
        }
    }
}

/// Render tool-result content to text. String content passes through;
/// structured content keeps its JSON form.
fn render_output(content: Value) -> String {
    match content {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_text_suppressed() {
        let mut report = AnomalyReport::new();
        let frames = normalize_item(
            RawStreamItem::TextDelta {
                text: String::new(),
            },
            &mut report,
        );
        assert!(frames.is_empty());
        assert!(report.is_empty());
    }

    #[test]
    fn test_text_delta_passes_through() {
        let mut report = AnomalyReport::new();
        let frames = normalize_item(
            RawStreamItem::TextDelta {
                text: "hello".to_string(),
            },
            &mut report,
        );

        assert_eq!(
            frames,
            vec![Frame::Passthrough(NormalizedEvent::TextDelta(
                TextDeltaPayload {
                    text: "hello".to_string()
                }
            ))]
        );
    }

    #[test]
    fn test_tool_use_block_becomes_position_keyed_frame() {
        let mut report = AnomalyReport::new();
        let frames = normalize_item(
            RawStreamItem::BlockStart {
                index: 2,
                block: RawBlock::ToolUse {
                    id: "t1".to_string(),
                    name: "Write".to_string(),
                    input: json!({}),
                    artifact: None,
                },
            },
            &mut report,
        );

        match &frames[0] {
            Frame::ToolStart { position, id, .. } => {
                assert_eq!(*position, 2);
                assert_eq!(id, "t1");
            }
            other => panic!("Expected ToolStart frame, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_item_dropped_and_counted() {
        let mut report = AnomalyReport::new();
        let frames = normalize_item(RawStreamItem::Unknown, &mut report);

        assert!(frames.is_empty());
        assert_eq!(report.count(AnomalyKind::UnknownShape), 1);
    }

    #[test]
    fn test_unknown_block_dropped_and_counted() {
        let mut report = AnomalyReport::new();
        let frames = normalize_item(
            RawStreamItem::BlockStart {
                index: 0,
                block: RawBlock::Unknown,
            },
            &mut report,
        );

        assert!(frames.is_empty());
        assert_eq!(report.count(AnomalyKind::UnknownShape), 1);
    }

    #[test]
    fn test_tool_result_structured_content_rendered_as_json() {
        let mut report = AnomalyReport::new();
        let frames = normalize_item(
            RawStreamItem::ToolResult {
                tool_use_id: "t1".to_string(),
                content: Some(json!({"files": 3})),
                is_error: false,
            },
            &mut report,
        );

        match &frames[0] {
            Frame::ToolResult { output, .. } => assert_eq!(output, "{\"files\":3}"),
            other => panic!("Expected ToolResult frame, got {:?}", other),
        }
    }

    #[test]
    fn test_terminal_result_with_unexpected_stats_shape() {
        let mut report = AnomalyReport::new();
        let frames = normalize_item(
            RawStreamItem::TerminalResult {
                session_id: "S1".to_string(),
                stats: Some(json!("free-form text")),
                is_error: false,
            },
            &mut report,
        );

        match &frames[0] {
            Frame::Passthrough(NormalizedEvent::TerminalResult(payload)) => {
                assert_eq!(payload.session_id, "S1");
                assert!(payload.stats.is_none());
            }
            other => panic!("Expected TerminalResult, got {:?}", other),
        }
    }
}
