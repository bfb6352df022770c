use serde::{Deserialize, Serialize};
use serde_json::Value;

use skein_types::Usage;

// NOTE: Forward compatibility contract
//
// The producer adds item and block shapes without notice. Every enum here
// carries a #[serde(other)] Unknown arm so a new shape deserializes instead
// of failing the whole stream; the normalizer drops Unknown and counts it.
// Never tighten these types in a way that makes an unrecognized shape an
// error.

/// One raw item from the producer stream, as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum RawStreamItem {
    /// Assistant text fragment.
    TextDelta { text: String },

    /// A content block opened at the given stream position.
    BlockStart { index: u32, block: RawBlock },

    /// A delta for the block at the given stream position.
    BlockDelta { index: u32, delta: RawDelta },

    /// The block at the given stream position is complete.
    BlockStop { index: u32 },

    /// Message-level metadata: stop reason and usage.
    MessageDelta {
        #[serde(default)]
        stop_reason: Option<String>,
        #[serde(default)]
        usage: Option<RawUsage>,
    },

    /// The current assistant message finished streaming.
    MessageStop,

    /// Session lifecycle: the producer's session id, available mid-stream.
    Lifecycle { session_id: String },

    /// Result of a tool execution, delivered by the executor side.
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Option<Value>,
        #[serde(default)]
        is_error: bool,
    },

    /// Terminal result for the whole turn.
    TerminalResult {
        session_id: String,
        #[serde(default)]
        stats: Option<Value>,
        #[serde(default)]
        is_error: bool,
    },

    #[serde(other)]
    Unknown,
}

/// Content block declared by a block_start item.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum RawBlock {
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
        /// Derived artifact declared alongside the invocation, if any.
        #[serde(default)]
        artifact: Option<Value>,
    },
    #[serde(other)]
    Unknown,
}

/// Delta carried by a block_delta item.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum RawDelta {
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Unknown,
}

/// Token usage as reported on the wire. All fields defaulted so partial
/// usage objects still parse.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
pub struct RawUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
    #[serde(default)]
    pub cache_creation_input_tokens: Option<u32>,
    #[serde(default)]
    pub cache_read_input_tokens: Option<u32>,
}

impl RawUsage {
    pub fn into_usage(self) -> Usage {
        Usage {
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            cache_creation_input_tokens: self.cache_creation_input_tokens,
            cache_read_input_tokens: self.cache_read_input_tokens,
        }
    }
}

/// Parse a single JSONL line into a raw item.
/// Returns None for blank or malformed lines (non-fatal, skip and continue).
pub fn parse_raw_line(line: &str) -> Option<RawStreamItem> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    serde_json::from_str(line).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_block_start_tool_use() {
        let line = r#"{"type":"block_start","index":2,"block":{"type":"tool_use","id":"toolu_01","name":"Write","input":{}}}"#;
        let item = parse_raw_line(line).unwrap();

        match item {
            RawStreamItem::BlockStart { index, block } => {
                assert_eq!(index, 2);
                match block {
                    RawBlock::ToolUse { id, name, .. } => {
                        assert_eq!(id, "toolu_01");
                        assert_eq!(name, "Write");
                    }
                    _ => panic!("Expected ToolUse block"),
                }
            }
            _ => panic!("Expected BlockStart"),
        }
    }

    #[test]
    fn test_unknown_item_type_parses_to_unknown() {
        let line = r#"{"type":"brand_new_feature","data":{"x":1}}"#;
        let item = parse_raw_line(line).unwrap();
        assert_eq!(item, RawStreamItem::Unknown);
    }

    #[test]
    fn test_unknown_block_type_parses_to_unknown() {
        let line = r#"{"type":"block_start","index":0,"block":{"type":"server_side_widget"}}"#;
        match parse_raw_line(line).unwrap() {
            RawStreamItem::BlockStart { block, .. } => assert_eq!(block, RawBlock::Unknown),
            _ => panic!("Expected BlockStart"),
        }
    }

    #[test]
    fn test_parse_malformed_line_returns_none() {
        assert_eq!(parse_raw_line("not json at all"), None);
        assert_eq!(parse_raw_line("   "), None);
    }

    #[test]
    fn test_partial_usage_parses_with_defaults() {
        let line = r#"{"type":"message_delta","stop_reason":"end_turn","usage":{"output_tokens":42}}"#;
        match parse_raw_line(line).unwrap() {
            RawStreamItem::MessageDelta { stop_reason, usage } => {
                assert_eq!(stop_reason.as_deref(), Some("end_turn"));
                let usage = usage.unwrap();
                assert_eq!(usage.input_tokens, 0);
                assert_eq!(usage.output_tokens, 42);
            }
            _ => panic!("Expected MessageDelta"),
        }
    }

    #[test]
    fn test_tool_result_content_shapes() {
        let line = r#"{"type":"tool_result","tool_use_id":"t1","content":"done","is_error":false}"#;
        match parse_raw_line(line).unwrap() {
            RawStreamItem::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                assert_eq!(tool_use_id, "t1");
                assert_eq!(content, Some(json!("done")));
                assert!(!is_error);
            }
            _ => panic!("Expected ToolResult"),
        }
    }
}
