use std::collections::HashMap;
use std::fmt;

/// Bounded number of example details kept per anomaly kind.
const MAX_EXAMPLES: usize = 5;

/// Category of protocol anomaly.
///
/// Anomalies are observability signals, never failures: the stream continues
/// past every one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnomalyKind {
    /// Unrecognized raw item, block, or delta shape (producer addition).
    UnknownShape,
    /// Buffered input fragments whose ToolStart never arrived by turn close.
    OrphanInputDelta,
    /// ToolResult referencing a tool id never started in this turn.
    OrphanToolResult,
    /// A second ToolStart for an already-known tool id.
    DuplicateToolStart,
    /// Accumulated input fragments that do not concatenate into valid JSON.
    MalformedToolInput,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::UnknownShape => "unknown_shape",
            AnomalyKind::OrphanInputDelta => "orphan_input_delta",
            AnomalyKind::OrphanToolResult => "orphan_tool_result",
            AnomalyKind::DuplicateToolStart => "duplicate_tool_start",
            AnomalyKind::MalformedToolInput => "malformed_tool_input",
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-turn anomaly accounting: counts per kind plus a bounded sample of
/// details for diagnosis.
#[derive(Debug, Default)]
pub struct AnomalyReport {
    counts: HashMap<AnomalyKind, u32>,
    examples: HashMap<AnomalyKind, Vec<String>>,
}

impl AnomalyReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one anomaly and emit a structured warning.
    pub fn record(&mut self, kind: AnomalyKind, detail: impl Into<String>) {
        let detail = detail.into();
        tracing::warn!(kind = kind.as_str(), detail = %detail, "protocol anomaly");

        *self.counts.entry(kind).or_insert(0) += 1;
        let examples = self.examples.entry(kind).or_default();
        if examples.len() < MAX_EXAMPLES {
            examples.push(detail);
        }
    }

    pub fn count(&self, kind: AnomalyKind) -> u32 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn counts(&self) -> impl Iterator<Item = (AnomalyKind, u32)> + '_ {
        self.counts.iter().map(|(k, v)| (*k, *v))
    }

    pub fn examples(&self, kind: AnomalyKind) -> &[String] {
        self.examples.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}
