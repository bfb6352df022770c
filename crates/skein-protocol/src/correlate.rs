use std::collections::HashMap;

use skein_types::{
    ArtifactPayload, NormalizedEvent, ToolInputDeltaPayload, ToolInvocation, ToolOutcome,
    ToolResultPayload, ToolStartPayload,
};

use crate::anomaly::{AnomalyKind, AnomalyReport};
use crate::normalize::Frame;

// NOTE: Correlation design
//
// The wire protocol references tool blocks by stream position, and input
// fragments for a position may arrive before the block start that declares
// the stable tool id. Two rules make this safe:
//
// 1. No ToolInputDelta with an unresolved tool id ever leaves this component.
//    Early fragments are withheld entirely until their ToolStart arrives,
//    then flushed in original arrival order before any live fragment.
// 2. Positions are turn-scoped tokens. A position is released on block stop
//    so the producer may reuse it in a later message of the same turn.

/// Output of one correlation step.
#[derive(Debug, Default)]
pub struct Correlated {
    /// Events to forward downstream, in emission order.
    pub events: Vec<NormalizedEvent>,
    /// Invocation whose input just completed and is ready to persist.
    pub completed: Option<ToolInvocation>,
}

impl Correlated {
    fn from_events(events: Vec<NormalizedEvent>) -> Self {
        Self {
            events,
            completed: None,
        }
    }
}

/// Turn-scoped map from transient stream positions to stable tool ids, with
/// buffering for fragments that arrive before the mapping exists.
#[derive(Debug, Default)]
pub struct Correlator {
    position_to_id: HashMap<u32, String>,
    pending_deltas: HashMap<u32, Vec<String>>,
    invocations: HashMap<String, ToolInvocation>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one frame, resolving positions to tool ids.
    pub fn accept(&mut self, frame: Frame, report: &mut AnomalyReport) -> Correlated {
        match frame {
            Frame::Passthrough(event) => Correlated::from_events(vec![event]),

            Frame::ToolStart {
                position,
                id,
                name,
                input,
                artifact,
            } => self.on_tool_start(position, id, name, input, artifact, report),

            Frame::ToolInputDelta { position, fragment } => {
                self.on_input_delta(position, fragment)
            }

            Frame::ToolResult {
                tool_use_id,
                output,
                is_error,
            } => self.on_tool_result(tool_use_id, output, is_error, report),

            Frame::BlockStop { position } => self.on_block_stop(position),
        }
    }

    /// Look up a live invocation by its stable id.
    pub fn invocation(&self, tool_id: &str) -> Option<&ToolInvocation> {
        self.invocations.get(tool_id)
    }

    /// Close the turn: report orphaned fragment buffers and drain the
    /// invocation table so the caller can flush anything still unpersisted.
    pub fn close(&mut self, report: &mut AnomalyReport) -> Vec<ToolInvocation> {
        let mut orphans: Vec<(u32, usize)> = self
            .pending_deltas
            .drain()
            .map(|(position, deltas)| (position, deltas.len()))
            .collect();
        orphans.sort_unstable();

        for (position, count) in orphans {
            // Correlation is impossible without the start event; discard.
            report.record(
                AnomalyKind::OrphanInputDelta,
                format!(
                    "{} buffered fragment(s) at position {} with no tool start",
                    count, position
                ),
            );
        }

        self.position_to_id.clear();

        let mut remaining: Vec<ToolInvocation> = self.invocations.drain().map(|(_, v)| v).collect();
        remaining.sort_by_key(|inv| inv.position);
        remaining
    }

    fn on_tool_start(
        &mut self,
        position: u32,
        id: String,
        name: String,
        input: serde_json::Value,
        artifact: Option<serde_json::Value>,
        report: &mut AnomalyReport,
    ) -> Correlated {
        if self.invocations.contains_key(&id) {
            // Double emission upstream; the first declaration wins.
            report.record(AnomalyKind::DuplicateToolStart, id);
            return Correlated::default();
        }

        self.position_to_id.insert(position, id.clone());

        let mut invocation =
            ToolInvocation::new(id.clone(), position, name.clone(), input.clone());

        let mut events = vec![NormalizedEvent::ToolStart(ToolStartPayload {
            tool_id: id.clone(),
            name,
            input,
        })];

        if let Some(artifact) = artifact {
            events.push(NormalizedEvent::ArtifactDeclared(ArtifactPayload {
                tool_id: id.clone(),
                artifact,
            }));
        }

        // Flush withheld fragments in original arrival order, before any
        // live fragment for this position is accepted.
        if let Some(buffered) = self.pending_deltas.remove(&position) {
            for fragment in buffered {
                invocation.push_fragment(&fragment);
                events.push(NormalizedEvent::ToolInputDelta(ToolInputDeltaPayload {
                    tool_id: id.clone(),
                    partial_input: fragment,
                }));
            }
        }

        self.invocations.insert(id, invocation);
        Correlated::from_events(events)
    }

    fn on_input_delta(&mut self, position: u32, fragment: String) -> Correlated {
        match self.position_to_id.get(&position) {
            Some(id) => {
                let id = id.clone();
                if let Some(invocation) = self.invocations.get_mut(&id) {
                    invocation.push_fragment(&fragment);
                }
                Correlated::from_events(vec![NormalizedEvent::ToolInputDelta(
                    ToolInputDeltaPayload {
                        tool_id: id,
                        partial_input: fragment,
                    },
                )])
            }
            None => {
                // Withhold entirely until the mapping exists.
                self.pending_deltas.entry(position).or_default().push(fragment);
                Correlated::default()
            }
        }
    }

    fn on_tool_result(
        &mut self,
        tool_use_id: String,
        output: String,
        is_error: bool,
        report: &mut AnomalyReport,
    ) -> Correlated {
        let Some(invocation) = self.invocations.get_mut(&tool_use_id) else {
            // Result without a start (possibly from another turn).
            report.record(AnomalyKind::OrphanToolResult, tool_use_id);
            return Correlated::default();
        };

        invocation.result = Some(ToolOutcome {
            output: output.clone(),
            is_error,
        });

        Correlated {
            events: vec![NormalizedEvent::ToolResult(ToolResultPayload {
                tool_id: tool_use_id,
                output,
                is_error,
            })],
            completed: Some(invocation.clone()),
        }
    }

    fn on_block_stop(&mut self, position: u32) -> Correlated {
        // Block stops also arrive for non-tool blocks; an unmapped position
        // is not an anomaly.
        let Some(id) = self.position_to_id.remove(&position) else {
            return Correlated::default();
        };

        Correlated {
            events: Vec::new(),
            completed: self.invocations.get(&id).cloned(),
        }
    }
}
