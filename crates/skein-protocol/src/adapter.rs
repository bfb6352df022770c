use skein_types::{NormalizedEvent, ToolInvocation};

use crate::anomaly::AnomalyReport;
use crate::correlate::Correlator;
use crate::normalize::normalize_item;
use crate::schema::RawStreamItem;

/// Result of pushing one raw item through the adapter.
#[derive(Debug, Default)]
pub struct StreamOutput {
    /// Normalized events in emission order, tool ids fully resolved.
    pub events: Vec<NormalizedEvent>,
    /// Invocations whose input completed during this push.
    pub completed: Vec<ToolInvocation>,
}

/// Bundles the normalizer and correlator into the single turn-scoped entry
/// point the runtime drives: one raw item in, resolved events out.
#[derive(Debug, Default)]
pub struct StreamAdapter {
    correlator: Correlator,
    report: AnomalyReport,
}

impl StreamAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize and correlate one raw item.
    pub fn push(&mut self, item: RawStreamItem) -> StreamOutput {
        let mut output = StreamOutput::default();

        for frame in normalize_item(item, &mut self.report) {
            let correlated = self.correlator.accept(frame, &mut self.report);
            output.events.extend(correlated.events);
            if let Some(invocation) = correlated.completed {
                output.completed.push(invocation);
            }
        }

        output
    }

    /// Close the turn: report orphans, return invocations still unflushed.
    pub fn close(&mut self) -> Vec<ToolInvocation> {
        self.correlator.close(&mut self.report)
    }

    pub fn invocation(&self, tool_id: &str) -> Option<&ToolInvocation> {
        self.correlator.invocation(tool_id)
    }

    pub fn report(&self) -> &AnomalyReport {
        &self.report
    }

    pub fn report_mut(&mut self) -> &mut AnomalyReport {
        &mut self.report
    }
}
