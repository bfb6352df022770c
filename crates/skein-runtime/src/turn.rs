use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use skein_protocol::{AnomalyReport, RawStreamItem, StreamAdapter};
use skein_store::HistoryStore;
use skein_types::{NormalizedEvent, RecordPayload, ToolInvocation, TurnStats, Usage};

use crate::binder::SessionBinder;
use crate::sink::EventSink;
use crate::writer::HistoryWriter;

// NOTE: Per-turn ownership
//
// Everything mutable about a turn lives inside this context: correlator
// maps, binder state, writer de-dup guards, text buffer. Concurrent turns
// each own one context and share nothing but the durable store, so no
// locking is needed and turn close discards all of it safely.
//
// Consumption is cooperative: each raw item is carried to completion
// (normalize -> correlate -> persist -> forward) before the caller reads the
// next one, so a slow store naturally throttles the stream. Nothing here
// retries; retry policy belongs to the owner of the raw stream.

/// State and pipeline for one request/response cycle.
pub struct TurnContext {
    turn_id: String,
    store: Arc<dyn HistoryStore>,
    adapter: StreamAdapter,
    binder: SessionBinder,
    writer: HistoryWriter,
    sink: Box<dyn EventSink>,

    /// Root user_text record of the turn, if its write succeeded.
    root_record: Option<Uuid>,
    /// Most recent assistant text segment record.
    segment_tip: Option<Uuid>,
    /// Accumulated assistant text since the last segment boundary.
    text_buffer: String,
    /// Parent captured at ToolStart time for each invocation.
    invocation_parents: HashMap<String, Option<Uuid>>,
    /// Artifacts declared before their invocation record exists.
    pending_artifacts: HashMap<String, Vec<Value>>,

    last_stop_reason: Option<String>,
    last_usage: Option<Usage>,
    stats: Option<TurnStats>,
    closed: bool,
}

impl TurnContext {
    pub(crate) fn new(
        turn_id: &str,
        store: Arc<dyn HistoryStore>,
        sink: Box<dyn EventSink>,
        user_text: Option<&str>,
    ) -> Self {
        let mut context = Self {
            turn_id: turn_id.to_string(),
            store: store.clone(),
            adapter: StreamAdapter::new(),
            binder: SessionBinder::new(turn_id),
            writer: HistoryWriter::new(turn_id, store),
            sink,
            root_record: None,
            segment_tip: None,
            text_buffer: String::new(),
            invocation_parents: HashMap::new(),
            pending_artifacts: HashMap::new(),
            last_stop_reason: None,
            last_usage: None,
            stats: None,
            closed: false,
        };

        if let Some(text) = user_text
            && !text.is_empty()
        {
            context.root_record = context.persist(
                RecordPayload::UserText {
                    text: text.to_string(),
                },
                None,
            );
        }

        context
    }

    /// Carry one raw item to completion: normalize, correlate, persist,
    /// forward. Items pushed after close are dropped with a warning.
    pub fn push(&mut self, item: RawStreamItem) {
        if self.closed {
            tracing::warn!(turn_id = %self.turn_id, "raw item after turn close; dropping");
            return;
        }

        let output = self.adapter.push(item);

        // Completed invocations persist before their result events so a
        // tool_result record is always created strictly after its
        // invocation record.
        for invocation in &output.completed {
            self.flush_invocation(invocation);
        }

        for event in output.events {
            self.sink.emit(&self.turn_id, &event);
            self.handle_event(event);
        }
    }

    /// Close the turn normally: flush buffered text and any invocation not
    /// yet persisted, then stop accepting items. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }

        self.flush_text();
        let remaining = self.adapter.close();
        for invocation in remaining {
            self.flush_invocation(&invocation);
        }

        self.closed = true;
        tracing::debug!(
            turn_id = %self.turn_id,
            anomalies = self.adapter.report().total(),
            "turn closed"
        );
    }

    /// Abandon the turn (client disconnect): in-flight correlator state and
    /// buffered text are discarded unpersisted. Records already written
    /// remain valid partial history.
    pub fn abort(&mut self) {
        if self.closed {
            return;
        }

        let discarded = self.adapter.close();
        if !discarded.is_empty() || !self.text_buffer.is_empty() {
            tracing::debug!(
                turn_id = %self.turn_id,
                invocations = discarded.len(),
                buffered_text = self.text_buffer.len(),
                "turn aborted; in-flight state discarded"
            );
        }

        self.text_buffer.clear();
        self.pending_artifacts.clear();
        self.closed = true;
    }

    pub fn turn_id(&self) -> &str {
        &self.turn_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Session id once observed, whether or not the rebind has landed yet.
    pub fn session_id(&self) -> Option<&str> {
        self.binder.current()
    }

    pub fn root_record_id(&self) -> Option<Uuid> {
        self.root_record
    }

    pub fn anomalies(&self) -> &AnomalyReport {
        self.adapter.report()
    }

    pub fn stats(&self) -> Option<&TurnStats> {
        self.stats.as_ref()
    }

    pub fn last_stop_reason(&self) -> Option<&str> {
        self.last_stop_reason.as_deref()
    }

    /// Most recent usage reported by a message_delta, if any.
    pub fn last_usage(&self) -> Option<&Usage> {
        self.last_usage.as_ref()
    }

    fn handle_event(&mut self, event: NormalizedEvent) {
        match event {
            NormalizedEvent::TextDelta(payload) => {
                self.text_buffer.push_str(&payload.text);
            }

            NormalizedEvent::ToolStart(payload) => {
                // Segment boundary: the text streamed so far is one
                // assistant message, and the invocation hangs off it.
                self.flush_text();
                self.invocation_parents.insert(
                    payload.tool_id.clone(),
                    self.segment_tip.or(self.root_record),
                );
            }

            // Input accumulates inside the correlator's invocation table.
            NormalizedEvent::ToolInputDelta(_) => {}

            NormalizedEvent::ToolResult(payload) => {
                let parent = self.writer.invocation_record_id(&payload.tool_id);
                self.persist(
                    RecordPayload::ToolResult {
                        tool_id: payload.tool_id,
                        output: payload.output,
                        is_error: payload.is_error,
                    },
                    parent,
                );
            }

            NormalizedEvent::ArtifactDeclared(payload) => {
                self.pending_artifacts
                    .entry(payload.tool_id)
                    .or_default()
                    .push(payload.artifact);
            }

            NormalizedEvent::MessageMeta(payload) => {
                if payload.stop_reason.is_some() {
                    self.last_stop_reason = payload.stop_reason;
                }
                if payload.usage.is_some() {
                    self.last_usage = payload.usage;
                }
            }

            NormalizedEvent::MessageStop => {
                self.flush_text();
            }

            NormalizedEvent::LifecycleInit(payload) => {
                self.binder.observe(&payload.session_id, &*self.store);
            }

            NormalizedEvent::TerminalResult(payload) => {
                self.binder.observe(&payload.session_id, &*self.store);
                self.stats = payload.stats;
                self.close();
            }
        }
    }

    /// Flush the accumulated text buffer as one assistant_text record.
    fn flush_text(&mut self) {
        if self.text_buffer.is_empty() {
            return;
        }

        let text = std::mem::take(&mut self.text_buffer);
        let parent = self.root_record;
        if let Some(id) = self.persist(RecordPayload::AssistantText { text }, parent) {
            self.segment_tip = Some(id);
        }
    }

    /// Persist an invocation with its fully accumulated input, exactly once,
    /// then release any artifacts that were declared for it.
    fn flush_invocation(&mut self, invocation: &ToolInvocation) {
        let already_written = self.writer.invocation_record_id(&invocation.id).is_some();

        let parent = self
            .invocation_parents
            .get(&invocation.id)
            .copied()
            .flatten()
            .or(self.root_record);

        let session = self.binder.current().map(str::to_string);
        let record_id = self.writer.write_invocation(
            invocation,
            parent,
            session.as_deref(),
            self.adapter.report_mut(),
        );

        let Some(record_id) = record_id else {
            return;
        };

        if !already_written {
            self.binder.retry(&*self.store);
        }

        if let Some(artifacts) = self.pending_artifacts.remove(&invocation.id) {
            for artifact in artifacts {
                self.persist(
                    RecordPayload::Artifact {
                        tool_id: invocation.id.clone(),
                        artifact,
                    },
                    Some(record_id),
                );
            }
        }
    }

    fn persist(&mut self, payload: RecordPayload, parent: Option<Uuid>) -> Option<Uuid> {
        let session = self.binder.current().map(str::to_string);
        let id = self.writer.write(payload, parent, session.as_deref());
        if id.is_some() {
            self.binder.retry(&*self.store);
        }
        id
    }
}
