use skein_store::HistoryStore;

// NOTE: Two-phase session binding
//
// The caller generates the turn id before the producer's session id exists,
// so early records are written with session_id = NULL and rebound in place
// once the id is observed. This is a lightweight two-phase commit, modeled
// as an explicit state machine instead of nullable-field checks scattered
// along the write path. The Unbound -> Bound transition fires exactly once
// per turn; a failed rebind keeps the observed id and retries on the next
// successful write. Event processing never blocks on a rebind failure.

/// Binding state of a turn's session id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindState {
    Unbound,
    Bound(String),
}

/// Manages the two-phase lifecycle of a turn's session id.
pub struct SessionBinder {
    turn_id: String,
    state: BindState,
    /// Observed but not yet applied (the rebind call failed).
    observed: Option<String>,
}

impl SessionBinder {
    pub fn new(turn_id: &str) -> Self {
        Self {
            turn_id: turn_id.to_string(),
            state: BindState::Unbound,
            observed: None,
        }
    }

    pub fn state(&self) -> &BindState {
        &self.state
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.state, BindState::Bound(_))
    }

    /// Session id new records should be created with, if known.
    pub fn current(&self) -> Option<&str> {
        match &self.state {
            BindState::Bound(id) => Some(id),
            BindState::Unbound => self.observed.as_deref(),
        }
    }

    /// Absorb a session id from a lifecycle or terminal event. Empty ids are
    /// ignored; after the one transition, later observations are no-ops.
    pub fn observe(&mut self, session_id: &str, store: &dyn HistoryStore) {
        if session_id.is_empty() {
            return;
        }

        match &self.state {
            BindState::Bound(bound) => {
                if bound != session_id {
                    tracing::warn!(
                        turn_id = %self.turn_id,
                        bound = %bound,
                        observed = %session_id,
                        "conflicting session id observed after bind; keeping first"
                    );
                }
            }
            BindState::Unbound => {
                self.observed = Some(session_id.to_string());
                self.try_bind(store);
            }
        }
    }

    /// Opportunistic retry, called after each successful record write.
    pub fn retry(&mut self, store: &dyn HistoryStore) {
        if !self.is_bound() && self.observed.is_some() {
            self.try_bind(store);
        }
    }

    fn try_bind(&mut self, store: &dyn HistoryStore) {
        let Some(session_id) = self.observed.clone() else {
            return;
        };

        match store.rebind_session_id(&self.turn_id, &session_id) {
            Ok(updated) => {
                tracing::debug!(
                    turn_id = %self.turn_id,
                    session_id = %session_id,
                    updated,
                    "session id bound"
                );
                self.state = BindState::Bound(session_id);
                self.observed = None;
            }
            Err(err) => {
                tracing::warn!(
                    turn_id = %self.turn_id,
                    session_id = %session_id,
                    error = %err,
                    "session rebind failed; will retry on next write"
                );
            }
        }
    }
}
