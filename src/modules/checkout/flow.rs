//! Lifecycle of a single checkout attempt.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    #[default]
    Idle,
    SessionRequested,
    SessionCreated,
    Rejected,
    Completed,
    Cancelled,
}

impl CheckoutState {
    pub fn can_transition_to(self, next: CheckoutState) -> bool {
        use CheckoutState::*;
        matches!(
            (self, next),
            (Idle, SessionRequested)
                | (SessionRequested, SessionCreated)
                | (SessionRequested, Rejected)
                | (SessionCreated, Cancelled)
                // an earlier provider session may still be paid after the
                // customer cancelled or retried
                | (SessionCreated | Cancelled | Rejected, Completed)
                // a fresh attempt may follow any settled one, including an
                // abandoned provider session
                | (SessionCreated | Rejected | Completed | Cancelled, SessionRequested)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("checkout cannot move from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: CheckoutState,
    pub to: CheckoutState,
}

/// State of the current checkout attempt, kept in the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutAttempt {
    pub state: CheckoutState,
    /// Provider session id once created
    pub session_id: Option<String>,
    pub order_id: Option<String>,
    /// ISBNs dropped during price re-validation
    pub dropped: Vec<String>,
    /// Provider sessions issued for the current cart, any of which may be paid
    #[serde(default)]
    pub open_sessions: Vec<String>,
    /// Provider sessions whose payment already emptied a cart
    #[serde(default)]
    pub settled_sessions: Vec<String>,
}

impl CheckoutAttempt {
    pub fn transition(&mut self, next: CheckoutState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(from = ?self.state, to = ?next, "checkout transition");
        self.state = next;
        Ok(())
    }

    /// Start a new attempt. Sessions issued earlier stay open.
    pub fn begin(&mut self) -> Result<(), InvalidTransition> {
        self.transition(CheckoutState::SessionRequested)?;
        self.session_id = None;
        self.order_id = None;
        self.dropped.clear();
        Ok(())
    }

    pub fn record_session(&mut self, session_id: &str) {
        self.session_id = Some(session_id.to_string());
        self.open_sessions.push(session_id.to_string());
    }

    pub fn is_open(&self, session_id: &str) -> bool {
        self.open_sessions.iter().any(|id| id == session_id)
    }

    pub fn is_settled(&self, session_id: &str) -> bool {
        self.settled_sessions.iter().any(|id| id == session_id)
    }

    /// Mark the cart as paid; every open session is settled with it.
    pub fn settle(&mut self) -> Result<(), InvalidTransition> {
        self.transition(CheckoutState::Completed)?;
        let open = std::mem::take(&mut self.open_sessions);
        self.settled_sessions.extend(open);
        Ok(())
    }
}
