use crate::domain::{ActorId, ApprovalRequest, ApprovalResponse};
use instant::{Duration, Instant};
use std::collections::BTreeSet;

/// Result of feeding one response into a [`PendingApproval`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tally {
    /// Still waiting for `remaining` approvals
    Waiting { remaining: usize },

    /// Every required responder approved
    Unanimous,

    /// A required responder rejected the action
    Vetoed {
        by: ActorId,
        notes: Option<String>,
    },

    /// Response did not affect the outcome
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Response belongs to another request
    OtherRequest,
    /// Response belongs to another session
    OtherSession,
    /// Responder is not part of the quorum for this request
    NotRequired,
    /// Responder already approved
    Duplicate,
}

/// Bookkeeping for one outstanding approval request
///
/// The required responder set is fixed when the request is issued. A member
/// that later goes stale stays required; only a response or the deadline ends
/// the request.
#[derive(Debug, Clone)]
pub struct PendingApproval {
    request: ApprovalRequest,
    required: BTreeSet<ActorId>,
    approved: BTreeSet<ActorId>,
    deadline: Instant,
}

impl PendingApproval {
    pub fn new(request: ApprovalRequest, required: BTreeSet<ActorId>, timeout: Duration) -> Self {
        Self {
            request,
            required,
            approved: BTreeSet::new(),
            deadline: Instant::now() + timeout,
        }
    }

    pub fn request(&self) -> &ApprovalRequest {
        &self.request
    }

    pub fn required(&self) -> &BTreeSet<ActorId> {
        &self.required
    }

    pub fn approved(&self) -> &BTreeSet<ActorId> {
        &self.approved
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Required responders that have not approved yet
    pub fn missing(&self) -> Vec<ActorId> {
        self.required.difference(&self.approved).cloned().collect()
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// Feed a response into the tally
    pub fn record(&mut self, response: &ApprovalResponse) -> Tally {
        if response.id != self.request.id {
            return Tally::Ignored(IgnoreReason::OtherRequest);
        }

        if response.session_id != self.request.session_id {
            return Tally::Ignored(IgnoreReason::OtherSession);
        }

        if !self.required.contains(&response.actor_id) {
            return Tally::Ignored(IgnoreReason::NotRequired);
        }

        if !response.approved {
            return Tally::Vetoed {
                by: response.actor_id.clone(),
                notes: response.notes.clone(),
            };
        }

        if !self.approved.insert(response.actor_id.clone()) {
            return Tally::Ignored(IgnoreReason::Duplicate);
        }

        let remaining = self.required.len() - self.approved.len();
        if remaining == 0 {
            Tally::Unanimous
        } else {
            Tally::Waiting { remaining }
        }
    }
}
