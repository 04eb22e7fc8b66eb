use crate::domain::{ActorId, ParseError, SessionId, Timestamp};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Globally unique identifier of one approval request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, ParseError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| ParseError::InvalidRequestId(e.to_string()))
    }

    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Request for peer consent before a sensitive action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ApprovalRequest {
    pub id: RequestId,

    pub session_id: SessionId,

    /// Requesting actor
    pub actor_id: ActorId,

    /// Symbolic action name, e.g. `BUILD` or `DECLARE_WAR`
    pub action: String,

    /// Command-specific payload (opaque to this layer)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub requested_at: Timestamp,
}

impl ApprovalRequest {
    pub fn new(
        session_id: SessionId,
        actor_id: ActorId,
        action: impl Into<String>,
        payload: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: RequestId::new(),
            session_id,
            actor_id,
            action: action.into(),
            payload,
            description: None,
            requested_at: Timestamp::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Build the answer to this request on behalf of `responder`
    pub fn respond(
        &self,
        responder: ActorId,
        approved: bool,
        notes: Option<String>,
    ) -> ApprovalResponse {
        ApprovalResponse {
            id: self.id,
            session_id: self.session_id,
            actor_id: responder,
            approved,
            responded_at: Timestamp::now(),
            notes,
        }
    }
}

/// A peer's answer to an [`ApprovalRequest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ApprovalResponse {
    /// Matches the request id
    pub id: RequestId,

    pub session_id: SessionId,

    /// Responding actor
    pub actor_id: ActorId,

    pub approved: bool,

    pub responded_at: Timestamp,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// How an attempted action was resolved
///
/// Callers only care about [`ApprovalDecision::is_approved`]; the variants exist
/// so denials can be told apart in logs and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApprovalDecision {
    /// No other live commander, no consent needed
    Unilateral,

    /// Every required responder approved
    Approved,

    /// A responder rejected the action
    Vetoed {
        by: ActorId,
        notes: Option<String>,
    },

    /// The approval window closed before the quorum was complete
    TimedOut { missing: Vec<ActorId> },

    /// The session was left while the request was pending
    Cancelled,

    /// The request could not be handed to the transport
    TransportFailed { reason: String },
}

impl ApprovalDecision {
    pub fn is_approved(&self) -> bool {
        matches!(
            self,
            ApprovalDecision::Unilateral | ApprovalDecision::Approved
        )
    }
}

impl From<ApprovalDecision> for bool {
    fn from(decision: ApprovalDecision) -> Self {
        decision.is_approved()
    }
}

impl fmt::Display for ApprovalDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalDecision::Unilateral => write!(f, "approved (sole commander)"),
            ApprovalDecision::Approved => write!(f, "approved"),
            ApprovalDecision::Vetoed { by, .. } => write!(f, "vetoed by {}", by),
            ApprovalDecision::TimedOut { missing } => {
                write!(f, "timed out waiting for {} responder(s)", missing.len())
            }
            ApprovalDecision::Cancelled => write!(f, "cancelled"),
            ApprovalDecision::TransportFailed { reason } => {
                write!(f, "transport failure: {}", reason)
            }
        }
    }
}
