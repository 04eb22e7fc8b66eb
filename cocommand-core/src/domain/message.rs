use crate::domain::{Actor, ApprovalRequest, ApprovalResponse, StateEnvelope};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Messages exchanged between session members
///
/// Encoded as `{"type": "...", "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum SessionMessage {
    /// Versioned game state snapshot
    State(StateEnvelope),

    /// A commander asks the others for consent
    ApprovalRequest(ApprovalRequest),

    /// A commander answers a consent request
    ApprovalResponse(ApprovalResponse),

    /// Full presence snapshot of the session
    Presence(Vec<Actor>),
}

impl SessionMessage {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_slice(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    /// Wire discriminator, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            SessionMessage::State(_) => "state",
            SessionMessage::ApprovalRequest(_) => "approval-request",
            SessionMessage::ApprovalResponse(_) => "approval-response",
            SessionMessage::Presence(_) => "presence",
        }
    }
}
