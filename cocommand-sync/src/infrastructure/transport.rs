use cocommand_core::{
    Actor, ApprovalRequest, ApprovalResponse, SessionId, SessionMessage, StateEnvelope,
};

/// Transport layer errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transport is not attached to a session")]
    NotAttached,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Inbound events delivered by a transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    State(StateEnvelope),
    ApprovalRequest(ApprovalRequest),
    ApprovalResponse(ApprovalResponse),
    /// Full presence snapshot of the session
    Presence(Vec<Actor>),
}

impl TransportEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            TransportEvent::State(_) => "state",
            TransportEvent::ApprovalRequest(_) => "approval-request",
            TransportEvent::ApprovalResponse(_) => "approval-response",
            TransportEvent::Presence(_) => "presence",
        }
    }
}

impl From<SessionMessage> for TransportEvent {
    fn from(message: SessionMessage) -> Self {
        match message {
            SessionMessage::State(envelope) => TransportEvent::State(envelope),
            SessionMessage::ApprovalRequest(request) => TransportEvent::ApprovalRequest(request),
            SessionMessage::ApprovalResponse(response) => {
                TransportEvent::ApprovalResponse(response)
            }
            SessionMessage::Presence(actors) => TransportEvent::Presence(actors),
        }
    }
}

/// Session event stream and fire-and-forget sends (allows mocking in tests)
///
/// Delivery is at-least-once with no ordering guarantee across event types.
/// Sends return once the message is handed off; they never wait for delivery.
pub trait Transport {
    /// Attach to a session's event stream as `actor`
    ///
    /// A full presence snapshot must be queued for [`poll_events`](Self::poll_events)
    /// immediately after attaching.
    fn join(&mut self, session_id: SessionId, actor: &Actor) -> Result<(), TransportError>;

    /// Detach from the session
    fn leave(&mut self) -> Result<(), TransportError>;

    /// Highest state version known to the transport for the attached session
    fn current_version(&self) -> u64;

    fn broadcast_state(&mut self, envelope: &StateEnvelope) -> Result<(), TransportError>;

    fn send_approval_request(&mut self, request: &ApprovalRequest) -> Result<(), TransportError>;

    fn send_approval_response(&mut self, response: &ApprovalResponse)
        -> Result<(), TransportError>;

    /// Publish the local actor's presence record
    fn track_presence(&mut self, actor: &Actor) -> Result<(), TransportError>;

    /// Drain inbound events
    fn poll_events(&mut self) -> Vec<TransportEvent>;
}
