use crate::application::SessionState;
use crate::infrastructure::TransportError;
use cocommand_core::{ActorError, RequestId};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Unknown approval request: {0}")]
    UnknownRequest(RequestId),

    #[error("State version space exhausted at v{0}")]
    VersionExhausted(u64),

    #[error("Invalid actor: {0}")]
    Actor(#[from] ActorError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
