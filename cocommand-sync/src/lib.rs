//! Session synchronization and approval consensus for co-commanded nations
//!
//! A [`SessionCoordinator`] attaches one commander to a session through a
//! [`Transport`], keeps the presence registry current, relays versioned
//! shared-state snapshots and gates sensitive actions behind the unanimous
//! consent of every other live commander.

pub mod application;
pub mod error;
pub mod infrastructure;

pub use application::{
    ActionOutcome, ApprovalEngine, InMemorySessionCoordinator, Listeners, SessionConfig,
    SessionCoordinator, SessionState, StateChannel, Subscription,
};
#[cfg(feature = "native")]
pub use application::settle;
pub use error::{Result, SessionError};
pub use infrastructure::{
    InMemoryHub, InMemoryTransport, Transport, TransportError, TransportEvent, TransportStats,
};

pub use cocommand_core::{
    Actor, ActorId, ActorMeta, ApprovalDecision, ApprovalRequest, ApprovalResponse, CommandRole,
    Identity, PresenceRegistry, RequestId, SessionId, SessionMessage, StateEnvelope,
    StaticIdentity, Timestamp,
};
