pub mod domain;
pub mod schema;

pub use domain::{
    Actor, ActorError, ActorId, ActorMeta, ApprovalDecision, ApprovalRequest, ApprovalResponse,
    CommandRole, IgnoreReason, Identity, ParseError, PendingApproval, PresenceRegistry, RequestId,
    SessionId, SessionMessage, StateEnvelope, StaticIdentity, Tally, Timestamp, VersionWatermark,
};
