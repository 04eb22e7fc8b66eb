pub mod actor;
pub mod approval;
pub mod envelope;
pub mod identity;
pub mod message;
pub mod pending;
pub mod presence;
pub mod session;
pub mod timestamp;
pub mod watermark;

pub use actor::{Actor, ActorError, ActorId, ActorMeta, CommandRole};
pub use approval::{ApprovalDecision, ApprovalRequest, ApprovalResponse, RequestId};
pub use envelope::StateEnvelope;
pub use identity::{Identity, StaticIdentity};
pub use message::SessionMessage;
pub use pending::{IgnoreReason, PendingApproval, Tally};
pub use presence::PresenceRegistry;
pub use session::{ParseError, SessionId};
pub use timestamp::Timestamp;
pub use watermark::VersionWatermark;
