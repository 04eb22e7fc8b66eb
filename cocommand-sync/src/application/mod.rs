pub mod approval;
pub mod config;
pub mod coordinator;
pub mod listeners;
#[cfg(feature = "native")]
pub mod runtime;
pub mod state_channel;

pub use approval::{ActionOutcome, ApprovalEngine};
pub use config::SessionConfig;
pub use coordinator::{InMemorySessionCoordinator, SessionCoordinator, SessionState};
pub use listeners::{Listeners, Subscription};
#[cfg(feature = "native")]
pub use runtime::settle;
pub use state_channel::StateChannel;
