use crate::domain::{ActorId, SessionId, Timestamp};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A versioned snapshot of shared game state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StateEnvelope {
    /// Session this snapshot belongs to
    pub session_id: SessionId,

    /// Actor that published the snapshot
    pub origin_actor_id: ActorId,

    /// Monotonically increasing per session
    pub version: u64,

    /// When the snapshot was published
    pub timestamp: Timestamp,

    /// Game state, owned by the rules layer and never inspected here
    pub payload: serde_json::Value,
}

impl StateEnvelope {
    pub fn new(
        session_id: SessionId,
        origin_actor_id: ActorId,
        version: u64,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            session_id,
            origin_actor_id,
            version,
            timestamp: Timestamp::now(),
            payload,
        }
    }
}
