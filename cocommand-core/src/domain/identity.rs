use crate::domain::ActorId;

/// Supplies the local actor's identity at session-join time
pub trait Identity {
    fn actor_id(&self) -> ActorId;
}

/// Identity fixed at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticIdentity(ActorId);

impl StaticIdentity {
    pub fn new(actor_id: ActorId) -> Self {
        Self(actor_id)
    }
}

impl Identity for StaticIdentity {
    fn actor_id(&self) -> ActorId {
        self.0.clone()
    }
}

impl Identity for ActorId {
    fn actor_id(&self) -> ActorId {
        self.clone()
    }
}
