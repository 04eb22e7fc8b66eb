use crate::domain::Timestamp;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of a client-chosen actor identifier
pub const MAX_ACTOR_ID_LEN: usize = 64;

/// Errors that can occur when working with actors
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ActorError {
    #[error("Actor ID cannot be empty")]
    EmptyId,

    #[error("Actor ID must be at most {max} characters")]
    IdTooLong { max: usize },
}

/// Stable, client-chosen identifier of a session participant
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(try_from = "String", into = "String")]
#[schemars(transparent)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Result<Self, ActorError> {
        let id = id.into();
        let trimmed = id.trim();

        if trimmed.is_empty() {
            return Err(ActorError::EmptyId);
        }

        if trimmed.chars().count() > MAX_ACTOR_ID_LEN {
            return Err(ActorError::IdTooLong {
                max: MAX_ACTOR_ID_LEN,
            });
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ActorId {
    type Error = ActorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ActorId> for String {
    fn from(id: ActorId) -> Self {
        id.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Command specialization of a commander. Descriptive only, never used for
/// access control.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CommandRole {
    Strategist,
    Tactician,
    Diplomat,
    Economist,
    Custom(String),
}

impl fmt::Display for CommandRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandRole::Strategist => write!(f, "Strategist"),
            CommandRole::Tactician => write!(f, "Tactician"),
            CommandRole::Diplomat => write!(f, "Diplomat"),
            CommandRole::Economist => write!(f, "Economist"),
            CommandRole::Custom(tag) => write!(f, "{}", tag),
        }
    }
}

/// Partial presence update merged into an [`Actor`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActorMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<CommandRole>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
}

impl ActorMeta {
    pub fn with_role(mut self, role: CommandRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_ready(mut self, ready: bool) -> Self {
        self.ready = Some(ready);
        self
    }
}

/// A participant attached to a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Actor {
    pub id: ActorId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<CommandRole>,

    #[serde(default)]
    pub ready: bool,

    /// Bumped by the owning actor on every presence update or heartbeat
    #[serde(default)]
    pub revision: u64,

    /// Local time this record was last refreshed
    pub last_seen: Timestamp,
}

impl Actor {
    pub fn new(id: ActorId) -> Self {
        Self {
            id,
            role: None,
            ready: false,
            revision: 0,
            last_seen: Timestamp::now(),
        }
    }

    /// Merge the fields present in `meta`
    pub fn apply(&mut self, meta: &ActorMeta) {
        if let Some(role) = &meta.role {
            self.role = Some(role.clone());
        }
        if let Some(ready) = meta.ready {
            self.ready = ready;
        }
    }

    /// Check if this record is older than `window` at time `now`
    pub fn is_stale_at(&self, now: Timestamp, window: instant::Duration) -> bool {
        now.saturating_since(self.last_seen) >= window
    }
}
