use instant::Duration;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Presence records older than this are excluded from every quorum
    pub liveness_window: Duration,

    /// How long an approval request waits for its quorum
    pub approval_timeout: Duration,

    /// How often the local presence record is re-published
    pub heartbeat_interval: Duration,

    /// Presence records older than this are removed from the registry
    pub purge_after: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            liveness_window: Duration::from_secs(30),
            approval_timeout: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(10),
            purge_after: Duration::from_secs(60),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_liveness_window(mut self, window: Duration) -> Self {
        self.liveness_window = window;
        self
    }

    pub fn with_approval_timeout(mut self, timeout: Duration) -> Self {
        self.approval_timeout = timeout;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_purge_after(mut self, age: Duration) -> Self {
        self.purge_after = age;
        self
    }
}
