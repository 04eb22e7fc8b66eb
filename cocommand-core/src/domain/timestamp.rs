use instant::{Duration, Instant};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp in milliseconds since application start (monotonic)
///
/// Serializable and comparable. Uses `instant::Instant` internally so the same
/// code runs on native and WASM targets. Values are only meaningful within the
/// process that produced them; liveness decisions never compare a remote
/// timestamp against a local one.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    JsonSchema,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a timestamp representing the current moment
    pub fn now() -> Self {
        // Shared anchor for every timestamp in the process
        static ANCHOR: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
        let anchor = ANCHOR.get_or_init(Instant::now);

        let elapsed = Instant::now().duration_since(*anchor);
        Timestamp(elapsed.as_millis() as u64)
    }

    /// Create a timestamp from a raw milliseconds value
    pub fn from_millis(millis: u64) -> Self {
        Timestamp(millis)
    }

    /// Get the raw milliseconds value
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Time elapsed between `earlier` and `self` (zero if `earlier` is later)
    pub fn saturating_since(&self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }

    /// Timestamp shifted forward by `by`
    pub fn plus(&self, by: Duration) -> Self {
        Timestamp(self.0.saturating_add(by.as_millis() as u64))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}
