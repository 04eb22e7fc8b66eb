/// Highest state version accepted for a session
///
/// Versions only move forward: anything at or below the watermark is a
/// duplicate or arrived out of order and must not be surfaced again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionWatermark {
    highest: u64,
}

impl VersionWatermark {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest version accepted so far (0 if none)
    pub fn current(&self) -> u64 {
        self.highest
    }

    /// Raise the watermark to at least `version`
    pub fn seed(&mut self, version: u64) {
        self.highest = self.highest.max(version);
    }

    /// Accept `version` if it is strictly newer, advancing the watermark
    pub fn accept(&mut self, version: u64) -> bool {
        if version > self.highest {
            self.highest = version;
            true
        } else {
            false
        }
    }

    /// Version to stamp on the next outgoing snapshot
    ///
    /// Strictly greater than both the transport's counter and everything this
    /// instance has published or accepted. `None` once either counter has
    /// reached `u64::MAX`.
    pub fn next_version(&self, transport_version: u64) -> Option<u64> {
        self.highest.max(transport_version).checked_add(1)
    }

    pub fn reset(&mut self) {
        self.highest = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_only_strictly_newer() {
        let mut watermark = VersionWatermark::new();

        assert!(watermark.accept(1));
        assert!(watermark.accept(3));
        assert!(!watermark.accept(3)); // duplicate
        assert!(!watermark.accept(2)); // late
        assert!(watermark.accept(4));
        assert_eq!(watermark.current(), 4);
    }

    #[test]
    fn test_next_version_respects_both_counters() {
        let mut watermark = VersionWatermark::new();
        watermark.seed(5);

        assert_eq!(watermark.next_version(2), Some(6));
        assert_eq!(watermark.next_version(9), Some(10));
    }

    #[test]
    fn test_next_version_exhausted() {
        let mut watermark = VersionWatermark::new();
        assert!(watermark.accept(u64::MAX));

        assert_eq!(watermark.next_version(0), None);
        assert_eq!(VersionWatermark::new().next_version(u64::MAX), None);
        assert_eq!(VersionWatermark::new().next_version(u64::MAX - 1), Some(u64::MAX));
    }

    #[test]
    fn test_seed_never_lowers() {
        let mut watermark = VersionWatermark::new();
        watermark.seed(8);
        watermark.seed(3);
        assert_eq!(watermark.current(), 8);

        watermark.reset();
        assert_eq!(watermark.current(), 0);
    }
}
