use crate::application::listeners::{Listeners, Subscription};
use crate::error::{Result, SessionError};
use crate::infrastructure::Transport;
use cocommand_core::{ActorId, SessionId, StateEnvelope, VersionWatermark};

/// Versioned broadcast of shared game state for one session
///
/// Inbound envelopes reach subscribers in strictly increasing version order;
/// anything at or below the watermark is a duplicate or arrived out of order
/// and is dropped.
pub struct StateChannel {
    session_id: SessionId,
    watermark: VersionWatermark,
    latest: Option<StateEnvelope>,
    listeners: Listeners<StateEnvelope>,
    dropped: usize,
}

impl StateChannel {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            watermark: VersionWatermark::new(),
            latest: None,
            listeners: Listeners::new(),
            dropped: 0,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Raise the watermark to a version already known to the transport
    pub fn seed(&mut self, version: u64) {
        self.watermark.seed(version);
    }

    /// Broadcast `payload` as the next version and return that version
    ///
    /// The watermark moves only once the transport accepted the envelope.
    /// Local subscribers are not invoked for local publishes.
    pub fn publish<T: Transport>(
        &mut self,
        transport: &mut T,
        origin: &ActorId,
        payload: serde_json::Value,
    ) -> Result<u64> {
        let known = transport.current_version().max(self.watermark.current());
        let version = self
            .watermark
            .next_version(known)
            .ok_or(SessionError::VersionExhausted(known))?;
        let envelope = StateEnvelope::new(self.session_id, origin.clone(), version, payload);

        transport.broadcast_state(&envelope)?;

        self.watermark.seed(version);
        self.latest = Some(envelope);

        tracing::debug!("📡 Published state v{} to session {}", version, self.session_id);
        Ok(version)
    }

    pub fn subscribe(&self, callback: impl FnMut(&StateEnvelope) + 'static) -> Subscription {
        self.listeners.subscribe(callback)
    }

    /// Apply an inbound envelope; returns true if subscribers saw it
    pub fn receive(&mut self, envelope: StateEnvelope) -> bool {
        if envelope.session_id != self.session_id {
            tracing::warn!(
                "Dropping state v{} from foreign session {}",
                envelope.version,
                envelope.session_id
            );
            self.dropped += 1;
            return false;
        }

        if !self.watermark.accept(envelope.version) {
            tracing::debug!(
                "Dropping stale state v{} from {} (watermark v{})",
                envelope.version,
                envelope.origin_actor_id,
                self.watermark.current()
            );
            self.dropped += 1;
            return false;
        }

        let listeners = self.listeners.emit(&envelope);
        tracing::debug!(
            "📥 Applied state v{} from {} ({} listener(s))",
            envelope.version,
            envelope.origin_actor_id,
            listeners
        );

        self.latest = Some(envelope);
        true
    }

    /// Last envelope published or accepted
    pub fn latest(&self) -> Option<&StateEnvelope> {
        self.latest.as_ref()
    }

    pub fn watermark(&self) -> u64 {
        self.watermark.current()
    }

    /// Inbound envelopes discarded as stale, duplicate or foreign
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Forget all versions; subscribers stay registered
    pub fn reset(&mut self, session_id: SessionId) {
        self.session_id = session_id;
        self.watermark.reset();
        self.latest = None;
        self.dropped = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::InMemoryHub;
    use cocommand_core::Actor;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn alice() -> ActorId {
        ActorId::new("alice").unwrap()
    }

    fn envelope(session: SessionId, version: u64) -> StateEnvelope {
        let bob = ActorId::new("bob").unwrap();
        StateEnvelope::new(session, bob, version, json!({ "v": version }))
    }

    fn recorder(channel: &StateChannel) -> Rc<RefCell<Vec<u64>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _sub = channel.subscribe(move |e| sink.borrow_mut().push(e.version));
        seen
    }

    #[test]
    fn test_receive_drops_stale_and_duplicate() {
        let session = SessionId::new();
        let mut channel = StateChannel::new(session);
        let seen = recorder(&channel);

        assert!(channel.receive(envelope(session, 2)));
        assert!(!channel.receive(envelope(session, 2)));
        assert!(!channel.receive(envelope(session, 1)));
        assert!(channel.receive(envelope(session, 5)));

        assert_eq!(*seen.borrow(), vec![2, 5]);
        assert_eq!(channel.watermark(), 5);
        assert_eq!(channel.dropped(), 2);
    }

    #[test]
    fn test_receive_drops_foreign_session() {
        let mut channel = StateChannel::new(SessionId::new());
        let seen = recorder(&channel);

        assert!(!channel.receive(envelope(SessionId::new(), 1)));
        assert!(seen.borrow().is_empty());
        assert_eq!(channel.watermark(), 0);
    }

    #[test]
    fn test_seed_suppresses_older_versions() {
        let session = SessionId::new();
        let mut channel = StateChannel::new(session);
        channel.seed(10);

        assert!(!channel.receive(envelope(session, 10)));
        assert!(channel.receive(envelope(session, 11)));
    }

    #[test]
    fn test_publish_uses_max_of_transport_and_watermark() {
        let hub = InMemoryHub::new();
        let session = SessionId::new();
        let mut transport = hub.transport();
        transport.join(session, &Actor::new(alice())).unwrap();

        let mut channel = StateChannel::new(session);
        channel.seed(3);

        let version = channel.publish(&mut transport, &alice(), json!({})).unwrap();
        assert_eq!(version, 4);
        assert_eq!(channel.watermark(), 4);
        assert_eq!(hub.version(&session), 4);
        assert_eq!(channel.latest().map(|e| e.version), Some(4));
    }

    #[test]
    fn test_failed_publish_keeps_watermark() {
        let hub = InMemoryHub::new();
        let session = SessionId::new();
        let mut transport = hub.transport();
        transport.join(session, &Actor::new(alice())).unwrap();
        transport.set_fail_sends(true);

        let mut channel = StateChannel::new(session);
        assert!(matches!(
            channel.publish(&mut transport, &alice(), json!({})),
            Err(SessionError::Transport(_))
        ));
        assert_eq!(channel.watermark(), 0);
        assert!(channel.latest().is_none());
    }

    #[test]
    fn test_publish_after_max_version_fails() {
        let hub = InMemoryHub::new();
        let session = SessionId::new();
        let mut transport = hub.transport();
        transport.join(session, &Actor::new(alice())).unwrap();

        let mut channel = StateChannel::new(session);
        assert!(channel.receive(envelope(session, u64::MAX)));

        assert!(matches!(
            channel.publish(&mut transport, &alice(), json!({})),
            Err(SessionError::VersionExhausted(u64::MAX))
        ));
        assert_eq!(channel.watermark(), u64::MAX);
        assert_eq!(hub.version(&session), 0);
        assert_eq!(transport.stats().states_sent, 0);
    }

    #[test]
    fn test_publish_does_not_invoke_local_subscribers() {
        let hub = InMemoryHub::new();
        let session = SessionId::new();
        let mut transport = hub.transport();
        transport.join(session, &Actor::new(alice())).unwrap();

        let mut channel = StateChannel::new(session);
        let seen = recorder(&channel);
        channel.publish(&mut transport, &alice(), json!({})).unwrap();

        assert!(seen.borrow().is_empty());
    }
}
