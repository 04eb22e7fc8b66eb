use crate::infrastructure::transport::{Transport, TransportError, TransportEvent};
use cocommand_core::{
    Actor, ActorId, ApprovalRequest, ApprovalResponse, SessionId, SessionMessage, StateEnvelope,
};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// In-process message bus shared by every [`InMemoryTransport`] created from it
///
/// Simulates a realtime channel service: per-session membership, presence
/// snapshots on every change, broadcast to all other members, and a per-session
/// version counter. Messages travel JSON-encoded, exactly as they would on a
/// real wire.
#[derive(Clone, Default)]
pub struct InMemoryHub {
    state: Arc<Mutex<HubState>>,
}

#[derive(Default)]
struct HubState {
    sessions: HashMap<SessionId, HubSession>,
}

#[derive(Default)]
struct HubSession {
    /// Highest state version broadcast in this session
    version: u64,
    members: BTreeMap<ActorId, Member>,
}

struct Member {
    presence: Actor,
    inbox: VecDeque<Vec<u8>>,
}

impl HubSession {
    fn presence_snapshot(&self) -> Vec<Actor> {
        self.members.values().map(|m| m.presence.clone()).collect()
    }

    /// Queue the current presence snapshot for every member
    fn announce_presence(&mut self) -> Result<(), TransportError> {
        let data = SessionMessage::Presence(self.presence_snapshot()).to_bytes()?;
        for member in self.members.values_mut() {
            member.inbox.push_back(data.clone());
        }
        Ok(())
    }

    fn broadcast_from(&mut self, from: &ActorId, data: Vec<u8>) -> usize {
        let mut delivered = 0;
        for (id, member) in self.members.iter_mut() {
            if id != from {
                member.inbox.push_back(data.clone());
                delivered += 1;
            }
        }
        delivered
    }
}

impl InMemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached transport connected to this hub
    pub fn transport(&self) -> InMemoryTransport {
        InMemoryTransport::new(self.clone())
    }

    /// Highest state version seen in `session_id`
    pub fn version(&self, session_id: &SessionId) -> u64 {
        self.lock()
            .sessions
            .get(session_id)
            .map(|s| s.version)
            .unwrap_or(0)
    }

    /// Actors currently attached to `session_id`
    pub fn members(&self, session_id: &SessionId) -> Vec<ActorId> {
        self.lock()
            .sessions
            .get(session_id)
            .map(|s| s.members.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Deliver `message` straight into one member's inbox
    ///
    /// Bypasses the normal routing so tests can replay duplicates or
    /// reorder deliveries.
    pub fn inject(
        &self,
        session_id: &SessionId,
        to: &ActorId,
        message: &SessionMessage,
    ) -> Result<(), TransportError> {
        let data = message.to_bytes()?;
        self.inject_raw(session_id, to, data)
    }

    /// Deliver raw bytes into one member's inbox
    pub fn inject_raw(
        &self,
        session_id: &SessionId,
        to: &ActorId,
        data: Vec<u8>,
    ) -> Result<(), TransportError> {
        let mut state = self.lock();
        let member = state
            .sessions
            .get_mut(session_id)
            .and_then(|s| s.members.get_mut(to))
            .ok_or_else(|| TransportError::SendFailed(format!("Actor {} not attached", to)))?;

        member.inbox.push_back(data);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn attach(&self, session_id: SessionId, actor: &Actor) -> Result<(), TransportError> {
        let mut state = self.lock();
        let session = state.sessions.entry(session_id).or_default();

        let replaced = session
            .members
            .insert(
                actor.id.clone(),
                Member {
                    presence: actor.clone(),
                    inbox: VecDeque::new(),
                },
            )
            .is_some();

        if replaced {
            tracing::warn!(
                "Actor {} attached twice to session {}, previous attachment replaced",
                actor.id,
                session_id
            );
        }

        tracing::debug!(
            "🔌 Hub: {} attached to session {} ({} member(s))",
            actor.id,
            session_id,
            session.members.len()
        );

        session.announce_presence()
    }

    fn detach(&self, session_id: &SessionId, actor_id: &ActorId) -> Result<(), TransportError> {
        let mut state = self.lock();
        let Some(session) = state.sessions.get_mut(session_id) else {
            return Ok(());
        };

        session.members.remove(actor_id);
        tracing::debug!("🔌 Hub: {} detached from session {}", actor_id, session_id);

        if session.members.is_empty() {
            state.sessions.remove(session_id);
            return Ok(());
        }

        session.announce_presence()
    }

    fn track(&self, session_id: &SessionId, actor: &Actor) -> Result<(), TransportError> {
        let mut state = self.lock();
        let member = state
            .sessions
            .get_mut(session_id)
            .and_then(|s| s.members.get_mut(&actor.id))
            .ok_or(TransportError::NotAttached)?;
        member.presence = actor.clone();

        match state.sessions.get_mut(session_id) {
            Some(session) => session.announce_presence(),
            None => Err(TransportError::NotAttached),
        }
    }

    fn broadcast(
        &self,
        session_id: &SessionId,
        from: &ActorId,
        message: &SessionMessage,
    ) -> Result<usize, TransportError> {
        let data = message.to_bytes()?;
        let mut state = self.lock();
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or(TransportError::NotAttached)?;

        if let SessionMessage::State(envelope) = message {
            session.version = session.version.max(envelope.version);
        }

        Ok(session.broadcast_from(from, data))
    }

    fn drain(&self, session_id: &SessionId, actor_id: &ActorId) -> Vec<Vec<u8>> {
        let mut state = self.lock();
        state
            .sessions
            .get_mut(session_id)
            .and_then(|s| s.members.get_mut(actor_id))
            .map(|m| m.inbox.drain(..).collect())
            .unwrap_or_default()
    }
}

/// Send and receive counters of one [`InMemoryTransport`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct TransportStats {
    pub states_sent: usize,
    pub requests_sent: usize,
    pub responses_sent: usize,
    pub presence_sent: usize,
    pub failed_sends: usize,
    pub events_received: usize,
}

impl TransportStats {
    /// Every send attempt, successful or not
    pub fn total_sends(&self) -> usize {
        self.states_sent
            + self.requests_sent
            + self.responses_sent
            + self.presence_sent
            + self.failed_sends
    }
}

/// [`Transport`] backed by an [`InMemoryHub`]
pub struct InMemoryTransport {
    hub: InMemoryHub,
    attachment: Option<(SessionId, ActorId)>,
    fail_sends: bool,
    stats: TransportStats,
}

impl InMemoryTransport {
    pub fn new(hub: InMemoryHub) -> Self {
        Self {
            hub,
            attachment: None,
            fail_sends: false,
            stats: TransportStats::default(),
        }
    }

    pub fn hub(&self) -> &InMemoryHub {
        &self.hub
    }

    pub fn stats(&self) -> TransportStats {
        self.stats
    }

    /// Make every outbound send fail (fault injection)
    pub fn set_fail_sends(&mut self, fail: bool) {
        self.fail_sends = fail;
    }

    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    fn attachment(&self) -> Result<(SessionId, ActorId), TransportError> {
        self.attachment.clone().ok_or(TransportError::NotAttached)
    }

    fn check_outbound(&mut self) -> Result<(SessionId, ActorId), TransportError> {
        let attachment = self.attachment()?;
        if self.fail_sends {
            self.stats.failed_sends += 1;
            return Err(TransportError::SendFailed(
                "Outbound channel unavailable".to_string(),
            ));
        }
        Ok(attachment)
    }

    fn send(&mut self, message: SessionMessage) -> Result<(), TransportError> {
        let (session_id, actor_id) = self.check_outbound()?;
        let delivered = self.hub.broadcast(&session_id, &actor_id, &message)?;

        tracing::trace!(
            "📤 {} → {} peer(s): {}",
            actor_id,
            delivered,
            message.kind()
        );

        Ok(())
    }
}

impl Transport for InMemoryTransport {
    fn join(&mut self, session_id: SessionId, actor: &Actor) -> Result<(), TransportError> {
        if let Some((current, _)) = &self.attachment {
            if *current != session_id {
                self.leave()?;
            }
        }

        self.hub.attach(session_id, actor)?;
        self.attachment = Some((session_id, actor.id.clone()));
        Ok(())
    }

    fn leave(&mut self) -> Result<(), TransportError> {
        if let Some((session_id, actor_id)) = self.attachment.take() {
            self.hub.detach(&session_id, &actor_id)?;
        }
        Ok(())
    }

    fn current_version(&self) -> u64 {
        self.attachment
            .as_ref()
            .map(|(session_id, _)| self.hub.version(session_id))
            .unwrap_or(0)
    }

    fn broadcast_state(&mut self, envelope: &StateEnvelope) -> Result<(), TransportError> {
        self.send(SessionMessage::State(envelope.clone()))?;
        self.stats.states_sent += 1;
        Ok(())
    }

    fn send_approval_request(&mut self, request: &ApprovalRequest) -> Result<(), TransportError> {
        self.send(SessionMessage::ApprovalRequest(request.clone()))?;
        self.stats.requests_sent += 1;
        Ok(())
    }

    fn send_approval_response(
        &mut self,
        response: &ApprovalResponse,
    ) -> Result<(), TransportError> {
        self.send(SessionMessage::ApprovalResponse(response.clone()))?;
        self.stats.responses_sent += 1;
        Ok(())
    }

    fn track_presence(&mut self, actor: &Actor) -> Result<(), TransportError> {
        let (session_id, _) = self.check_outbound()?;
        self.hub.track(&session_id, actor)?;
        self.stats.presence_sent += 1;
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        let Some((session_id, actor_id)) = self.attachment.clone() else {
            return Vec::new();
        };

        let mut events = Vec::new();
        for data in self.hub.drain(&session_id, &actor_id) {
            match SessionMessage::from_slice(&data) {
                Ok(message) => events.push(TransportEvent::from(message)),
                Err(e) => {
                    tracing::warn!("Dropping undecodable message for {}: {}", actor_id, e);
                }
            }
        }

        self.stats.events_received += events.len();
        events
    }
}

impl Drop for InMemoryTransport {
    fn drop(&mut self) {
        if let Err(e) = self.leave() {
            tracing::debug!("Failed to detach on drop: {}", e);
        }
    }
}
