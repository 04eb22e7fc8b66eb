use crate::application::approval::{ActionOutcome, ApprovalEngine};
use crate::application::config::SessionConfig;
use crate::application::listeners::{Listeners, Subscription};
use crate::application::state_channel::StateChannel;
use crate::error::{Result, SessionError};
use crate::infrastructure::{InMemoryTransport, Transport, TransportEvent};
use cocommand_core::{
    Actor, ActorId, ActorMeta, ApprovalRequest, ApprovalResponse, Identity, PresenceRegistry,
    RequestId, SessionId, StateEnvelope,
};
use instant::Instant;
use std::collections::HashMap;
use std::fmt;

/// Lifecycle of a coordinator's attachment to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unattached,
    Joining,
    Active,
    Leaving,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Unattached => "unattached",
            SessionState::Joining => "joining",
            SessionState::Active => "active",
            SessionState::Leaving => "leaving",
        };
        write!(f, "{}", name)
    }
}

/// A peer's request waiting for the local commander's answer
#[derive(Debug, Clone)]
struct InboundRequest {
    request: ApprovalRequest,
    received_at: Instant,
}

/// Everything that only exists while attached to a session
struct Attached {
    session_id: SessionId,
    actor_id: ActorId,
    engine: ApprovalEngine,
    inbound: HashMap<RequestId, InboundRequest>,
    last_heartbeat: Instant,
}

fn active<'a>(
    state: SessionState,
    attached: &'a mut Option<Attached>,
    operation: &'static str,
) -> Result<&'a mut Attached> {
    match (state, attached.as_mut()) {
        (SessionState::Active, Some(attached)) => Ok(attached),
        _ => Err(SessionError::InvalidState { operation, state }),
    }
}

/// Per-session orchestration of presence, shared state and approvals
///
/// Single-threaded and poll driven: call [`poll`](Self::poll) regularly to
/// route inbound traffic, expire approval deadlines and send heartbeats.
///
/// ```text
/// unattached ──join──▶ joining ──▶ active ──leave──▶ leaving ──▶ unattached
///                         │
///                         └── transport error ──▶ unattached
/// ```
pub struct SessionCoordinator<T: Transport> {
    transport: T,
    identity: Box<dyn Identity>,
    config: SessionConfig,
    state: SessionState,
    attached: Option<Attached>,
    registry: PresenceRegistry,
    channel: StateChannel,
    presence_listeners: Listeners<Vec<Actor>>,
    request_listeners: Listeners<ApprovalRequest>,
}

/// Coordinator wired to the in-process hub
pub type InMemorySessionCoordinator = SessionCoordinator<InMemoryTransport>;

impl<T: Transport> SessionCoordinator<T> {
    pub fn new(transport: T, identity: impl Identity + 'static, config: SessionConfig) -> Self {
        let registry = PresenceRegistry::with_liveness_window(config.liveness_window);

        Self {
            transport,
            identity: Box::new(identity),
            config,
            state: SessionState::Unattached,
            attached: None,
            registry,
            channel: StateChannel::new(SessionId::default()),
            presence_listeners: Listeners::new(),
            request_listeners: Listeners::new(),
        }
    }

    /// Attach to `session_id` as the actor supplied by the identity
    pub fn join(&mut self, session_id: SessionId) -> Result<()> {
        if self.state != SessionState::Unattached {
            return Err(SessionError::InvalidState {
                operation: "join",
                state: self.state,
            });
        }

        self.state = SessionState::Joining;
        let actor_id = self.identity.actor_id();

        self.registry.clear();
        let me = self.registry.update(&actor_id, &ActorMeta::default());

        if let Err(e) = self.transport.join(session_id, &me) {
            tracing::warn!("❌ {} failed to join session {}: {}", actor_id, session_id, e);
            self.registry.clear();
            self.state = SessionState::Unattached;
            return Err(e.into());
        }

        self.channel.reset(session_id);
        self.channel.seed(self.transport.current_version());

        self.attached = Some(Attached {
            session_id,
            engine: ApprovalEngine::new(session_id, actor_id.clone(), self.config.approval_timeout),
            actor_id: actor_id.clone(),
            inbound: HashMap::new(),
            last_heartbeat: Instant::now(),
        });
        self.state = SessionState::Active;

        tracing::info!(
            "✅ {} joined session {} at state v{}",
            actor_id,
            session_id,
            self.channel.watermark()
        );

        self.emit_presence();
        Ok(())
    }

    /// Detach from the session; pending approvals resolve as cancelled
    ///
    /// The coordinator ends up unattached even if the transport reports an
    /// error while detaching.
    pub fn leave(&mut self) -> Result<()> {
        if self.state != SessionState::Active {
            return Err(SessionError::InvalidState {
                operation: "leave",
                state: self.state,
            });
        }

        self.state = SessionState::Leaving;

        let Some(mut attached) = self.attached.take() else {
            self.state = SessionState::Unattached;
            return Ok(());
        };

        attached.engine.cancel_all();
        attached.inbound.clear();
        self.registry.clear();
        self.channel.reset(attached.session_id);

        let result = self.transport.leave();
        self.state = SessionState::Unattached;

        tracing::info!("👋 {} left session {}", attached.actor_id, attached.session_id);
        result.map_err(SessionError::from)
    }

    /// Ask every other live commander to approve `action`
    pub fn ensure_action(
        &mut self,
        action: &str,
        payload: Option<serde_json::Value>,
    ) -> Result<ActionOutcome> {
        self.request_action(action, payload, None)
    }

    pub fn ensure_action_with_description(
        &mut self,
        action: &str,
        payload: Option<serde_json::Value>,
        description: impl Into<String>,
    ) -> Result<ActionOutcome> {
        self.request_action(action, payload, Some(description.into()))
    }

    fn request_action(
        &mut self,
        action: &str,
        payload: Option<serde_json::Value>,
        description: Option<String>,
    ) -> Result<ActionOutcome> {
        let attached = active(self.state, &mut self.attached, "ensure_action")?;
        let others = self.registry.others_excluding(&attached.actor_id);

        Ok(attached
            .engine
            .request(&mut self.transport, others, action, payload, description))
    }

    /// Broadcast a new shared-state snapshot; returns its version
    pub fn publish_state(&mut self, payload: serde_json::Value) -> Result<u64> {
        let attached = active(self.state, &mut self.attached, "publish_state")?;
        let version = self
            .channel
            .publish(&mut self.transport, &attached.actor_id, payload)?;
        Ok(version)
    }

    /// Called with every accepted inbound state envelope, in version order
    pub fn register_state_listener(
        &self,
        callback: impl FnMut(&StateEnvelope) + 'static,
    ) -> Subscription {
        self.channel.subscribe(callback)
    }

    /// Called with the live presence snapshot whenever it changes
    pub fn register_presence_listener(
        &self,
        callback: impl FnMut(&Vec<Actor>) + 'static,
    ) -> Subscription {
        self.presence_listeners.subscribe(callback)
    }

    /// Called when a peer asks the local commander to approve an action
    pub fn register_approval_request_listener(
        &self,
        callback: impl FnMut(&ApprovalRequest) + 'static,
    ) -> Subscription {
        self.request_listeners.subscribe(callback)
    }

    /// Merge `meta` into the local presence record and publish it
    pub fn update_presence(&mut self, meta: ActorMeta) -> Result<()> {
        let attached = active(self.state, &mut self.attached, "update_presence")?;
        let me = self.registry.update(&attached.actor_id, &meta);
        attached.last_heartbeat = Instant::now();

        self.emit_presence();
        self.transport.track_presence(&me)?;
        Ok(())
    }

    /// Answer a peer's approval request
    ///
    /// The request stays answerable if the response could not be sent.
    pub fn respond(
        &mut self,
        request_id: RequestId,
        approved: bool,
        notes: Option<String>,
    ) -> Result<()> {
        let attached = active(self.state, &mut self.attached, "respond")?;
        let response = match attached.inbound.get(&request_id) {
            Some(inbound) => inbound
                .request
                .respond(attached.actor_id.clone(), approved, notes),
            None => return Err(SessionError::UnknownRequest(request_id)),
        };

        self.transport.send_approval_response(&response)?;
        attached.inbound.remove(&request_id);

        tracing::debug!(
            "{} {} request {}",
            attached.actor_id,
            if approved { "approved" } else { "vetoed" },
            request_id
        );
        Ok(())
    }

    /// Peers' requests still waiting for a local answer, oldest first
    pub fn pending_requests(&self) -> Vec<ApprovalRequest> {
        let mut requests: Vec<ApprovalRequest> = self
            .attached
            .iter()
            .flat_map(|a| a.inbound.values())
            .map(|inbound| inbound.request.clone())
            .collect();
        requests.sort_by_key(|r| r.requested_at);
        requests
    }

    /// Live actors in the session, sorted by id
    pub fn presence(&self) -> Vec<Actor> {
        self.registry.snapshot()
    }

    pub fn registry(&self) -> &PresenceRegistry {
        &self.registry
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn actor_id(&self) -> Option<&ActorId> {
        self.attached.as_ref().map(|a| &a.actor_id)
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.attached.as_ref().map(|a| a.session_id)
    }

    pub fn watermark(&self) -> u64 {
        self.channel.watermark()
    }

    pub fn latest_state(&self) -> Option<&StateEnvelope> {
        self.channel.latest()
    }

    /// Inbound state envelopes discarded as stale or duplicate
    pub fn dropped_states(&self) -> usize {
        self.channel.dropped()
    }

    /// Approval requests issued locally and not yet resolved
    pub fn pending_approvals(&self) -> usize {
        self.attached
            .as_ref()
            .map(|a| a.engine.pending_count())
            .unwrap_or(0)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Drive the session: route inbound events, expire deadlines, prune
    /// stale records and heartbeat. Returns the number of events processed.
    pub fn poll(&mut self) -> usize {
        if self.state != SessionState::Active {
            return 0;
        }

        let events = self.transport.poll_events();
        let count = events.len();
        for event in events {
            self.route(event);
        }

        self.expire();
        self.heartbeat();
        self.purge();

        count
    }

    fn route(&mut self, event: TransportEvent) {
        tracing::trace!("Routing {} event", event.kind());

        match event {
            TransportEvent::State(envelope) => {
                self.channel.receive(envelope);
            }
            TransportEvent::ApprovalRequest(request) => self.handle_request(request),
            TransportEvent::ApprovalResponse(response) => self.handle_response(&response),
            TransportEvent::Presence(actors) => {
                let Some(attached) = self.attached.as_ref() else {
                    return;
                };
                if self.registry.apply_snapshot(actors, &attached.actor_id) {
                    self.emit_presence();
                }
            }
        }
    }

    fn handle_request(&mut self, request: ApprovalRequest) {
        let Some(attached) = self.attached.as_mut() else {
            return;
        };

        if request.session_id != attached.session_id {
            tracing::warn!(
                "Ignoring approval request {} from foreign session {}",
                request.id,
                request.session_id
            );
            return;
        }

        if request.actor_id == attached.actor_id || attached.inbound.contains_key(&request.id) {
            return;
        }

        tracing::info!(
            "📨 {} asks {} to approve '{}'",
            request.actor_id,
            attached.actor_id,
            request.action
        );

        attached.inbound.insert(
            request.id,
            InboundRequest {
                request: request.clone(),
                received_at: Instant::now(),
            },
        );
        self.request_listeners.emit(&request);
    }

    fn handle_response(&mut self, response: &ApprovalResponse) {
        if let Some(attached) = self.attached.as_mut() {
            attached.engine.handle_response(response);
        }
    }

    fn expire(&mut self) {
        let timeout = self.config.approval_timeout;
        let Some(attached) = self.attached.as_mut() else {
            return;
        };

        let now = Instant::now();
        attached.engine.expire(now);

        let before = attached.inbound.len();
        attached
            .inbound
            .retain(|_, inbound| now.duration_since(inbound.received_at) < timeout);
        let pruned = before - attached.inbound.len();
        if pruned > 0 {
            tracing::debug!("Pruned {} unanswered inbound request(s)", pruned);
        }
    }

    fn heartbeat(&mut self) {
        let Some(attached) = self.attached.as_mut() else {
            return;
        };

        if attached.last_heartbeat.elapsed() < self.config.heartbeat_interval {
            return;
        }
        attached.last_heartbeat = Instant::now();

        let me = match self.registry.touch(&attached.actor_id) {
            Some(me) => me,
            None => self
                .registry
                .update(&attached.actor_id, &ActorMeta::default()),
        };

        if let Err(e) = self.transport.track_presence(&me) {
            tracing::warn!("💔 Presence heartbeat for {} failed: {}", me.id, e);
        }
    }

    fn purge(&mut self) {
        let Some(attached) = self.attached.as_ref() else {
            return;
        };

        let purged = self
            .registry
            .purge_stale_except(self.config.purge_after, &attached.actor_id);
        if !purged.is_empty() {
            tracing::info!("Removed stale commander(s): {:?}", purged);
            self.emit_presence();
        }
    }

    fn emit_presence(&self) {
        self.presence_listeners.emit(&self.registry.snapshot());
    }
}
