use crate::infrastructure::Transport;
use cocommand_core::{
    ActorId, ApprovalDecision, ApprovalRequest, ApprovalResponse, PendingApproval, RequestId,
    SessionId, Tally,
};
use futures::channel::oneshot;
use instant::{Duration, Instant};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Eventual answer to an [`ensure_action`](crate::SessionCoordinator::ensure_action) call
///
/// Resolves exactly once. Await it, or check it from a poll loop with
/// [`try_decision`](Self::try_decision).
#[derive(Debug)]
pub struct ActionOutcome {
    request_id: Option<RequestId>,
    state: OutcomeState,
}

#[derive(Debug)]
enum OutcomeState {
    Waiting(oneshot::Receiver<ApprovalDecision>),
    Resolved(ApprovalDecision),
}

impl ActionOutcome {
    /// Outcome known without a round trip
    pub fn ready(decision: ApprovalDecision) -> Self {
        Self {
            request_id: None,
            state: OutcomeState::Resolved(decision),
        }
    }

    fn waiting(request_id: RequestId, rx: oneshot::Receiver<ApprovalDecision>) -> Self {
        Self {
            request_id: Some(request_id),
            state: OutcomeState::Waiting(rx),
        }
    }

    /// Id of the approval request, if one was sent
    pub fn request_id(&self) -> Option<RequestId> {
        self.request_id
    }

    /// Non-blocking check; `None` while the request is still pending
    pub fn try_decision(&mut self) -> Option<ApprovalDecision> {
        let decision = match &mut self.state {
            OutcomeState::Resolved(decision) => return Some(decision.clone()),
            OutcomeState::Waiting(rx) => match rx.try_recv() {
                Ok(Some(decision)) => decision,
                Ok(None) => return None,
                Err(oneshot::Canceled) => ApprovalDecision::Cancelled,
            },
        };

        self.state = OutcomeState::Resolved(decision.clone());
        Some(decision)
    }

    pub fn is_resolved(&mut self) -> bool {
        self.try_decision().is_some()
    }
}

impl Future for ActionOutcome {
    type Output = ApprovalDecision;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let decision = match &mut this.state {
            OutcomeState::Resolved(decision) => return Poll::Ready(decision.clone()),
            OutcomeState::Waiting(rx) => match Pin::new(rx).poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Ok(decision)) => decision,
                Poll::Ready(Err(oneshot::Canceled)) => ApprovalDecision::Cancelled,
            },
        };

        this.state = OutcomeState::Resolved(decision.clone());
        Poll::Ready(decision)
    }
}

struct Entry {
    pending: PendingApproval,
    resolver: oneshot::Sender<ApprovalDecision>,
}

impl Entry {
    fn resolve(self, decision: ApprovalDecision) {
        // Caller may have dropped the outcome; nothing left to notify
        let _ = self.resolver.send(decision);
    }
}

/// Unanimous-consent gate for sensitive actions
///
/// Owns the approval requests this actor issued. Each resolves once: on the
/// first veto, on the last required approval, on its deadline, or when the
/// session is left.
pub struct ApprovalEngine {
    session_id: SessionId,
    actor_id: ActorId,
    timeout: Duration,
    pending: HashMap<RequestId, Entry>,
}

impl ApprovalEngine {
    pub fn new(session_id: SessionId, actor_id: ActorId, timeout: Duration) -> Self {
        Self {
            session_id,
            actor_id,
            timeout,
            pending: HashMap::new(),
        }
    }

    /// Ask every actor in `others` to approve `action`
    ///
    /// With nobody else live the action is approved on the spot and nothing is
    /// sent. A request that cannot be handed to the transport fails closed.
    pub fn request<T: Transport>(
        &mut self,
        transport: &mut T,
        others: BTreeSet<ActorId>,
        action: &str,
        payload: Option<serde_json::Value>,
        description: Option<String>,
    ) -> ActionOutcome {
        if others.is_empty() {
            tracing::debug!(
                "✅ {} is the only live commander, '{}' approved",
                self.actor_id,
                action
            );
            return ActionOutcome::ready(ApprovalDecision::Unilateral);
        }

        let mut request =
            ApprovalRequest::new(self.session_id, self.actor_id.clone(), action, payload);
        if let Some(description) = description {
            request = request.with_description(description);
        }
        let request_id = request.id;

        if let Err(e) = transport.send_approval_request(&request) {
            tracing::warn!("❌ Approval request for '{}' not sent: {}", action, e);
            return ActionOutcome::ready(ApprovalDecision::TransportFailed {
                reason: e.to_string(),
            });
        }

        tracing::info!(
            "🗳️  Requested approval for '{}' from {} commander(s) (request {})",
            action,
            others.len(),
            request_id
        );

        let (resolver, rx) = oneshot::channel();
        self.pending.insert(
            request_id,
            Entry {
                pending: PendingApproval::new(request, others, self.timeout),
                resolver,
            },
        );

        ActionOutcome::waiting(request_id, rx)
    }

    /// Feed a peer's response; returns the decision if it resolved a request
    pub fn handle_response(&mut self, response: &ApprovalResponse) -> Option<ApprovalDecision> {
        if response.session_id != self.session_id {
            tracing::warn!(
                "Ignoring approval response from foreign session {}",
                response.session_id
            );
            return None;
        }

        let Some(entry) = self.pending.get_mut(&response.id) else {
            tracing::debug!("Ignoring response to unknown request {}", response.id);
            return None;
        };

        let decision = match entry.pending.record(response) {
            Tally::Waiting { remaining } => {
                tracing::debug!(
                    "👍 {} approved request {}, {} remaining",
                    response.actor_id,
                    response.id,
                    remaining
                );
                return None;
            }
            Tally::Ignored(reason) => {
                tracing::debug!(
                    "Ignoring response from {} to {}: {:?}",
                    response.actor_id,
                    response.id,
                    reason
                );
                return None;
            }
            Tally::Unanimous => ApprovalDecision::Approved,
            Tally::Vetoed { by, notes } => ApprovalDecision::Vetoed { by, notes },
        };

        self.resolve(response.id, decision.clone());
        Some(decision)
    }

    /// Resolve every request whose deadline has passed at `now`
    pub fn expire(&mut self, now: Instant) -> Vec<RequestId> {
        let expired: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|(_, entry)| entry.pending.is_expired_at(now))
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            let missing = self
                .pending
                .get(id)
                .map(|entry| entry.pending.missing())
                .unwrap_or_default();
            self.resolve(*id, ApprovalDecision::TimedOut { missing });
        }

        expired
    }

    /// Resolve every outstanding request as cancelled
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        for (_, entry) in self.pending.drain() {
            entry.resolve(ApprovalDecision::Cancelled);
        }

        if count > 0 {
            tracing::info!("Cancelled {} pending approval request(s)", count);
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, request_id: &RequestId) -> bool {
        self.pending.contains_key(request_id)
    }

    /// Required responders of a pending request
    pub fn required(&self, request_id: &RequestId) -> Option<&BTreeSet<ActorId>> {
        self.pending.get(request_id).map(|entry| entry.pending.required())
    }

    fn resolve(&mut self, request_id: RequestId, decision: ApprovalDecision) {
        if let Some(entry) = self.pending.remove(&request_id) {
            tracing::info!(
                "🏁 Request {} for '{}' resolved: {}",
                request_id,
                entry.pending.request().action,
                decision
            );
            entry.resolve(decision);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::InMemoryHub;
    use cocommand_core::Actor;

    fn id(s: &str) -> ActorId {
        ActorId::new(s).unwrap()
    }

    fn others(ids: &[&str]) -> BTreeSet<ActorId> {
        ids.iter().map(|s| id(s)).collect()
    }

    struct Setup {
        _hub: InMemoryHub,
        transport: crate::infrastructure::InMemoryTransport,
        engine: ApprovalEngine,
        session: SessionId,
    }

    fn setup(timeout: Duration) -> Setup {
        let hub = InMemoryHub::new();
        let session = SessionId::new();
        let mut transport = hub.transport();
        transport.join(session, &Actor::new(id("alice"))).unwrap();
        Setup {
            _hub: hub,
            transport,
            engine: ApprovalEngine::new(session, id("alice"), timeout),
            session,
        }
    }

    fn response(
        session: SessionId,
        request: RequestId,
        from: &str,
        approved: bool,
    ) -> ApprovalResponse {
        ApprovalResponse {
            id: request,
            session_id: session,
            actor_id: id(from),
            approved,
            responded_at: cocommand_core::Timestamp::now(),
            notes: None,
        }
    }

    #[test]
    fn test_no_others_is_unilateral() {
        let mut s = setup(Duration::from_secs(30));
        let mut outcome = s.engine.request(&mut s.transport, BTreeSet::new(), "BUILD", None, None);

        assert_eq!(outcome.try_decision(), Some(ApprovalDecision::Unilateral));
        assert!(outcome.request_id().is_none());
        assert_eq!(s.transport.stats().requests_sent, 0);
    }

    #[test]
    fn test_unanimous_approval() {
        let mut s = setup(Duration::from_secs(30));
        let mut outcome =
            s.engine
                .request(&mut s.transport, others(&["bob", "carol"]), "BUILD", None, None);
        let request_id = outcome.request_id().unwrap();

        assert_eq!(s.engine.handle_response(&response(s.session, request_id, "bob", true)), None);
        assert!(!outcome.is_resolved());

        assert_eq!(
            s.engine.handle_response(&response(s.session, request_id, "carol", true)),
            Some(ApprovalDecision::Approved)
        );
        assert_eq!(outcome.try_decision(), Some(ApprovalDecision::Approved));
        assert_eq!(s.engine.pending_count(), 0);
    }

    #[test]
    fn test_veto_resolves_immediately() {
        let mut s = setup(Duration::from_secs(30));
        let mut outcome =
            s.engine
                .request(&mut s.transport, others(&["bob", "carol"]), "BUILD", None, None);
        let request_id = outcome.request_id().unwrap();

        s.engine.handle_response(&response(s.session, request_id, "carol", false));
        assert!(matches!(
            outcome.try_decision(),
            Some(ApprovalDecision::Vetoed { ref by, .. }) if by.as_str() == "carol"
        ));

        // Late approval is ignored
        assert_eq!(s.engine.handle_response(&response(s.session, request_id, "bob", true)), None);
    }

    #[test]
    fn test_non_required_and_foreign_responses_ignored() {
        let mut s = setup(Duration::from_secs(30));
        let mut outcome = s.engine.request(&mut s.transport, others(&["bob"]), "BUILD", None, None);
        let request_id = outcome.request_id().unwrap();

        s.engine.handle_response(&response(s.session, request_id, "mallory", false));
        s.engine.handle_response(&response(SessionId::new(), request_id, "bob", false));
        s.engine.handle_response(&response(s.session, RequestId::new(), "bob", false));

        assert!(!outcome.is_resolved());
        assert_eq!(s.engine.pending_count(), 1);
    }

    #[test]
    fn test_expire_times_out_with_missing() {
        let mut s = setup(Duration::from_secs(30));
        let mut outcome =
            s.engine
                .request(&mut s.transport, others(&["bob", "carol"]), "BUILD", None, None);
        let request_id = outcome.request_id().unwrap();
        s.engine.handle_response(&response(s.session, request_id, "bob", true));

        assert!(s.engine.expire(Instant::now()).is_empty());
        let expired = s.engine.expire(Instant::now() + Duration::from_secs(31));

        assert_eq!(expired, vec![request_id]);
        assert_eq!(
            outcome.try_decision(),
            Some(ApprovalDecision::TimedOut {
                missing: vec![id("carol")]
            })
        );
    }

    #[test]
    fn test_transport_failure_fails_closed() {
        let mut s = setup(Duration::from_secs(30));
        s.transport.set_fail_sends(true);

        let mut outcome = s.engine.request(&mut s.transport, others(&["bob"]), "BUILD", None, None);

        assert!(matches!(
            outcome.try_decision(),
            Some(ApprovalDecision::TransportFailed { .. })
        ));
        assert_eq!(s.engine.pending_count(), 0);
    }

    #[test]
    fn test_cancel_all() {
        let mut s = setup(Duration::from_secs(30));
        let mut first = s.engine.request(&mut s.transport, others(&["bob"]), "BUILD", None, None);
        let mut second = s.engine.request(&mut s.transport, others(&["bob"]), "TRADE", None, None);

        assert_eq!(s.engine.cancel_all(), 2);
        assert_eq!(first.try_decision(), Some(ApprovalDecision::Cancelled));
        assert_eq!(second.try_decision(), Some(ApprovalDecision::Cancelled));
    }

    #[test]
    fn test_outcome_can_be_awaited() {
        let mut s = setup(Duration::from_secs(30));
        let outcome = s.engine.request(&mut s.transport, others(&["bob"]), "BUILD", None, None);
        let request_id = outcome.request_id().unwrap();
        s.engine.handle_response(&response(s.session, request_id, "bob", true));

        let decision = futures::executor::block_on(outcome);
        assert_eq!(decision, ApprovalDecision::Approved);
    }

    #[test]
    fn test_dropped_engine_resolves_cancelled() {
        let mut s = setup(Duration::from_secs(30));
        let mut outcome = s.engine.request(&mut s.transport, others(&["bob"]), "BUILD", None, None);
        drop(s.engine);

        assert_eq!(outcome.try_decision(), Some(ApprovalDecision::Cancelled));
    }
}
