#![allow(dead_code)]

use cocommand_sync::{
    ActionOutcome, ActorId, ApprovalDecision, ApprovalRequest, InMemoryHub,
    InMemorySessionCoordinator, RequestId, SessionConfig, SessionCoordinator, SessionId,
    StateEnvelope, StaticIdentity,
};
use std::cell::RefCell;
use std::rc::Rc;

pub const NAMES: [&str; 6] = ["alpha", "bravo", "charlie", "delta", "echo", "foxtrot"];

pub fn actor_id(index: usize) -> ActorId {
    ActorId::new(NAMES[index]).unwrap()
}

pub fn create_commander(
    hub: &InMemoryHub,
    index: usize,
    config: SessionConfig,
) -> InMemorySessionCoordinator {
    SessionCoordinator::new(hub.transport(), StaticIdentity::new(actor_id(index)), config)
}

/// N commanders attached to one session over an in-memory hub
pub struct SessionFixture {
    pub hub: InMemoryHub,
    pub session_id: SessionId,
    pub commanders: Vec<InMemorySessionCoordinator>,
}

impl SessionFixture {
    pub fn new(count: usize) -> Self {
        Self::with_config(count, SessionConfig::default())
    }

    pub fn with_config(count: usize, config: SessionConfig) -> Self {
        let hub = InMemoryHub::new();
        let session_id = SessionId::new();

        let mut commanders = Vec::new();
        for i in 0..count {
            let mut commander = create_commander(&hub, i, config.clone());
            commander.join(session_id).unwrap();
            commanders.push(commander);
        }

        let mut fixture = Self {
            hub,
            session_id,
            commanders,
        };
        fixture.poll_until_stable(10);
        fixture
    }

    /// Poll every commander `count` times, in index order
    pub fn tick(&mut self, count: usize) {
        for _ in 0..count {
            for commander in self.commanders.iter_mut() {
                commander.poll();
            }
        }
    }

    /// Poll until a full round processes no events
    pub fn poll_until_stable(&mut self, max_rounds: usize) -> usize {
        for round in 0..max_rounds {
            let processed: usize = self.commanders.iter_mut().map(|c| c.poll()).sum();
            if processed == 0 {
                return round;
            }
        }
        max_rounds
    }

    /// Tick until `outcome` resolves or `max_ticks` rounds pass
    pub fn settle(
        &mut self,
        outcome: &mut ActionOutcome,
        max_ticks: usize,
    ) -> Option<ApprovalDecision> {
        for _ in 0..max_ticks {
            if let Some(decision) = outcome.try_decision() {
                return Some(decision);
            }
            self.tick(1);
        }
        outcome.try_decision()
    }

    /// Answer every pending request of commander `index`
    pub fn answer_all(&mut self, index: usize, approved: bool) -> usize {
        let commander = &mut self.commanders[index];
        let requests = commander.pending_requests();
        for request in &requests {
            commander.respond(request.id, approved, None).unwrap();
        }
        requests.len()
    }

    pub fn requests_sent(&self, index: usize) -> usize {
        self.commanders[index].transport().stats().requests_sent
    }
}

/// Collects every state envelope delivered to one commander
pub fn record_states(commander: &InMemorySessionCoordinator) -> Rc<RefCell<Vec<StateEnvelope>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let _sub = commander
        .register_state_listener(move |envelope| sink.borrow_mut().push(envelope.clone()));
    seen
}

/// Collects the ids of approval requests announced to one commander
pub fn record_requests(commander: &InMemorySessionCoordinator) -> Rc<RefCell<Vec<RequestId>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let _sub = commander.register_approval_request_listener(move |request: &ApprovalRequest| {
        sink.borrow_mut().push(request.id)
    });
    seen
}
