use crate::infrastructure::{CliError, Result};
use cocommand_sync::{
    ActorId, ActorMeta, ApprovalDecision, CommandRole, InMemoryHub, InMemorySessionCoordinator,
    SessionConfig, SessionCoordinator, SessionId, StaticIdentity,
};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

const ROLES: [CommandRole; 4] = [
    CommandRole::Strategist,
    CommandRole::Tactician,
    CommandRole::Diplomat,
    CommandRole::Economist,
];

/// Parameters of one simulated co-command session
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub commanders: usize,
    pub action: String,
    /// Commander that rejects the request
    pub veto: Option<usize>,
    /// Commander that never answers
    pub silent: Option<usize>,
    pub approval_timeout: Duration,
    pub tick: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            commanders: 3,
            action: "BUILD".to_string(),
            veto: None,
            silent: None,
            approval_timeout: Duration::from_secs(2),
            tick: Duration::from_millis(10),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.commanders == 0 {
            return Err(CliError::InvalidConfig(
                "At least one commander is required".to_string(),
            ));
        }

        if self.action.trim().is_empty() {
            return Err(CliError::InvalidConfig("Action must not be empty".to_string()));
        }

        for (flag, index) in [("veto", self.veto), ("silent", self.silent)] {
            match index {
                Some(0) => {
                    return Err(CliError::InvalidConfig(format!(
                        "--{} cannot name commander 0, it issues the request",
                        flag
                    )));
                }
                Some(i) if i >= self.commanders => {
                    return Err(CliError::InvalidConfig(format!(
                        "--{} {} is out of range for {} commander(s)",
                        flag, i, self.commanders
                    )));
                }
                _ => {}
            }
        }

        if self.tick.is_zero() {
            return Err(CliError::InvalidConfig("Tick must be positive".to_string()));
        }

        Ok(())
    }
}

/// Final state of one commander after the simulation
#[derive(Debug, Clone, Serialize)]
pub struct CommanderReport {
    pub actor_id: String,
    pub role: Option<CommandRole>,
    pub watermark: u64,
    pub requests_sent: usize,
    pub responses_sent: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub session_id: String,
    pub action: String,
    pub decision: ApprovalDecision,
    pub approved: bool,
    /// Version of the state published after approval
    pub published_version: Option<u64>,
    pub ticks: usize,
    pub commanders: Vec<CommanderReport>,
}

fn commander_id(index: usize) -> Result<ActorId> {
    ActorId::new(format!("commander-{}", index)).map_err(|e| CliError::Session(e.into()))
}

/// Run `config.commanders` coordinators on one in-memory hub, issue the
/// action from commander 0 and auto-answer from the others
pub async fn run_simulation(config: SimulationConfig) -> Result<SimulationReport> {
    config.validate()?;

    let hub = InMemoryHub::new();
    let session_id = SessionId::new();
    let session_config = SessionConfig::default().with_approval_timeout(config.approval_timeout);

    let mut commanders: Vec<InMemorySessionCoordinator> = Vec::with_capacity(config.commanders);
    for index in 0..config.commanders {
        let mut commander = SessionCoordinator::new(
            hub.transport(),
            StaticIdentity::new(commander_id(index)?),
            session_config.clone(),
        );
        commander.join(session_id)?;
        commander.update_presence(
            ActorMeta::default()
                .with_role(ROLES[index % ROLES.len()].clone())
                .with_ready(true),
        )?;
        commanders.push(commander);
    }

    info!("🎮 {} commander(s) joined session {}", config.commanders, session_id);

    // Let presence settle before counting the quorum
    for _ in 0..3 {
        for commander in commanders.iter_mut() {
            commander.poll();
        }
    }

    let mut outcome = commanders[0].ensure_action_with_description(
        &config.action,
        Some(json!({ "action": config.action })),
        format!("{} requested by commander-0", config.action),
    )?;

    let mut ticks = 0;
    let decision = loop {
        if let Some(decision) = outcome.try_decision() {
            break decision;
        }

        for (index, commander) in commanders.iter_mut().enumerate() {
            commander.poll();
            if index == 0 || Some(index) == config.silent {
                continue;
            }

            for request in commander.pending_requests() {
                let approve = Some(index) != config.veto;
                let notes = (!approve).then(|| "Not while the treasury is empty".to_string());
                if let Err(e) = commander.respond(request.id, approve, notes) {
                    warn!("commander-{} could not answer {}: {}", index, request.id, e);
                }
            }
        }

        ticks += 1;
        tokio::time::sleep(config.tick).await;
    };

    info!("🏁 '{}' resolved after {} tick(s): {}", config.action, ticks, decision);

    let published_version = if decision.is_approved() {
        let version = commanders[0].publish_state(json!({
            "last_action": config.action,
            "approved_by": config.commanders - 1,
        }))?;

        for _ in 0..2 {
            for commander in commanders.iter_mut() {
                commander.poll();
            }
        }
        Some(version)
    } else {
        None
    };

    let reports = commanders
        .iter()
        .map(|commander| {
            let actor_id = commander.actor_id().map(|id| id.to_string()).unwrap_or_default();
            let role = commander
                .presence()
                .into_iter()
                .find(|actor| actor.id.as_str() == actor_id)
                .and_then(|actor| actor.role);
            let stats = commander.transport().stats();

            CommanderReport {
                actor_id,
                role,
                watermark: commander.watermark(),
                requests_sent: stats.requests_sent,
                responses_sent: stats.responses_sent,
            }
        })
        .collect();

    for commander in commanders.iter_mut() {
        commander.leave()?;
    }

    Ok(SimulationReport {
        session_id: session_id.to_string(),
        action: config.action,
        approved: decision.is_approved(),
        decision,
        published_version,
        ticks,
        commanders: reports,
    })
}
