use crate::application::approval::ActionOutcome;
use crate::application::coordinator::SessionCoordinator;
use crate::infrastructure::Transport;
use cocommand_core::ApprovalDecision;
use std::time::Duration;

/// Poll `coordinator` every `tick` until `outcome` resolves
///
/// The coordinator's own approval deadline bounds the wait.
pub async fn settle<T: Transport>(
    coordinator: &mut SessionCoordinator<T>,
    mut outcome: ActionOutcome,
    tick: Duration,
) -> ApprovalDecision {
    loop {
        coordinator.poll();

        if let Some(decision) = outcome.try_decision() {
            return decision;
        }

        tokio::time::sleep(tick).await;
    }
}
