pub mod memory;
pub mod mongo;

use async_trait::async_trait;

use crate::models::poll_models::{PollConfig, PollState};
use crate::models::vote_record_models::{VoteRecord, VoterIdentity};
use crate::utils::error::{AppError, AppResult};

pub use memory::MemoryLedger;
pub use mongo::MongoLedger;

/// Storage seam for poll configs, tallies, and vote records.
///
/// `record_vote` is the single mutating operation. Implementations must make
/// the record insert + counter increments indivisible per poll: simultaneous
/// votes by different identities both land, simultaneous votes by the same
/// identity yield exactly one success and one `AlreadyVoted`.
#[async_trait]
pub trait VoteLedger: Send + Sync {
    async fn poll_config(&self, poll_id: &str) -> AppResult<Option<PollConfig>>;

    /// Collaborator seam for publishing poll definitions (startup seeding,
    /// embedding code). Not an authoring workflow.
    async fn upsert_poll(&self, config: &PollConfig) -> AppResult<()>;

    async fn record_vote(
        &self,
        config: &PollConfig,
        voter: Option<&VoterIdentity>,
        option_id: u32,
    ) -> AppResult<PollState>;

    /// Current tally; zero-filled if the poll has never been voted on.
    async fn read_state(&self, config: &PollConfig) -> AppResult<PollState>;

    async fn vote_record(
        &self,
        poll_id: &str,
        voter: &VoterIdentity,
    ) -> AppResult<Option<VoteRecord>>;
}

/// Runs a storage mutation on a task of its own, so dropping the enclosing
/// request future (client disconnect, timeout) cannot abandon it between its
/// await points. The mutation always runs to completion; only the wait on
/// its outcome is cancellable.
pub(crate) async fn run_to_completion<F, T>(mutation: F) -> AppResult<T>
where
    F: std::future::Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(mutation)
        .await
        .map_err(|e| AppError::InternalError(format!("Storage task failed: {}", e)))
}

/// Shared `record_vote` preconditions: the voter must have resolved to an
/// identity and the option must exist in the poll's configuration. Returns
/// the option's position in the config's option list.
pub(crate) fn validate_vote<'a>(
    config: &PollConfig,
    voter: Option<&'a VoterIdentity>,
    option_id: u32,
) -> AppResult<(&'a VoterIdentity, usize)> {
    let voter = voter.ok_or_else(|| {
        AppError::NotEligible("You are not allowed to vote on this poll".to_string())
    })?;

    let index = config.option_index(option_id).ok_or_else(|| {
        AppError::InvalidOption(format!(
            "Option {} does not exist for poll {}",
            option_id, config.poll_id
        ))
    })?;

    Ok((voter, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn detached_mutation_survives_a_dropped_caller() {
        let (go_tx, go_rx) = oneshot::channel::<()>();
        let (done_tx, done_rx) = oneshot::channel::<()>();

        let waiter = run_to_completion(async move {
            go_rx.await.ok();
            done_tx.send(()).ok();
        });

        // The caller gives up mid-flight; the mutation must still finish.
        let timed_out = tokio::time::timeout(Duration::from_millis(10), waiter)
            .await
            .is_err();
        assert!(timed_out);

        go_tx.send(()).unwrap();
        done_rx
            .await
            .expect("mutation completed after its caller was dropped");
    }
}
