use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::ledger::{validate_vote, VoteLedger};
use crate::models::poll_models::{PollConfig, PollState};
use crate::models::vote_record_models::{VoteRecord, VoterIdentity};
use crate::utils::error::{AppError, AppResult};

/// Per-poll mutable state. The owning mutex serializes the duplicate check,
/// record insert, and counter increments for one poll without blocking votes
/// on other polls.
struct PollSlot {
    counts: Vec<u64>,
    total: u64,
    votes: HashMap<String, VoteRecord>,
}

/// In-process ledger. Used when no MongoDB connection is configured, and as
/// the test double for everything above the storage seam.
#[derive(Default)]
pub struct MemoryLedger {
    polls: RwLock<HashMap<String, PollConfig>>,
    slots: RwLock<HashMap<String, Arc<Mutex<PollSlot>>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, config: &PollConfig) -> Arc<Mutex<PollSlot>> {
        if let Some(slot) = self.slots.read().await.get(&config.poll_id) {
            return slot.clone();
        }

        let mut slots = self.slots.write().await;
        slots
            .entry(config.poll_id.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(PollSlot {
                    counts: vec![0; config.options.len()],
                    total: 0,
                    votes: HashMap::new(),
                }))
            })
            .clone()
    }
}

#[async_trait]
impl VoteLedger for MemoryLedger {
    async fn poll_config(&self, poll_id: &str) -> AppResult<Option<PollConfig>> {
        Ok(self.polls.read().await.get(poll_id).cloned())
    }

    async fn upsert_poll(&self, config: &PollConfig) -> AppResult<()> {
        self.polls
            .write()
            .await
            .insert(config.poll_id.clone(), config.clone());
        Ok(())
    }

    async fn record_vote(
        &self,
        config: &PollConfig,
        voter: Option<&VoterIdentity>,
        option_id: u32,
    ) -> AppResult<PollState> {
        let (voter, index) = validate_vote(config, voter, option_id)?;

        let slot = self.slot(config).await;
        let mut slot = slot.lock().await;

        let key = voter.storage_key();
        if slot.votes.contains_key(&key) {
            return Err(AppError::AlreadyVoted(
                "You have already voted on this poll".to_string(),
            ));
        }

        slot.votes.insert(
            key.clone(),
            VoteRecord {
                poll_id: config.poll_id.clone(),
                voter: key,
                selected_option_id: option_id,
                created_at: Utc::now(),
            },
        );
        slot.counts[index] += 1;
        slot.total += 1;

        Ok(PollState {
            poll_id: config.poll_id.clone(),
            option_counts: slot.counts.clone(),
            total_votes: slot.total,
        })
    }

    async fn read_state(&self, config: &PollConfig) -> AppResult<PollState> {
        let slots = self.slots.read().await;
        match slots.get(&config.poll_id) {
            Some(slot) => {
                let slot = slot.lock().await;
                let mut counts = slot.counts.clone();
                counts.resize(config.options.len(), 0);
                Ok(PollState {
                    poll_id: config.poll_id.clone(),
                    option_counts: counts,
                    total_votes: slot.total,
                })
            }
            None => Ok(PollState::zeroed(config)),
        }
    }

    async fn vote_record(
        &self,
        poll_id: &str,
        voter: &VoterIdentity,
    ) -> AppResult<Option<VoteRecord>> {
        let slots = self.slots.read().await;
        match slots.get(poll_id) {
            Some(slot) => Ok(slot.lock().await.votes.get(&voter.storage_key()).cloned()),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::poll_models::PollOption;

    fn red_blue_poll(allow_anonymous: bool) -> PollConfig {
        PollConfig {
            poll_id: "poll-1".to_string(),
            question: "Favourite colour?".to_string(),
            options: vec![
                PollOption {
                    id: 0,
                    label: "Red".to_string(),
                },
                PollOption {
                    id: 1,
                    label: "Blue".to_string(),
                },
            ],
            allow_anonymous,
        }
    }

    fn user(id: &str) -> VoterIdentity {
        VoterIdentity::Authenticated(id.to_string())
    }

    #[tokio::test]
    async fn unseen_poll_reads_as_zeroed_state() {
        let ledger = MemoryLedger::new();
        let config = red_blue_poll(false);

        let state = ledger.read_state(&config).await.unwrap();
        assert_eq!(state.option_counts, vec![0, 0]);
        assert_eq!(state.total_votes, 0);

        // Reads are idempotent.
        let again = ledger.read_state(&config).await.unwrap();
        assert_eq!(state, again);
    }

    #[tokio::test]
    async fn authenticated_vote_then_duplicate_is_rejected() {
        let ledger = MemoryLedger::new();
        let config = red_blue_poll(false);
        let voter = user("u1");

        let state = ledger
            .record_vote(&config, Some(&voter), 1)
            .await
            .unwrap();
        assert_eq!(state.option_counts, vec![0, 1]);
        assert_eq!(state.total_votes, 1);

        let err = ledger
            .record_vote(&config, Some(&voter), 0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ALREADY_VOTED");

        let after = ledger.read_state(&config).await.unwrap();
        assert_eq!(after.option_counts, vec![0, 1]);
        assert_eq!(after.total_votes, 1);
    }

    #[tokio::test]
    async fn none_identity_is_not_eligible_and_does_not_mutate() {
        let ledger = MemoryLedger::new();
        let config = red_blue_poll(false);

        let err = ledger.record_vote(&config, None, 0).await.unwrap_err();
        assert_eq!(err.kind(), "NOT_ELIGIBLE");

        let state = ledger.read_state(&config).await.unwrap();
        assert_eq!(state.total_votes, 0);
    }

    #[tokio::test]
    async fn out_of_range_option_is_invalid_and_does_not_mutate() {
        let ledger = MemoryLedger::new();
        let config = red_blue_poll(false);
        let voter = user("u1");

        let err = ledger
            .record_vote(&config, Some(&voter), 2)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "INVALID_OPTION");

        let state = ledger.read_state(&config).await.unwrap();
        assert_eq!(state.total_votes, 0);
        assert!(ledger
            .vote_record(&config.poll_id, &voter)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn vote_record_reports_the_selection() {
        let ledger = MemoryLedger::new();
        let config = red_blue_poll(true);
        let voter = VoterIdentity::Anonymous("tok-1".to_string());

        ledger.record_vote(&config, Some(&voter), 0).await.unwrap();

        let record = ledger
            .vote_record(&config.poll_id, &voter)
            .await
            .unwrap()
            .expect("record exists");
        assert_eq!(record.selected_option_id, 0);

        // A different identity has no record.
        let other = VoterIdentity::Anonymous("tok-2".to_string());
        assert!(ledger
            .vote_record(&config.poll_id, &other)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_distinct_identities_both_land() {
        let ledger = Arc::new(MemoryLedger::new());
        let config = red_blue_poll(false);

        let a = {
            let ledger = ledger.clone();
            let config = config.clone();
            tokio::spawn(async move {
                ledger.record_vote(&config, Some(&user("a")), 0).await
            })
        };
        let b = {
            let ledger = ledger.clone();
            let config = config.clone();
            tokio::spawn(async move {
                ledger.record_vote(&config, Some(&user("b")), 1).await
            })
        };

        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let state = ledger.read_state(&config).await.unwrap();
        assert_eq!(state.option_counts, vec![1, 1]);
        assert_eq!(state.total_votes, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_same_identity_yields_one_success() {
        let ledger = Arc::new(MemoryLedger::new());
        let config = red_blue_poll(false);

        let mut handles = Vec::new();
        for option_id in [0u32, 1] {
            let ledger = ledger.clone();
            let config = config.clone();
            handles.push(tokio::spawn(async move {
                ledger.record_vote(&config, Some(&user("a")), option_id).await
            }));
        }

        let mut successes = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(err) => {
                    assert_eq!(err.kind(), "ALREADY_VOTED");
                    duplicates += 1;
                }
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(duplicates, 1);
        let state = ledger.read_state(&config).await.unwrap();
        assert_eq!(state.total_votes, 1);
        assert_eq!(state.option_counts.iter().sum::<u64>(), 1);
    }

    #[tokio::test]
    async fn votes_on_one_poll_do_not_leak_into_another() {
        let ledger = MemoryLedger::new();
        let first = red_blue_poll(false);
        let mut second = red_blue_poll(false);
        second.poll_id = "poll-2".to_string();

        let voter = user("u1");
        ledger.record_vote(&first, Some(&voter), 0).await.unwrap();

        // Same identity is still fresh on the other poll.
        let state = ledger.record_vote(&second, Some(&voter), 1).await.unwrap();
        assert_eq!(state.option_counts, vec![0, 1]);
        assert_eq!(state.total_votes, 1);
    }
}
