use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    error::{ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument},
    Database, IndexModel,
};
use serde::{Deserialize, Serialize};

use crate::ledger::{run_to_completion, validate_vote, VoteLedger};
use crate::models::poll_models::{PollConfig, PollState};
use crate::models::vote_record_models::{VoteRecord, VoterIdentity};
use crate::utils::error::{AppError, AppResult};

const POLLS: &str = "polls";
const POLL_STATE: &str = "poll_state";
const VOTE_RECORDS: &str = "vote_records";

#[derive(Debug, Serialize, Deserialize)]
struct VoteDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    poll_id: String,
    voter: String,
    selected_option_id: u32,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PollStateDocument {
    #[serde(rename = "_id")]
    poll_id: String,
    option_counts: Vec<i64>,
    total_votes: i64,
}

/// Durable ledger. The unique compound index on `vote_records`
/// (`poll_id`, `voter`) makes the record insert the linearization point for
/// the single-vote guarantee: a duplicate submission fails the insert before
/// any counter is touched, with no application-level pre-check to race.
pub struct MongoLedger {
    db: Arc<Database>,
}

impl MongoLedger {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Creates the uniqueness indexes the correctness argument relies on.
    /// Run once at startup.
    pub async fn ensure_indexes(&self) -> AppResult<()> {
        let unique = |keys: Document| {
            IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().unique(true).build())
                .build()
        };

        self.db
            .collection::<VoteDocument>(VOTE_RECORDS)
            .create_index(unique(doc! { "poll_id": 1, "voter": 1 }))
            .await?;
        self.db
            .collection::<PollConfig>(POLLS)
            .create_index(unique(doc! { "poll_id": 1 }))
            .await?;

        Ok(())
    }
}

/// Makes sure the state document exists before `$inc` touches it, so the
/// counter array is always sized to the poll's options.
async fn ensure_state(db: &Database, config: &PollConfig) -> AppResult<()> {
    let zeros: Vec<i64> = vec![0; config.options.len()];
    db.collection::<PollStateDocument>(POLL_STATE)
        .update_one(
            doc! { "_id": &config.poll_id },
            doc! { "$setOnInsert": { "option_counts": zeros, "total_votes": 0_i64 } },
        )
        .upsert(true)
        .await?;
    Ok(())
}

async fn apply_increments(db: &Database, config: &PollConfig, index: usize) -> AppResult<PollState> {
    ensure_state(db, config).await?;

    let mut increments = Document::new();
    increments.insert(format!("option_counts.{}", index), 1_i64);
    increments.insert("total_votes", 1_i64);

    let updated = db
        .collection::<PollStateDocument>(POLL_STATE)
        .find_one_and_update(doc! { "_id": &config.poll_id }, doc! { "$inc": increments })
        .return_document(ReturnDocument::After)
        .await?
        .ok_or_else(|| AppError::StorageFailure("Poll state missing after increment".to_string()))?;

    Ok(to_state(updated, config))
}

/// The full record-then-increment sequence. Always driven to completion on a
/// detached task, so a dropped request cannot strand a vote record without
/// its counter movement; if the increment fails, the record is rolled back
/// so the voter's retry is not stuck on `AlreadyVoted` with an untallied
/// vote.
async fn commit_vote(
    db: &Database,
    config: &PollConfig,
    voter_key: String,
    option_id: u32,
    index: usize,
) -> AppResult<PollState> {
    let vote = VoteDocument {
        id: ObjectId::new(),
        poll_id: config.poll_id.clone(),
        voter: voter_key,
        selected_option_id: option_id,
        created_at: Utc::now(),
    };

    // The conditional insert is the duplicate guard; counters only move
    // once the record has landed.
    if let Err(err) = db
        .collection::<VoteDocument>(VOTE_RECORDS)
        .insert_one(&vote)
        .await
    {
        if is_duplicate_key(&err) {
            return Err(AppError::AlreadyVoted(
                "You have already voted on this poll".to_string(),
            ));
        }
        return Err(err.into());
    }

    match apply_increments(db, config, index).await {
        Ok(state) => Ok(state),
        Err(err) => {
            if let Err(cleanup_err) = db
                .collection::<VoteDocument>(VOTE_RECORDS)
                .delete_one(doc! { "_id": vote.id })
                .await
            {
                tracing::error!(
                    "failed to roll back vote record {} for poll {}: {}",
                    vote.id,
                    config.poll_id,
                    cleanup_err
                );
            }
            Err(err)
        }
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref write_err)) if write_err.code == 11000
    )
}

fn to_state(doc: PollStateDocument, config: &PollConfig) -> PollState {
    let mut counts: Vec<u64> = doc
        .option_counts
        .iter()
        .map(|count| (*count).max(0) as u64)
        .collect();
    counts.resize(config.options.len(), 0);

    PollState {
        poll_id: doc.poll_id,
        option_counts: counts,
        total_votes: doc.total_votes.max(0) as u64,
    }
}

#[async_trait]
impl VoteLedger for MongoLedger {
    async fn poll_config(&self, poll_id: &str) -> AppResult<Option<PollConfig>> {
        Ok(self
            .db
            .collection::<PollConfig>(POLLS)
            .find_one(doc! { "poll_id": poll_id })
            .await?)
    }

    async fn upsert_poll(&self, config: &PollConfig) -> AppResult<()> {
        self.db
            .collection::<PollConfig>(POLLS)
            .replace_one(doc! { "poll_id": &config.poll_id }, config)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn record_vote(
        &self,
        config: &PollConfig,
        voter: Option<&VoterIdentity>,
        option_id: u32,
    ) -> AppResult<PollState> {
        let (voter, index) = validate_vote(config, voter, option_id)?;

        let db = Arc::clone(&self.db);
        let config = config.clone();
        let voter_key = voter.storage_key();

        run_to_completion(async move {
            commit_vote(&db, &config, voter_key, option_id, index).await
        })
        .await?
    }

    async fn read_state(&self, config: &PollConfig) -> AppResult<PollState> {
        let found = self
            .db
            .collection::<PollStateDocument>(POLL_STATE)
            .find_one(doc! { "_id": &config.poll_id })
            .await?;

        Ok(match found {
            Some(doc) => to_state(doc, config),
            None => PollState::zeroed(config),
        })
    }

    async fn vote_record(
        &self,
        poll_id: &str,
        voter: &VoterIdentity,
    ) -> AppResult<Option<VoteRecord>> {
        let found = self
            .db
            .collection::<VoteDocument>(VOTE_RECORDS)
            .find_one(doc! { "poll_id": poll_id, "voter": voter.storage_key() })
            .await?;

        Ok(found.map(|doc| VoteRecord {
            poll_id: doc.poll_id,
            voter: doc.voter,
            selected_option_id: doc.selected_option_id,
            created_at: doc.created_at,
        }))
    }
}
