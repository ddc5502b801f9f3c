use serde::{Deserialize, Serialize};

use crate::models::poll_models::{PollOption, PollState};

/// Body of a vote submission. Deliberately narrow: the server recomputes all
/// tallies from its own ledger and never accepts client-supplied counts.
#[derive(Debug, Deserialize)]
pub struct CastVoteRequest {
    pub option_id: u32,
    pub nonce: String,
    #[serde(default)]
    pub anonymous_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteResponse {
    pub success: bool,
    pub state: PollState,
    pub message: String,
}

/// Everything the presentation layer needs to render a poll for the current
/// visitor, including the anti-forgery nonce for a subsequent submission.
#[derive(Debug, Serialize, Deserialize)]
pub struct PollView {
    pub poll_id: String,
    pub question: String,
    pub options: Vec<PollOption>,
    pub option_counts: Vec<u64>,
    pub total_votes: u64,
    pub can_vote: bool,
    pub has_voted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_selection: Option<u32>,
    pub nonce: String,
}
