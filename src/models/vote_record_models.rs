use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who is casting the vote. Authenticated users carry their user id from the
/// session token; anonymous visitors carry an opaque client-held token. The
/// server never inspects the token beyond using it as a key.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum VoterIdentity {
    Authenticated(String),
    Anonymous(String),
}

impl VoterIdentity {
    /// Composite-key form used by the ledger. The prefix keeps an anonymous
    /// token from ever colliding with a user id.
    pub fn storage_key(&self) -> String {
        match self {
            VoterIdentity::Authenticated(user_id) => format!("user:{}", user_id),
            VoterIdentity::Anonymous(token) => format!("anon:{}", token),
        }
    }
}

/// One per (poll, voter). Written once on the first successful vote and never
/// updated; a re-submission is rejected, not overwritten.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VoteRecord {
    pub poll_id: String,

    /// `VoterIdentity::storage_key` of the voter.
    pub voter: String,

    pub selected_option_id: u32,

    pub created_at: DateTime<Utc>,
}
