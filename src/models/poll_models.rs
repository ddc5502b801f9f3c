use serde::{Deserialize, Serialize};

/// Immutable poll definition. Authored outside this service and never
/// mutated after publish; the core only reads it.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PollConfig {
    pub poll_id: String,
    pub question: String,
    pub options: Vec<PollOption>,
    pub allow_anonymous: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PollOption {
    pub id: u32,
    pub label: String,
}

impl PollConfig {
    /// Position of an option id in the option list, if it exists.
    pub fn option_index(&self, option_id: u32) -> Option<usize> {
        self.options.iter().position(|opt| opt.id == option_id)
    }
}

/// Mutable per-poll aggregate. `option_counts` is ordered the same as the
/// config's options; `total_votes` always equals the sum of the counts.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PollState {
    pub poll_id: String,
    pub option_counts: Vec<u64>,
    pub total_votes: u64,
}

impl PollState {
    /// Zero-filled state for a poll that has not seen any votes yet.
    pub fn zeroed(config: &PollConfig) -> Self {
        Self {
            poll_id: config.poll_id.clone(),
            option_counts: vec![0; config.options.len()],
            total_votes: 0,
        }
    }
}
