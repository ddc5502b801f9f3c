use std::sync::Arc;

use crate::ledger::VoteLedger;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn VoteLedger>,
}

impl AppState {
    pub fn new(ledger: Arc<dyn VoteLedger>) -> Self {
        Self { ledger }
    }
}
