use crate::ledger::VoteLedger;
use crate::models::vote_record_models::VoterIdentity;
use crate::utils::error::AppResult;

/// A resolved identity may vote; an unresolved one may not.
pub fn can_vote(identity: Option<&VoterIdentity>) -> bool {
    identity.is_some()
}

pub async fn has_voted(
    ledger: &dyn VoteLedger,
    poll_id: &str,
    identity: &VoterIdentity,
) -> AppResult<bool> {
    Ok(ledger.vote_record(poll_id, identity).await?.is_some())
}

/// The option the identity already chose, for display back to that identity
/// only. Callers must pass the requester's own resolved identity, never one
/// taken from the payload, so no other visitor can probe someone's choice.
pub async fn prior_selection(
    ledger: &dyn VoteLedger,
    poll_id: &str,
    identity: &VoterIdentity,
) -> AppResult<Option<u32>> {
    Ok(ledger
        .vote_record(poll_id, identity)
        .await?
        .map(|record| record.selected_option_id))
}
