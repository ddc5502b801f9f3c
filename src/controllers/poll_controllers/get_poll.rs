use axum::{
    extract::{Path, State},
    Json,
};
use axum_extra::extract::cookie::CookieJar;

use crate::controllers::poll_controllers::models::PollView;
use crate::state::AppState;
use crate::utils::eligibility;
use crate::utils::error::{AppError, AppResult};
use crate::utils::identity::resolve_identity;
use crate::utils::nonce::issue_nonce;

/// Render-time query: current tally plus everything identity-dependent the
/// presentation layer needs (`can_vote`, `has_voted`, the visitor's own prior
/// selection, a submission nonce). Issues the anonymous cookie on a first
/// anonymous visit; otherwise read-only.
pub async fn get_poll(
    Path(poll_id): Path<String>,
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<PollView>)> {
    let config = state
        .ledger
        .poll_config(&poll_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Poll not found".to_string()))?;

    let resolved = resolve_identity(&jar, &config, None);
    let poll_state = state.ledger.read_state(&config).await?;

    let (has_voted, user_selection) = match &resolved.identity {
        Some(identity) => {
            let selection =
                eligibility::prior_selection(state.ledger.as_ref(), &poll_id, identity).await?;
            (selection.is_some(), selection)
        }
        None => (false, None),
    };

    let view = PollView {
        poll_id: config.poll_id.clone(),
        question: config.question.clone(),
        options: config.options.clone(),
        option_counts: poll_state.option_counts,
        total_votes: poll_state.total_votes,
        can_vote: eligibility::can_vote(resolved.identity.as_ref()),
        has_voted,
        user_selection,
        nonce: issue_nonce(&poll_id)?,
    };

    let jar = match resolved.issued_cookie {
        Some(cookie) => jar.add(cookie),
        None => jar,
    };

    Ok((jar, Json(view)))
}
