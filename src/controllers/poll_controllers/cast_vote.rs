use axum::{
    extract::{Path, State},
    Json,
};
use axum_extra::extract::cookie::CookieJar;

use crate::controllers::poll_controllers::models::{CastVoteRequest, VoteResponse};
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};
use crate::utils::identity::resolve_identity;
use crate::utils::nonce::verify_nonce;

/// The only mutating entry point. Verifies the anti-forgery nonce, resolves
/// the voter identity, and hands the submission to the ledger, which enforces
/// eligibility, option bounds, and the single-vote guarantee atomically.
/// Every failure leaves the tally untouched. A freshly minted anonymous
/// cookie rides along on failures too, so a retrying visitor keeps the same
/// identity.
pub async fn cast_vote(
    Path(poll_id): Path<String>,
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<CastVoteRequest>,
) -> AppResult<(CookieJar, AppResult<Json<VoteResponse>>)> {
    let config = state
        .ledger
        .poll_config(&poll_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Poll not found".to_string()))?;

    verify_nonce(&payload.nonce, &poll_id)?;

    let resolved = resolve_identity(&jar, &config, payload.anonymous_token.as_deref());

    let outcome = state
        .ledger
        .record_vote(&config, resolved.identity.as_ref(), payload.option_id)
        .await;

    let jar = match resolved.issued_cookie {
        Some(cookie) => jar.add(cookie),
        None => jar,
    };

    Ok((
        jar,
        outcome.map(|updated| {
            Json(VoteResponse {
                success: true,
                state: updated,
                message: "Vote recorded successfully".to_string(),
            })
        }),
    ))
}
