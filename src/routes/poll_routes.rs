use axum::{
    routing::{get, post},
    Router,
};

use crate::controllers::poll_controllers::{cast_vote, get_poll};
use crate::state::AppState;

pub fn poll_routes(state: AppState) -> Router {
    Router::new()
        .route("/:poll_id", get(get_poll::get_poll))
        .route("/:poll_id/vote", post(cast_vote::cast_vote))
        .with_state(state)
}
