pub mod cast_vote;
pub mod get_poll;
pub mod models;
