use crate::state::AppState;
use axum::Router;

mod claims;
mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;

/// Routes that authenticate callers; rate limited separately from the rest.
pub fn credential_router() -> Router<AppState> {
    handlers::auth_routes()
}

pub fn router() -> Router<AppState> {
    handlers::me_routes()
}
