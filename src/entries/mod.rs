mod dto;
mod handlers;
pub mod repo_types;
pub mod trend;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::entry_routes()
}
