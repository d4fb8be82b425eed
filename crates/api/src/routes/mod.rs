pub mod health;
pub mod triggers;

use axum::Router;

use crate::state::AppState;

/// Build the complete adapter router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(triggers::router())
        .with_state(state)
}
