use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

/// Routes nested under `/doctors`. Reads are public; writing a
/// doctor's schedule requires an authenticated caller.
pub fn availability_routes(config: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/{doctor_id}/availability", get(handlers::get_availability))
        .route("/{doctor_id}/slots", get(handlers::get_slots));

    let protected_routes = Router::new()
        .route("/{doctor_id}/availability", put(handlers::save_availability))
        .layer(middleware::from_fn_with_state(
            config.clone(),
            auth_middleware,
        ));

    public_routes.merge(protected_routes).with_state(config)
}
