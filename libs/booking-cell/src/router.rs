use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

/// Routes nested under `/appointments`. Everything here acts on a
/// caller's own records, so the whole surface requires authentication.
pub fn appointment_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/book", post(handlers::book_appointment))
        .route("/reschedule", post(handlers::reschedule_appointment))
        .route("/", get(handlers::list_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route(
            "/{appointment_id}/complete",
            post(handlers::complete_appointment),
        )
        .route("/{appointment_id}/rate", post(handlers::rate_appointment))
        .layer(middleware::from_fn_with_state(
            config.clone(),
            auth_middleware,
        ))
        .with_state(config)
}
