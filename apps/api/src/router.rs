use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use availability_cell::router::availability_routes;
use booking_cell::router::appointment_routes;
use shared_config::AppConfig;

pub fn create_router(config: Arc<AppConfig>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health_check))
        .nest("/doctors", availability_routes(config.clone()))
        .nest("/appointments", appointment_routes(config))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> &'static str {
    "Booking API is running"
}
