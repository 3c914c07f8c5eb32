// routes.rs
use axum::{
    http::{header::CONTENT_TYPE, HeaderName, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;

use crate::auth::USER_ID_HEADER;
use crate::handlers;
use crate::state::AppState;

pub fn create_routes(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(USER_ID_HEADER)])
        .max_age(Duration::from_secs(60 * 60));

    let api = Router::new()
        .route(
            "/sessions/{session_id}/polls",
            get(handlers::list_polls).post(handlers::create_poll),
        )
        .route(
            "/sessions/{session_id}/attendance",
            get(handlers::list_attendance),
        )
        .route("/polls/{poll_id}", get(handlers::get_poll))
        .route("/polls/{poll_id}/deactivate", post(handlers::deactivate_poll))
        .route("/attendance", post(handlers::submit_code));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .layer(cors)
        .with_state(state)
}
