use axum::{http::Method, Router};
use tower_http::cors::CorsLayer;
use tower_http::normalize_path::NormalizePath;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod error;
pub mod extractor;
pub mod flights;
pub mod state;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let router = Router::new()
        .nest("/api/auth", auth::routes())
        .nest("/api/flights", flights::routes())
        .nest("/api/bookings", bookings::routes())
        .nest("/api/admin", admin::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Under axum 0.8 a route nested at "/" only matches the bare prefix, so
    // "/api/bookings/" would miss. Trim trailing slashes before routing so the
    // collection endpoints resolve with or without the slash.
    Router::new().fallback_service(NormalizePath::trim_trailing_slash(router))
}
