use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod bookings;
pub mod equipment;
pub mod error;
pub mod middleware;
pub mod reviews;
pub mod state;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let api = Router::new()
        .route(
            "/v1/equipment",
            get(equipment::list_equipment).post(equipment::create_equipment),
        )
        .route("/v1/equipment/{id}", get(equipment::get_equipment))
        .route("/v1/equipment/{id}/quote", post(bookings::quote))
        .route("/v1/bookings", post(bookings::create).get(bookings::list))
        .route("/v1/bookings/{id}", get(bookings::get))
        .route(
            "/v1/bookings/{id}/verify-handover",
            post(bookings::verify_handover),
        )
        .route(
            "/v1/bookings/{id}/confirm-return",
            post(bookings::confirm_return),
        )
        .route(
            "/v1/bookings/{id}/damage-report",
            post(bookings::file_damage_report),
        )
        .route("/v1/bookings/{id}/complete", post(bookings::complete))
        .route("/v1/bookings/{id}/cancel", post(bookings::cancel))
        .route("/v1/bookings/{id}/photos", post(bookings::upload_photos))
        .route("/v1/bookings/{id}/review", post(reviews::submit))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}
