use axum::{
    Router,
    http::Method,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::{
    handlers::{client_operation, healthcheck},
    middleware::{admission, region_affinity},
    state::AppState,
};

pub const CLIENT_OPERATION_ROUTE: &str = "/api/game/v2/profile/:account_id/client/:operation";

pub fn build_router(state: AppState) -> Router {
    // route_layer: the last one added runs first, and both see MatchedPath.
    Router::new()
        .route(CLIENT_OPERATION_ROUTE, post(client_operation))
        .route_layer(from_fn_with_state(state.clone(), region_affinity))
        .route_layer(from_fn_with_state(state.clone(), admission))
        .route("/health", get(healthcheck))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
