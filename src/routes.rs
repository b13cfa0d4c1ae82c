use axum::http::Method;
use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use tower_http::cors::{Any, CorsLayer};

use crate::handler::{self, AppState};
use crate::limiter::slow_down;

pub fn routes(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    // Only writes are slowed down
    let mutations = Router::new()
        .route("/api/recipe", post(handler::post_recipe))
        .route("/api/recipe/*name", delete(handler::delete_recipe))
        .route_layer(middleware::from_fn_with_state(state.clone(), slow_down));

    Router::new()
        .route("/", get(handler::healthcheck))
        .route("/api", get(handler::get_recipes))
        .route("/api/text", get(handler::get_recipes_text))
        .merge(mutations)
        .layer(cors)
        .with_state(state)
}
