use crate::state::AppState;
use axum::Router;
use axum::middleware;
use axum::routing::{get, post};

pub mod command;
pub mod dto;
pub mod executor;
pub mod handler;
pub mod model;
pub mod progress;
pub mod service;
pub mod store;

pub fn router(state: AppState) -> axum::Router<AppState> {
    Router::new()
        .route("/", post(handler::submit_job).get(handler::list_jobs))
        .route("/{uuid}", get(handler::get_job))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth::auth_middleware,
        ))
}
