use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;

pub mod dto;
pub mod events;
pub mod handler;
pub mod model;
pub mod repository;
pub mod service;

pub fn router(state: &AppState) -> Router<AppState> {
    let upload = post(handler::upload)
        .layer::<_, std::convert::Infallible>(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_upload_bytes));

    Router::new()
        .route("/upload", upload)
        .route("/status/{job_id}", get(handler::status))
        .route("/api/results/{content_id}", get(handler::fetch_result))
}
