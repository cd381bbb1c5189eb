use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};

use crate::middleware::require_admin;
use crate::{AppState, archive, intake, opponents, publish, review, submissions};

/// Screenshots travel base64-encoded inside JSON bodies.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(health));

    let admin_routes = Router::new()
        .route("/intake/dm", post(intake::receive_dm))
        .route("/submissions", get(submissions::list_submissions))
        .route(
            "/submissions/{id}",
            get(submissions::get_submission).delete(submissions::delete_submission),
        )
        .route("/submissions/{id}/code", put(submissions::update_code))
        .route("/submissions/{id}/message", put(submissions::update_message))
        .route("/archive", get(archive::list_archive))
        .route("/archive/{id}", delete(archive::purge))
        .route("/archive/{id}/restore", post(archive::restore))
        .route("/publish", post(publish::publish))
        .route(
            "/schedule",
            post(publish::create_schedule)
                .get(publish::get_schedule)
                .delete(publish::delete_schedule),
        )
        .route("/opponents", delete(opponents::clear_all))
        .route("/opponents/pending", get(opponents::list_pending))
        .route("/opponents/approved", get(opponents::list_approved))
        .route("/opponents/approve-all", post(opponents::approve_all))
        .route("/opponents/publish", post(opponents::publish))
        .route("/opponents/{id}", delete(opponents::reject))
        .route("/opponents/{id}/approve", post(opponents::approve))
        .route("/review", post(review::open_review))
        .route("/review/{id}", get(review::get_review).delete(review::close_review))
        .route("/review/{id}/next", post(review::next_item))
        .route("/review/{id}/prev", post(review::prev_item))
        .route("/review/{id}/refresh", post(review::refresh_review))
        .route("/review/{id}/mode", put(review::set_mode))
        .route("/review/{id}/season", put(review::set_season))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state);

    Router::new().merge(public_routes).merge(admin_routes)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
