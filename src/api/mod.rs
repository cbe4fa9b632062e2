//! API layer
//!
//! HTTP handlers for:
//! - Board feed, gallery and profile
//! - Post and comment forms
//! - Metrics (Prometheus)

mod board;
pub mod flash;
mod forms;
pub mod metrics;
mod posts;
pub mod views;

pub use forms::{LoginForm, ProfileForm, TextForm, UploadForm};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::get,
};

use crate::AppState;
use crate::auth::require_auth;

/// Extra room for the text fields and multipart framing around an upload
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Create the board router
///
/// Every route requires a session; anonymous visitors are sent to the
/// login page.
///
/// Routes:
/// - GET /
/// - GET|POST /post/add
/// - GET|POST /post/edit/:post_id
/// - GET|POST /post/delete/:post_id
/// - GET|POST /post/:post_id/comment
/// - GET|POST /post/:post_id/comment/edit/:comment_id
/// - GET|POST /post/:post_id/comment/delete/:comment_id
/// - GET /gallery
/// - GET|POST /profile
/// - GET /metrics
pub fn board_router(state: AppState) -> Router<AppState> {
    let body_limit = state
        .config
        .storage
        .media
        .max_upload_bytes
        .saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        .route("/", get(board::index))
        .route("/post/add", get(posts::add_post_page).post(posts::add_post_submit))
        .route(
            "/post/edit/:post_id",
            get(posts::edit_post_page).post(posts::edit_post_submit),
        )
        .route(
            "/post/delete/:post_id",
            get(posts::delete_post_page).post(posts::delete_post_submit),
        )
        .route(
            "/post/:post_id/comment",
            get(posts::add_comment_page).post(posts::add_comment_submit),
        )
        .route(
            "/post/:post_id/comment/edit/:comment_id",
            get(posts::edit_comment_page).post(posts::edit_comment_submit),
        )
        .route(
            "/post/:post_id/comment/delete/:comment_id",
            get(posts::delete_comment_page).post(posts::delete_comment_submit),
        )
        .route("/gallery", get(board::gallery))
        .route("/profile", get(board::profile_page).post(board::profile_submit))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
        .route_layer(middleware::from_fn(metrics::track_requests))
}
