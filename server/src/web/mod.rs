pub mod pages;
pub mod views;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

const UPLOAD_LIMIT: usize = 16 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(pages::index))
        .route("/login", get(pages::login))
        .route("/logout", get(pages::logout))
        .route("/routes", get(pages::routes))
        .route(
            "/upload",
            post(pages::upload).layer(DefaultBodyLimit::max(UPLOAD_LIMIT)),
        )
        .route("/routes/{route_id}/delete", post(pages::delete_route))
        .route("/routes/{route_id}/polyline", get(pages::polyline))
        .route("/routes/{route_id}/directions", get(pages::directions))
        .route("/simulate", get(pages::simulate))
}
