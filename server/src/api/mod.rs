pub mod error;
pub mod routes;

pub use error::{ApiError, ErrorResponse, error_response, internal_error, route_not_found};

use axum::Router;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Route Book API",
        description = "Upload waypoint batches as routes and fetch driving directions for them"
    ),
    tags(
        (name = "routes", description = "Stored routes, their waypoints and directions")
    )
)]
pub struct ApiDoc;

/// JSON API router and the OpenAPI document describing it
pub fn router() -> (Router<AppState>, utoipa::openapi::OpenApi) {
    OpenApiRouter::with_openapi(ApiDoc::openapi())
        .merge(routes::router())
        .split_for_parts()
}
