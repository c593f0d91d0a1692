use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::{ApiError, ErrorResponse, error_response, internal_error, route_not_found};
use crate::auth::Principal;
use crate::directions::{self, Directions, DirectionsError};
use crate::models::Coordinate;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DirectionsStatus {
    Ok,
    NoWaypoints,
    TooFewWaypoints,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DirectionsResponse {
    pub route_id: i64,
    pub status: DirectionsStatus,
    /// Driving path; empty unless status is `ok`
    pub path: Vec<Coordinate>,
    pub distance_m: Option<f64>,
    pub duration_s: Option<f64>,
}

impl DirectionsResponse {
    fn empty(route_id: i64, status: DirectionsStatus) -> Self {
        Self {
            route_id,
            status,
            path: Vec::new(),
            distance_m: None,
            duration_s: None,
        }
    }
}

/// Driving path through a route's waypoints
#[utoipa::path(
    get,
    path = "/api/routes/{route_id}/directions",
    params(
        ("route_id" = i64, Path, description = "Route ID")
    ),
    responses(
        (status = 200, description = "Directions, or why none could be computed", body = DirectionsResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Route not found", body = ErrorResponse),
        (status = 502, description = "Routing service returned an invalid path", body = ErrorResponse),
        (status = 503, description = "Routing service unavailable", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn get_route_directions(
    State(state): State<AppState>,
    principal: Principal,
    Path(route_id): Path<i64>,
) -> Result<Json<DirectionsResponse>, ApiError> {
    let directions = directions::get_directions(&state.pool, &state.routing, &principal, route_id)
        .await
        .map_err(|e| match e {
            DirectionsError::RouteNotFound(_) => route_not_found(),
            DirectionsError::MalformedPath(e) => {
                tracing::error!(route_id, error = %e, "Undecodable route geometry");
                error_response(StatusCode::BAD_GATEWAY, "Routing service returned an invalid path")
            }
            DirectionsError::Database(e) => internal_error(e),
        })?;

    let response = match directions {
        Directions::Path(routed) => DirectionsResponse {
            route_id,
            status: DirectionsStatus::Ok,
            path: routed.path,
            distance_m: routed.distance_m,
            duration_s: routed.duration_s,
        },
        Directions::NoWaypoints => DirectionsResponse::empty(route_id, DirectionsStatus::NoWaypoints),
        Directions::TooFewWaypoints => {
            DirectionsResponse::empty(route_id, DirectionsStatus::TooFewWaypoints)
        }
        Directions::Unavailable { .. } => {
            return Err(error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Directions are currently unavailable",
            ));
        }
    };

    Ok(Json(response))
}
