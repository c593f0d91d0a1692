use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::{ApiError, ErrorResponse, internal_error, route_not_found};
use crate::auth::Principal;
use crate::models::{Route, Waypoint};
use crate::state::AppState;
use crate::store;

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteListResponse {
    pub routes: Vec<Route>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WaypointListResponse {
    pub route_id: i64,
    pub waypoints: Vec<Waypoint>,
}

/// List the caller's routes
#[utoipa::path(
    get,
    path = "/api/routes",
    responses(
        (status = 200, description = "Routes owned by the caller", body = RouteListResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn list_routes(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<RouteListResponse>, ApiError> {
    let routes = store::list_routes(&state.pool, &principal)
        .await
        .map_err(internal_error)?;

    Ok(Json(RouteListResponse { routes }))
}

/// Stored waypoints of a route, in order
#[utoipa::path(
    get,
    path = "/api/routes/{route_id}/waypoints",
    params(
        ("route_id" = i64, Path, description = "Route ID")
    ),
    responses(
        (status = 200, description = "Waypoints ordered by position", body = WaypointListResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Route not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn get_route_waypoints(
    State(state): State<AppState>,
    principal: Principal,
    Path(route_id): Path<i64>,
) -> Result<Json<WaypointListResponse>, ApiError> {
    store::find_route(&state.pool, &principal, route_id)
        .await
        .map_err(internal_error)?
        .ok_or_else(route_not_found)?;

    let waypoints = store::route_waypoints(&state.pool, route_id)
        .await
        .map_err(internal_error)?;

    Ok(Json(WaypointListResponse { route_id, waypoints }))
}

/// Delete a route together with its waypoints
#[utoipa::path(
    delete,
    path = "/api/routes/{route_id}",
    params(
        ("route_id" = i64, Path, description = "Route ID")
    ),
    responses(
        (status = 204, description = "Route deleted"),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Route not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn delete_route(
    State(state): State<AppState>,
    principal: Principal,
    Path(route_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let deleted = store::delete_route(&state.pool, &principal, route_id)
        .await
        .map_err(internal_error)?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(route_not_found())
    }
}
