use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::auth::Principal;
use crate::models::{Coordinate, Waypoint};
use crate::polyline::{self, PolylineError};
use crate::routing::RoutingClient;
use crate::store;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RoutedPath {
    pub path: Vec<Coordinate>,
    pub distance_m: Option<f64>,
    pub duration_s: Option<f64>,
}

/// Result of a directions request that did not fail outright
#[derive(Debug, Clone, PartialEq)]
pub enum Directions {
    Path(RoutedPath),
    NoWaypoints,
    /// Only a start point is stored; there is nothing to route to
    TooFewWaypoints,
    /// The routing service could not be used; the reason is for display
    Unavailable { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum DirectionsError {
    #[error("route {0} not found")]
    RouteNotFound(i64),
    #[error("routing service returned an undecodable path: {0}")]
    MalformedPath(#[from] PolylineError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Stored waypoints split into what the routing request needs
#[derive(Debug, Clone, PartialEq)]
pub struct Legs {
    pub start: Coordinate,
    pub intermediates: Vec<Coordinate>,
    pub end: Coordinate,
}

impl Legs {
    /// `None` when fewer than two waypoints are given.
    ///
    /// The end point is the last waypoint's own latitude and longitude.
    pub fn from_waypoints(waypoints: &[Waypoint]) -> Option<Self> {
        let (first, rest) = waypoints.split_first()?;
        let (last, middle) = rest.split_last()?;

        Some(Self {
            start: first.coordinate(),
            intermediates: middle.iter().map(Waypoint::coordinate).collect(),
            end: last.coordinate(),
        })
    }

    /// Start, intermediates in stored order, then end
    pub fn points(&self) -> Vec<Coordinate> {
        let mut points = Vec::with_capacity(self.intermediates.len() + 2);
        points.push(self.start);
        points.extend_from_slice(&self.intermediates);
        points.push(self.end);
        points
    }
}

#[tracing::instrument(skip(pool, routing, principal), fields(user_id = principal.user_id))]
pub async fn get_directions(
    pool: &SqlitePool,
    routing: &RoutingClient,
    principal: &Principal,
    route_id: i64,
) -> Result<Directions, DirectionsError> {
    let route = store::find_route(pool, principal, route_id)
        .await?
        .ok_or(DirectionsError::RouteNotFound(route_id))?;
    let waypoints = store::route_waypoints(pool, route.id).await?;

    if waypoints.is_empty() {
        return Ok(Directions::NoWaypoints);
    }
    let Some(legs) = Legs::from_waypoints(&waypoints) else {
        return Ok(Directions::TooFewWaypoints);
    };

    let routed = match routing.fetch_route(&legs.points()).await {
        Ok(routed) => routed,
        Err(e) => {
            warn!(route_id, error = %e, "Directions unavailable");
            return Ok(Directions::Unavailable {
                reason: e.to_string(),
            });
        }
    };

    let path = polyline::decode(&routed.geometry)?;
    debug!(route_id, points = path.len(), "Decoded route geometry");

    Ok(Directions::Path(RoutedPath {
        path,
        distance_m: routed.distance_m,
        duration_s: routed.duration_s,
    }))
}
