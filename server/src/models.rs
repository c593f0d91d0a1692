use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
}

/// A named, owned, ordered collection of waypoints
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema, FromRow)]
pub struct Route {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub created_at: String,
}

/// A single coordinate with its 1-based position inside a route
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema, FromRow)]
pub struct Waypoint {
    pub id: i64,
    pub route_id: i64,
    pub lat: f64,
    pub lng: f64,
    pub order: i64,
}

impl Waypoint {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}
