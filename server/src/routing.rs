use serde::Deserialize;
use std::time::Duration;

use crate::config::RoutingConfig;
use crate::models::Coordinate;

const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Client for the OSRM `route` service
#[derive(Debug, Clone)]
pub struct RoutingClient {
    client: reqwest::Client,
    base_url: String,
    profile: String,
}

/// First route candidate returned by the service
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedGeometry {
    /// Encoded polyline of the full route
    pub geometry: String,
    pub distance_m: Option<f64>,
    pub duration_s: Option<f64>,
}

impl RoutingClient {
    pub fn new(config: &RoutingConfig) -> Result<Self, RoutingError> {
        // Single attempt per request; a timeout is reported, never retried
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| RoutingError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            profile: config.profile.clone(),
        })
    }

    /// `{base}/route/v1/{profile}/{lng,lat;...}?overview=full&geometries=polyline`
    pub fn route_url(&self, points: &[Coordinate]) -> String {
        let coordinates = points
            .iter()
            .map(|p| format!("{},{}", p.lng, p.lat))
            .collect::<Vec<_>>()
            .join(";");

        format!(
            "{}/route/v1/{}/{}?overview=full&geometries=polyline",
            self.base_url, self.profile, coordinates
        )
    }

    /// Route through `points` in order and return the first candidate
    pub async fn fetch_route(&self, points: &[Coordinate]) -> Result<RoutedGeometry, RoutingError> {
        let url = self.route_url(points);
        tracing::debug!(url = %url, "Requesting route");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                RoutingError::Timeout
            } else {
                RoutingError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                RoutingError::Timeout
            } else {
                RoutingError::NetworkError(e.to_string())
            }
        })?;

        if !status.is_success() {
            tracing::error!(status = %status, body_preview = %text.chars().take(200).collect::<String>(), "Routing service error");
            return Err(RoutingError::StatusError {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            });
        }

        let parsed: OsrmResponse = serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body_preview = %text.chars().take(500).collect::<String>(),
                "Failed to parse routing response"
            );
            RoutingError::ParseError(e.to_string())
        })?;

        if parsed.code.as_deref().is_some_and(|code| code != "Ok") {
            return Err(RoutingError::NoRoute(
                parsed.message.or(parsed.code).unwrap_or_default(),
            ));
        }

        let route = parsed
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| RoutingError::NoRoute("response contained no routes".to_string()))?;

        Ok(RoutedGeometry {
            geometry: route.geometry,
            distance_m: route.distance,
            duration_s: route.duration,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
struct OsrmResponse {
    code: Option<String>,
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Clone, Deserialize)]
struct OsrmRoute {
    geometry: String,
    distance: Option<f64>,
    duration: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Routing service timed out")]
    Timeout,
    #[error("Routing service returned HTTP {status}: {body}")]
    StatusError { status: u16, body: String },
    #[error("Failed to parse response: {0}")]
    ParseError(String),
    #[error("No route found: {0}")]
    NoRoute(String),
}
