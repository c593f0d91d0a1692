use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::auth::{
    cookie_value, expired_cookie, set_cookie, AuthError, MaybePrincipal, OAUTH_STATE_COOKIE,
    SESSION_COOKIE,
};
use crate::directions::{self, Directions, DirectionsError};
use crate::import;
use crate::models::Coordinate;
use crate::state::AppState;
use crate::store;

use super::views::{render, IndexPage, MapPage, MessagePage, RoutesPage};

const SIMULATED_POINT: Coordinate = Coordinate {
    lat: 49.1951,
    lng: 16.6068,
};
const DEFAULT_SIMULATED_POINTS: usize = 100;
const MAX_SIMULATED_POINTS: usize = 10_000;

fn message_page(status: StatusCode, title: &str, message: &str) -> Response {
    (
        status,
        render(&MessagePage {
            title: title.to_string(),
            message: message.to_string(),
        }),
    )
        .into_response()
}

fn internal_page<E: std::fmt::Display>(err: E) -> Response {
    error!("Internal error: {}", err);
    message_page(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Something went wrong",
        "Internal server error",
    )
}

fn route_not_found_page() -> Response {
    message_page(StatusCode::NOT_FOUND, "Not found", "Route not found.")
}

fn redirect_with_message(message: &str) -> Response {
    Redirect::to(&format!("/routes?message={}", urlencoding::encode(message))).into_response()
}

fn login_redirect() -> Response {
    Redirect::to("/login").into_response()
}

pub async fn index(MaybePrincipal(principal): MaybePrincipal) -> Response {
    render(&IndexPage {
        email: principal.map(|p| p.email),
    })
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Starts the OAuth flow, or completes it when Google redirects back
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LoginQuery>,
) -> Response {
    if let Some(error) = query.error {
        warn!(error = %error, "Identity provider refused login");
        return message_page(StatusCode::UNAUTHORIZED, "Sign-in failed", "Authentication failed");
    }

    let Some(code) = query.code else {
        let login_state = uuid::Uuid::new_v4().to_string();
        return (
            AppendHeaders([(
                header::SET_COOKIE,
                set_cookie(OAUTH_STATE_COOKIE, &login_state, state.cookie_secure),
            )]),
            Redirect::to(&state.oauth.authorize_url(&login_state)),
        )
            .into_response();
    };

    let expected = cookie_value(&headers, OAUTH_STATE_COOKIE);
    if expected.is_none() || expected != query.state.as_deref() {
        warn!(error = %AuthError::StateMismatch, "Rejected login callback");
        return message_page(StatusCode::UNAUTHORIZED, "Sign-in failed", "Authentication failed");
    }

    let email = match state.oauth.verified_email(&code).await {
        Ok(email) => email,
        Err(e) => {
            warn!(error = %e, "Failed to verify login");
            return message_page(StatusCode::UNAUTHORIZED, "Sign-in failed", "Authentication failed");
        }
    };

    let user = match store::find_or_create_user(&state.pool, &state.ids, &email).await {
        Ok(user) => user,
        Err(e) => return internal_page(e),
    };
    let token = match store::create_session(&state.pool, user.id).await {
        Ok(token) => token,
        Err(e) => return internal_page(e),
    };

    info!(user_id = user.id, "User signed in");
    (
        AppendHeaders([
            (
                header::SET_COOKIE,
                set_cookie(SESSION_COOKIE, &token, state.cookie_secure),
            ),
            (header::SET_COOKIE, expired_cookie(OAUTH_STATE_COOKIE)),
        ]),
        Redirect::to("/routes"),
    )
        .into_response()
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = cookie_value(&headers, SESSION_COOKIE) {
        if let Err(e) = store::delete_session(&state.pool, token).await {
            return internal_page(e);
        }
    }

    (
        AppendHeaders([(header::SET_COOKIE, expired_cookie(SESSION_COOKIE))]),
        Redirect::to("/"),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct RoutesQuery {
    pub message: Option<String>,
}

pub async fn routes(
    State(state): State<AppState>,
    MaybePrincipal(principal): MaybePrincipal,
    Query(query): Query<RoutesQuery>,
) -> Response {
    let Some(principal) = principal else {
        return login_redirect();
    };

    match store::list_routes(&state.pool, &principal).await {
        Ok(routes) => render(&RoutesPage {
            routes,
            message: query.message,
        })
        .into_response(),
        Err(e) => internal_page(e),
    }
}

#[derive(Debug, thiserror::Error)]
enum UploadError {
    #[error("no file was uploaded")]
    MissingFile,
    #[error("file is not valid UTF-8")]
    Encoding,
    #[error("{0}")]
    Multipart(#[from] MultipartError),
}

async fn read_upload(multipart: &mut Multipart) -> Result<String, UploadError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let bytes = field.bytes().await?;
            return String::from_utf8(bytes.to_vec()).map_err(|_| UploadError::Encoding);
        }
    }
    Err(UploadError::MissingFile)
}

pub async fn upload(
    State(state): State<AppState>,
    MaybePrincipal(principal): MaybePrincipal,
    mut multipart: Multipart,
) -> Response {
    let Some(principal) = principal else {
        return login_redirect();
    };

    let raw = match read_upload(&mut multipart).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Rejected upload");
            return redirect_with_message(&format!("Upload failed: {e}"));
        }
    };

    match import::import_batch(&state.pool, &state.ids, &principal, &raw).await {
        Ok(outcome) if outcome.all_succeeded => redirect_with_message("Upload successful"),
        Ok(_) => redirect_with_message("Upload completed with some errors"),
        Err(e) => redirect_with_message(&format!("Upload failed: {e}")),
    }
}

pub async fn delete_route(
    State(state): State<AppState>,
    MaybePrincipal(principal): MaybePrincipal,
    Path(route_id): Path<i64>,
) -> Response {
    let Some(principal) = principal else {
        return login_redirect();
    };

    match store::delete_route(&state.pool, &principal, route_id).await {
        Ok(true) => Redirect::to("/routes").into_response(),
        Ok(false) => redirect_with_message("Route not found"),
        Err(e) => internal_page(e),
    }
}

/// Map of the waypoints exactly as stored
pub async fn polyline(
    State(state): State<AppState>,
    MaybePrincipal(principal): MaybePrincipal,
    Path(route_id): Path<i64>,
) -> Response {
    let Some(principal) = principal else {
        return login_redirect();
    };

    let route = match store::find_route(&state.pool, &principal, route_id).await {
        Ok(Some(route)) => route,
        Ok(None) => return route_not_found_page(),
        Err(e) => return internal_page(e),
    };

    match store::route_waypoints(&state.pool, route.id).await {
        Ok(waypoints) => render(&MapPage {
            title: route.name,
            waypoints: waypoints.iter().map(|w| w.coordinate()).collect(),
            summary: None,
        })
        .into_response(),
        Err(e) => internal_page(e),
    }
}

/// Map of the driving path the routing service suggests
pub async fn directions(
    State(state): State<AppState>,
    MaybePrincipal(principal): MaybePrincipal,
    Path(route_id): Path<i64>,
) -> Response {
    let Some(principal) = principal else {
        return login_redirect();
    };

    let outcome = directions::get_directions(&state.pool, &state.routing, &principal, route_id).await;

    match outcome {
        Ok(Directions::Path(routed)) => {
            let summary = match (routed.distance_m, routed.duration_s) {
                (Some(distance), Some(duration)) => Some(format!(
                    "{:.1} km, about {} min",
                    distance / 1000.0,
                    (duration / 60.0).round() as i64
                )),
                _ => None,
            };
            render(&MapPage {
                title: "Directions".to_string(),
                waypoints: routed.path,
                summary,
            })
            .into_response()
        }
        Ok(Directions::NoWaypoints) => message_page(
            StatusCode::OK,
            "Directions",
            "No waypoints found for this route.",
        ),
        Ok(Directions::TooFewWaypoints) => message_page(
            StatusCode::OK,
            "Directions",
            "This route needs at least two waypoints for directions.",
        ),
        Ok(Directions::Unavailable { .. }) => message_page(
            StatusCode::SERVICE_UNAVAILABLE,
            "Directions unavailable",
            "Error fetching directions from the routing service.",
        ),
        Err(DirectionsError::RouteNotFound(_)) => route_not_found_page(),
        Err(DirectionsError::MalformedPath(e)) => {
            error!(route_id, error = %e, "Undecodable route geometry");
            message_page(
                StatusCode::BAD_GATEWAY,
                "Directions unavailable",
                "The routing service returned a path that could not be read.",
            )
        }
        Err(DirectionsError::Database(e)) => internal_page(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct SimulateQuery {
    pub points: Option<usize>,
}

/// Renders `points` copies of a fixed coordinate, for load-testing the map
pub async fn simulate(Query(query): Query<SimulateQuery>) -> Response {
    let count = query
        .points
        .unwrap_or(DEFAULT_SIMULATED_POINTS)
        .min(MAX_SIMULATED_POINTS);

    render(&MapPage {
        title: "Simulation".to_string(),
        waypoints: vec![SIMULATED_POINT; count],
        summary: None,
    })
    .into_response()
}
