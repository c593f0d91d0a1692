pub mod directions;
pub mod import;
pub mod list;

use utoipa_axum::{router::OpenApiRouter, routes};

use crate::state::AppState;

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list::list_routes))
        .routes(routes!(import::import_routes))
        .routes(routes!(list::get_route_waypoints))
        .routes(routes!(list::delete_route))
        .routes(routes!(directions::get_route_directions))
}
