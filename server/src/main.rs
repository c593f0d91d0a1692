mod api;
mod auth;
mod config;
mod db;
mod directions;
mod ids;
mod import;
mod models;
mod polyline;
mod routing;
mod state;
mod store;
mod web;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Json,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auth::OAuthClient;
use config::Config;
use routing::RoutingClient;
use state::AppState;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

fn cors_layer(config: &Config) -> Result<CorsLayer, Box<dyn std::error::Error>> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    if config.cors_permissive {
        warn!("CORS is permissive; every origin is allowed");
        return Ok(cors.allow_origin(Any));
    }

    let origins = config
        .cors_origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(cors
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "routebook=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path =
        std::env::var("ROUTEBOOK_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    info!(path = %config_path, "Loading configuration");
    let config = Config::load(&config_path)?;

    let pool = db::connect(&config.database_url).await?;
    let routing = RoutingClient::new(&config.routing)?;
    let oauth = OAuthClient::new(config.oauth.clone())?;
    let state = AppState::new(pool, routing, oauth, config.cookie_secure);

    let cors = cors_layer(&config)?;

    let (api_router, openapi) = api::router();
    let app = web::router()
        .merge(api_router)
        .route(
            "/api/openapi.json",
            get(move || {
                let doc = openapi.clone();
                async move { Json(doc) }
            }),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Route Book listening");

    axum::serve(listener, app).await?;

    Ok(())
}
