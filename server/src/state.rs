use sqlx::SqlitePool;
use std::sync::Arc;

use crate::auth::OAuthClient;
use crate::ids::IdAllocator;
use crate::routing::RoutingClient;

/// Shared handler state; cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub ids: Arc<IdAllocator>,
    pub routing: RoutingClient,
    pub oauth: OAuthClient,
    pub cookie_secure: bool,
}

impl AppState {
    pub fn new(pool: SqlitePool, routing: RoutingClient, oauth: OAuthClient, cookie_secure: bool) -> Self {
        Self {
            pool,
            ids: Arc::new(IdAllocator::new()),
            routing,
            oauth,
            cookie_secure,
        }
    }
}
