use sqlx::{Executor, Sqlite};
use tokio::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Users,
    Routes,
    Waypoints,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Routes => "routes",
            Collection::Waypoints => "waypoints",
        }
    }

    fn next_id_query(&self) -> &'static str {
        match self {
            Collection::Users => "SELECT COALESCE(MAX(id), 0) + 1 FROM users",
            Collection::Routes => "SELECT COALESCE(MAX(id), 0) + 1 FROM routes",
            Collection::Waypoints => "SELECT COALESCE(MAX(id), 0) + 1 FROM waypoints",
        }
    }
}

/// One more than the largest id in the collection, or 1 when it is empty
pub async fn next_id<'e, E>(executor: E, collection: Collection) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let (next,): (i64,) = sqlx::query_as(collection.next_id_query())
        .fetch_one(executor)
        .await?;
    Ok(next)
}

/// Per-collection locks serializing allocate-then-insert.
///
/// The locks are process-local; across processes the primary key rejects a
/// duplicate id.
#[derive(Debug, Default)]
pub struct IdAllocator {
    users: Mutex<()>,
    routes: Mutex<()>,
    waypoints: Mutex<()>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive allocation rights on `collection`.
    ///
    /// Callers needing several collections must reserve them in the order
    /// users, routes, waypoints.
    pub async fn reserve(&self, collection: Collection) -> Reservation<'_> {
        let lock = match collection {
            Collection::Users => &self.users,
            Collection::Routes => &self.routes,
            Collection::Waypoints => &self.waypoints,
        };
        Reservation {
            collection,
            _guard: lock.lock().await,
        }
    }
}

/// Exclusive allocation rights on one collection, released on drop
pub struct Reservation<'a> {
    collection: Collection,
    _guard: MutexGuard<'a, ()>,
}

impl Reservation<'_> {
    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub async fn next_id<'e, E>(&self, executor: E) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        next_id(executor, self.collection).await
    }
}
