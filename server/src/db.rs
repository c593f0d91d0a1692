use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

const MAX_CONNECTIONS: u32 = 5;

// Waypoint cascade is done by the application, not by ON DELETE CASCADE.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY,
        email TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS routes (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id),
        name TEXT NOT NULL,
        creation_date TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_routes_user_id ON routes(user_id)",
    r#"
    CREATE TABLE IF NOT EXISTS waypoints (
        id INTEGER PRIMARY KEY,
        route_id INTEGER NOT NULL REFERENCES routes(id),
        lat REAL NOT NULL,
        lng REAL NOT NULL,
        order_wp INTEGER NOT NULL,
        UNIQUE (route_id, order_wp)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        token TEXT PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id),
        created_at TEXT NOT NULL
    )
    "#,
];

/// Open the database, creating the file and schema if needed
pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;
    info!(database_url = %database_url, "Database ready");

    Ok(pool)
}

pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(*statement).execute(pool).await?;
    }
    Ok(())
}

/// Single-connection in-memory database with the schema applied
#[cfg(test)]
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    init_schema(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let pool = memory_pool().await;
        init_schema(&pool).await.unwrap();

        let (tables,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('users', 'routes', 'waypoints', 'sessions')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(tables, 4);
    }

    #[tokio::test]
    async fn test_waypoint_order_is_unique_per_route() {
        let pool = memory_pool().await;
        sqlx::query("INSERT INTO users (id, email) VALUES (1, 'a@example.com')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO routes (id, user_id, name, creation_date) VALUES (1, 1, 'r', '2024-01-01 00:00:00')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO waypoints (id, route_id, lat, lng, order_wp) VALUES (1, 1, 0, 0, 1)")
            .execute(&pool)
            .await
            .unwrap();

        let duplicate = sqlx::query("INSERT INTO waypoints (id, route_id, lat, lng, order_wp) VALUES (2, 1, 1, 1, 1)")
            .execute(&pool)
            .await;
        assert!(duplicate.is_err());
    }
}
