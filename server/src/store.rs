use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::auth::Principal;
use crate::ids::{Collection, IdAllocator, Reservation};
use crate::models::{Route, User, Waypoint};

pub fn timestamp_now() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Look up a user by verified email, creating the row on first login
pub async fn find_or_create_user(
    pool: &SqlitePool,
    ids: &IdAllocator,
    email: &str,
) -> Result<User, sqlx::Error> {
    let existing: Option<User> = sqlx::query_as("SELECT id, email FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    if let Some(user) = existing {
        return Ok(user);
    }

    let reservation = ids.reserve(Collection::Users).await;

    // Another login for the same email may have won while we waited
    let existing: Option<User> = sqlx::query_as("SELECT id, email FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    if let Some(user) = existing {
        return Ok(user);
    }

    let id = reservation.next_id(pool).await?;
    sqlx::query("INSERT INTO users (id, email) VALUES (?, ?)")
        .bind(id)
        .bind(email)
        .execute(pool)
        .await?;

    info!(user_id = id, "Created user");
    Ok(User {
        id,
        email: email.to_string(),
    })
}

pub async fn list_routes(pool: &SqlitePool, principal: &Principal) -> Result<Vec<Route>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id, user_id AS owner_id, name, creation_date AS created_at
        FROM routes
        WHERE user_id = ?
        ORDER BY id
        "#,
    )
    .bind(principal.user_id)
    .fetch_all(pool)
    .await
}

pub async fn find_route(
    pool: &SqlitePool,
    principal: &Principal,
    route_id: i64,
) -> Result<Option<Route>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id, user_id AS owner_id, name, creation_date AS created_at
        FROM routes
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(route_id)
    .bind(principal.user_id)
    .fetch_optional(pool)
    .await
}

/// Waypoints of a route in their stored order
pub async fn route_waypoints(pool: &SqlitePool, route_id: i64) -> Result<Vec<Waypoint>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id, route_id, lat, lng, order_wp AS "order"
        FROM waypoints
        WHERE route_id = ?
        ORDER BY order_wp
        "#,
    )
    .bind(route_id)
    .fetch_all(pool)
    .await
}

pub async fn insert_route(
    conn: &mut SqliteConnection,
    routes: &Reservation<'_>,
    owner_id: i64,
    name: &str,
) -> Result<Route, sqlx::Error> {
    let id = routes.next_id(&mut *conn).await?;
    let created_at = timestamp_now();

    sqlx::query("INSERT INTO routes (id, user_id, name, creation_date) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(owner_id)
        .bind(name)
        .bind(&created_at)
        .execute(&mut *conn)
        .await?;

    Ok(Route {
        id,
        owner_id,
        name: name.to_string(),
        created_at,
    })
}

pub async fn insert_waypoint(
    conn: &mut SqliteConnection,
    waypoints: &Reservation<'_>,
    route_id: i64,
    lat: f64,
    lng: f64,
    order: i64,
) -> Result<Waypoint, sqlx::Error> {
    let id = waypoints.next_id(&mut *conn).await?;

    sqlx::query("INSERT INTO waypoints (id, route_id, lat, lng, order_wp) VALUES (?, ?, ?, ?, ?)")
        .bind(id)
        .bind(route_id)
        .bind(lat)
        .bind(lng)
        .bind(order)
        .execute(&mut *conn)
        .await?;

    Ok(Waypoint {
        id,
        route_id,
        lat,
        lng,
        order,
    })
}

/// Delete a route and its waypoints in one transaction.
///
/// Returns false when the principal owns no route with that id.
pub async fn delete_route(
    pool: &SqlitePool,
    principal: &Principal,
    route_id: i64,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let owned: Option<(i64,)> = sqlx::query_as("SELECT id FROM routes WHERE id = ? AND user_id = ?")
        .bind(route_id)
        .bind(principal.user_id)
        .fetch_optional(&mut *tx)
        .await?;
    if owned.is_none() {
        return Ok(false);
    }

    let waypoints = sqlx::query("DELETE FROM waypoints WHERE route_id = ?")
        .bind(route_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    sqlx::query("DELETE FROM routes WHERE id = ?")
        .bind(route_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(route_id, waypoints, "Deleted route");
    Ok(true)
}

/// Start a session and return its opaque token
pub async fn create_session(pool: &SqlitePool, user_id: i64) -> Result<String, sqlx::Error> {
    let token = uuid::Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO sessions (token, user_id, created_at) VALUES (?, ?, ?)")
        .bind(&token)
        .bind(user_id)
        .bind(timestamp_now())
        .execute(pool)
        .await?;

    debug!(user_id, "Created session");
    Ok(token)
}

pub async fn session_principal(pool: &SqlitePool, token: &str) -> Result<Option<Principal>, sqlx::Error> {
    let row: Option<(i64, String)> = sqlx::query_as(
        r#"
        SELECT u.id, u.email
        FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.token = ?
        "#,
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(user_id, email)| Principal { user_id, email }))
}

pub async fn delete_session(pool: &SqlitePool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
pub mod fixtures {
    use super::*;

    pub async fn principal(pool: &SqlitePool, ids: &IdAllocator, email: &str) -> Principal {
        let user = find_or_create_user(pool, ids, email).await.unwrap();
        Principal {
            user_id: user.id,
            email: user.email,
        }
    }

    /// Insert a route with the given coordinates, in order
    pub async fn route_with_points(
        pool: &SqlitePool,
        ids: &IdAllocator,
        owner: &Principal,
        name: &str,
        points: &[(f64, f64)],
    ) -> Route {
        let routes = ids.reserve(Collection::Routes).await;
        let waypoints = ids.reserve(Collection::Waypoints).await;
        let mut conn = pool.acquire().await.unwrap();

        let route = insert_route(&mut conn, &routes, owner.user_id, name).await.unwrap();
        for (index, (lat, lng)) in points.iter().enumerate() {
            insert_waypoint(&mut conn, &waypoints, route.id, *lat, *lng, index as i64 + 1)
                .await
                .unwrap();
        }
        route
    }
}
