use csv::StringRecord;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::auth::Principal;
use crate::ids::{Collection, IdAllocator};
use crate::models::Coordinate;
use crate::store;

const FIELD_DELIMITER: u8 = b';';

/// Why a line was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuralError {
    #[error("expected coordinates and a name, found {found} field(s)")]
    MissingFields { found: usize },
    #[error("{count} coordinate values cannot be paired into lat/lng")]
    UnpairedCoordinate { count: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RejectedLine {
    pub line: u64,
    pub error: StructuralError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ImportOutcome {
    /// True only when every line was structurally valid
    pub all_succeeded: bool,
    pub routes_created: usize,
    pub waypoints_created: usize,
    pub rejected_lines: Vec<RejectedLine>,
}

impl Default for ImportOutcome {
    fn default() -> Self {
        Self {
            all_succeeded: true,
            routes_created: 0,
            waypoints_created: 0,
            rejected_lines: Vec::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("could not convert '{token}' to a coordinate on line {line}")]
    NumericParse { line: u64, token: String },
    #[error("unreadable input: {0}")]
    Read(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A structurally valid line, ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRoute {
    pub name: String,
    pub points: Vec<Coordinate>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Route(ParsedRoute),
    Rejected(StructuralError),
}

/// Validate one record; numeric failures are returned as `Err`
pub fn parse_record(record: &StringRecord, line: u64) -> Result<ParsedLine, ImportError> {
    if record.len() < 2 {
        return Ok(ParsedLine::Rejected(StructuralError::MissingFields {
            found: record.len(),
        }));
    }

    let tokens: Vec<&str> = record[0].split(',').collect();
    if tokens.len() % 2 != 0 {
        return Ok(ParsedLine::Rejected(StructuralError::UnpairedCoordinate {
            count: tokens.len(),
        }));
    }

    let values = tokens
        .iter()
        .map(|token| parse_coordinate(token, line))
        .collect::<Result<Vec<f64>, _>>()?;
    let points = values
        .chunks_exact(2)
        .map(|pair| Coordinate::new(pair[0], pair[1]))
        .collect();

    Ok(ParsedLine::Route(ParsedRoute {
        name: record[1].trim().to_string(),
        points,
    }))
}

fn parse_coordinate(token: &str, line: u64) -> Result<f64, ImportError> {
    token
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| ImportError::NumericParse {
            line,
            token: token.trim().to_string(),
        })
}

/// Fields of a single line; an empty line has none
fn split_line(text: &str) -> Result<StringRecord, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(FIELD_DELIMITER)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let first = reader.records().next();
    match first {
        Some(record) => record.map_err(|e| ImportError::Read(e.to_string())),
        None => Ok(StringRecord::new()),
    }
}

/// Import every route in `raw` on behalf of `principal`.
///
/// Lines are validated independently: a structurally broken one, blank
/// lines included, is skipped and reported. A coordinate that is not a
/// number aborts the batch, and since the batch is one transaction nothing
/// from it is written.
#[tracing::instrument(skip(pool, ids, principal, raw), fields(user_id = principal.user_id, bytes = raw.len()))]
pub async fn import_batch(
    pool: &SqlitePool,
    ids: &IdAllocator,
    principal: &Principal,
    raw: &str,
) -> Result<ImportOutcome, ImportError> {
    let route_ids = ids.reserve(Collection::Routes).await;
    let waypoint_ids = ids.reserve(Collection::Waypoints).await;
    let mut tx = pool.begin().await?;
    let mut outcome = ImportOutcome::default();

    // `lines` drops the final terminator, so a trailing newline is not a line
    for (index, text) in raw.lines().enumerate() {
        let line = index as u64 + 1;
        let record = split_line(text)?;

        let parsed = match parse_record(&record, line) {
            Ok(ParsedLine::Rejected(error)) => {
                warn!(line, error = %error, "Skipping invalid line");
                outcome.all_succeeded = false;
                outcome.rejected_lines.push(RejectedLine { line, error });
                continue;
            }
            Ok(ParsedLine::Route(parsed)) => parsed,
            Err(e) => {
                warn!(line, error = %e, "Aborting import");
                return Err(e);
            }
        };

        let route = store::insert_route(&mut tx, &route_ids, principal.user_id, &parsed.name).await?;
        for (position, point) in parsed.points.iter().enumerate() {
            store::insert_waypoint(
                &mut tx,
                &waypoint_ids,
                route.id,
                point.lat,
                point.lng,
                position as i64 + 1,
            )
            .await?;
        }

        outcome.routes_created += 1;
        outcome.waypoints_created += parsed.points.len();
    }

    tx.commit().await?;

    info!(
        routes = outcome.routes_created,
        waypoints = outcome.waypoints_created,
        rejected = outcome.rejected_lines.len(),
        "Import finished"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::store::fixtures::principal;

    async fn count(pool: &SqlitePool, table: &str) -> i64 {
        let query = format!("SELECT COUNT(*) FROM {table}");
        let (n,): (i64,) = sqlx::query_as(&query).fetch_one(pool).await.unwrap();
        n
    }

    fn record(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    #[test]
    fn test_parse_valid_line() {
        let parsed = parse_record(&record(&["49.1, 16.6 ,49.2,16.7", "  Brno Loop "]), 1).unwrap();
        assert_eq!(
            parsed,
            ParsedLine::Route(ParsedRoute {
                name: "Brno Loop".to_string(),
                points: vec![Coordinate::new(49.1, 16.6), Coordinate::new(49.2, 16.7)],
            })
        );
    }

    #[test]
    fn test_parse_structural_errors() {
        assert_eq!(
            parse_record(&record(&["1,2"]), 1).unwrap(),
            ParsedLine::Rejected(StructuralError::MissingFields { found: 1 })
        );
        assert_eq!(
            parse_record(&record(&["1,2,3", "Name"]), 1).unwrap(),
            ParsedLine::Rejected(StructuralError::UnpairedCoordinate { count: 3 })
        );
        // An empty coordinate list is a single empty token
        assert_eq!(
            parse_record(&record(&["", "Name"]), 1).unwrap(),
            ParsedLine::Rejected(StructuralError::UnpairedCoordinate { count: 1 })
        );
    }

    #[test]
    fn test_parse_blank_lines_are_structural_errors() {
        assert_eq!(
            parse_record(&split_line("").unwrap(), 4).unwrap(),
            ParsedLine::Rejected(StructuralError::MissingFields { found: 0 })
        );
        assert_eq!(
            parse_record(&split_line("   ").unwrap(), 4).unwrap(),
            ParsedLine::Rejected(StructuralError::MissingFields { found: 1 })
        );
        assert_eq!(
            parse_record(&split_line(" ; ").unwrap(), 4).unwrap(),
            ParsedLine::Rejected(StructuralError::UnpairedCoordinate { count: 1 })
        );
    }

    #[test]
    fn test_parse_non_numeric_is_fatal() {
        let err = parse_record(&record(&["a,2,3,4", "Name"]), 3).unwrap_err();
        match err {
            ImportError::NumericParse { line, token } => {
                assert_eq!(line, 3);
                assert_eq!(token, "a");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(parse_record(&record(&["1,2,3,", "Name"]), 1).is_err());
        assert!(parse_record(&record(&["NaN,2", "Name"]), 1).is_err());
    }

    #[tokio::test]
    async fn test_brno_loop_end_to_end() {
        let pool = memory_pool().await;
        let ids = IdAllocator::new();
        let owner = principal(&pool, &ids, "owner@example.com").await;
        assert_eq!(owner.user_id, 1);

        let outcome = import_batch(&pool, &ids, &owner, "49.1,16.6,49.2,16.7;Brno Loop")
            .await
            .unwrap();
        assert!(outcome.all_succeeded);
        assert_eq!(outcome.routes_created, 1);
        assert_eq!(outcome.waypoints_created, 2);

        let routes = store::list_routes(&pool, &owner).await.unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].name, "Brno Loop");
        assert_eq!(routes[0].owner_id, 1);

        let waypoints = store::route_waypoints(&pool, routes[0].id).await.unwrap();
        let got: Vec<(i64, f64, f64)> = waypoints.iter().map(|w| (w.order, w.lat, w.lng)).collect();
        assert_eq!(got, vec![(1, 49.1, 16.6), (2, 49.2, 16.7)]);
    }

    #[tokio::test]
    async fn test_all_valid_lines() {
        let pool = memory_pool().await;
        let ids = IdAllocator::new();
        let owner = principal(&pool, &ids, "owner@example.com").await;

        let raw = "1,2,3,4,5,6;Three\n7,8;One\r\n9,10,11,12;Two\n";
        let outcome = import_batch(&pool, &ids, &owner, raw).await.unwrap();

        assert!(outcome.all_succeeded);
        assert!(outcome.rejected_lines.is_empty());
        assert_eq!(outcome.routes_created, 3);
        assert_eq!(outcome.waypoints_created, 6);

        let routes = store::list_routes(&pool, &owner).await.unwrap();
        let names: Vec<&str> = routes.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Three", "One", "Two"]);

        for (route, expected) in routes.iter().zip([3, 1, 2]) {
            let orders: Vec<i64> = store::route_waypoints(&pool, route.id)
                .await
                .unwrap()
                .iter()
                .map(|w| w.order)
                .collect();
            assert_eq!(orders, (1..=expected).collect::<Vec<i64>>());
        }

        // Waypoint ids keep increasing across routes
        let (max_waypoint,): (i64,) = sqlx::query_as("SELECT MAX(id) FROM waypoints")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(max_waypoint, 6);
    }

    #[tokio::test]
    async fn test_structural_errors_are_isolated() {
        let pool = memory_pool().await;
        let ids = IdAllocator::new();
        let owner = principal(&pool, &ids, "owner@example.com").await;

        let raw = "1,2,3,4;First\n1,2;Name\n1,2,3;Name\n5,6,7,8;Last";
        // "1,2;Name" is valid (one pair); add a line with a missing name field
        let raw = format!("{raw}\n1,2");
        let outcome = import_batch(&pool, &ids, &owner, &raw).await.unwrap();

        assert!(!outcome.all_succeeded);
        assert_eq!(outcome.routes_created, 3);
        assert_eq!(
            outcome.rejected_lines,
            vec![
                RejectedLine {
                    line: 3,
                    error: StructuralError::UnpairedCoordinate { count: 3 },
                },
                RejectedLine {
                    line: 5,
                    error: StructuralError::MissingFields { found: 1 },
                },
            ]
        );
        assert_eq!(count(&pool, "routes").await, 3);
        assert_eq!(count(&pool, "waypoints").await, 5);
    }

    #[tokio::test]
    async fn test_blank_lines_spoil_the_outcome() {
        let cases = [
            ("1,2;A\n\n3,4;B", StructuralError::MissingFields { found: 0 }),
            ("1,2;A\n   \n3,4;B", StructuralError::MissingFields { found: 1 }),
            ("1,2;A\n ; \n3,4;B", StructuralError::UnpairedCoordinate { count: 1 }),
        ];

        for (raw, error) in cases {
            let pool = memory_pool().await;
            let ids = IdAllocator::new();
            let owner = principal(&pool, &ids, "owner@example.com").await;

            let outcome = import_batch(&pool, &ids, &owner, raw).await.unwrap();
            assert!(!outcome.all_succeeded, "{raw:?}");
            assert_eq!(outcome.routes_created, 2);
            assert_eq!(outcome.rejected_lines, vec![RejectedLine { line: 2, error }]);
        }
    }

    #[tokio::test]
    async fn test_non_numeric_coordinate_aborts_without_writes() {
        let pool = memory_pool().await;
        let ids = IdAllocator::new();
        let owner = principal(&pool, &ids, "owner@example.com").await;

        let raw = "1,2,3,4;Before\na,2,3,4;Name\n5,6,7,8;After";
        let err = import_batch(&pool, &ids, &owner, raw).await.unwrap_err();

        assert!(matches!(err, ImportError::NumericParse { line: 2, .. }));
        assert_eq!(err.to_string(), "could not convert 'a' to a coordinate on line 2");
        assert_eq!(count(&pool, "routes").await, 0);
        assert_eq!(count(&pool, "waypoints").await, 0);
    }

    #[tokio::test]
    async fn test_ids_continue_after_existing_rows() {
        let pool = memory_pool().await;
        let ids = IdAllocator::new();
        let owner = principal(&pool, &ids, "owner@example.com").await;

        import_batch(&pool, &ids, &owner, "1,2;A").await.unwrap();
        import_batch(&pool, &ids, &owner, "3,4,5,6;B").await.unwrap();

        let route_ids: Vec<i64> = store::list_routes(&pool, &owner)
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(route_ids, vec![1, 2]);

        let waypoint_ids: Vec<i64> = store::route_waypoints(&pool, 2)
            .await
            .unwrap()
            .iter()
            .map(|w| w.id)
            .collect();
        assert_eq!(waypoint_ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_quoted_name_may_contain_delimiter() {
        let pool = memory_pool().await;
        let ids = IdAllocator::new();
        let owner = principal(&pool, &ids, "owner@example.com").await;

        let outcome = import_batch(&pool, &ids, &owner, "1,2,3,4;\"North; South\"")
            .await
            .unwrap();
        assert!(outcome.all_succeeded);

        let routes = store::list_routes(&pool, &owner).await.unwrap();
        assert_eq!(routes[0].name, "North; South");
    }
}
