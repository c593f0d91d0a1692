use axum::{extract::State, http::StatusCode, Json};

use crate::api::{ApiError, ErrorResponse, error_response, internal_error};
use crate::auth::Principal;
use crate::import::{self, ImportError, ImportOutcome};
use crate::state::AppState;

/// Import routes from `;`-delimited text, one route per line
///
/// Lines with a missing name or an unpaired coordinate are skipped and
/// listed in `rejected_lines`. A non-numeric coordinate rejects the whole
/// batch and nothing is stored.
#[utoipa::path(
    post,
    path = "/api/routes/import",
    request_body(content = String, content_type = "text/plain", description = "lat1,lng1,lat2,lng2,...;Route name"),
    responses(
        (status = 200, description = "Import finished, possibly with skipped lines", body = ImportOutcome),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 422, description = "Batch rejected", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn import_routes(
    State(state): State<AppState>,
    principal: Principal,
    body: String,
) -> Result<Json<ImportOutcome>, ApiError> {
    match import::import_batch(&state.pool, &state.ids, &principal, &body).await {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e @ (ImportError::NumericParse { .. } | ImportError::Read(_))) => {
            Err(error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
        }
        Err(e) => Err(internal_error(e)),
    }
}
