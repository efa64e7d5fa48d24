use axum::{Extension, Json, extract::State};
use tracing::debug;

use rewear_types::api::{ReportLocationRequest, UserLocationResponse};

use crate::auth::AppState;
use crate::convert;
use crate::error::{ApiError, ApiJson};
use crate::middleware::Claims;
use crate::run_db;

/// Replace the caller's last-known location.
pub async fn report_location(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<ReportLocationRequest>,
) -> Result<Json<UserLocationResponse>, ApiError> {
    let uid = claims.sub.to_string();
    let point = req.location;
    let row = run_db(&state, move |db| db.upsert_user_location(&uid, point)).await?;
    debug!("{} is now at {}", claims.username, point);
    Ok(Json(convert::user_location(row)?))
}

pub async fn get_location(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserLocationResponse>, ApiError> {
    let uid = claims.sub.to_string();
    let row = run_db(&state, move |db| db.get_user_location(&uid))
        .await?
        .ok_or(ApiError::NotFound("Location"))?;
    Ok(Json(convert::user_location(row)?))
}
