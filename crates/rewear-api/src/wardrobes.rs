use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;
use uuid::Uuid;

use rewear_types::api::WardrobeResponse;

use crate::auth::AppState;
use crate::convert;
use crate::error::ApiError;
use crate::middleware::Claims;
use crate::run_db;

/// The caller's wardrobe, as a list of zero or one.
pub async fn list_wardrobes(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<WardrobeResponse>>, ApiError> {
    let uid = claims.sub.to_string();
    let row = run_db(&state, move |db| db.get_wardrobe_by_user(&uid)).await?;
    let wardrobes = row
        .into_iter()
        .map(convert::wardrobe)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(wardrobes))
}

/// 201 when the wardrobe was created now, 200 when it already existed.
pub async fn create_wardrobe(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let new_id = Uuid::new_v4().to_string();
    let (row, created) = run_db(&state, move |db| db.upsert_wardrobe(&new_id, &uid)).await?;

    let status = if created {
        info!("Created wardrobe {} for {}", row.id, claims.username);
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(convert::wardrobe(row)?)))
}
