use anyhow::Context;
use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, header},
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use rewear_types::api::ListingResponse;

use crate::auth::AppState;
use crate::convert;
use crate::error::ApiError;
use crate::middleware::Claims;
use crate::run_db;

/// 5 MB upload limit for listing photos
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Subdirectory of the uploads dir that holds listing photos.
const LISTING_DIR: &str = "listings";

const MEDIA_PREFIX: &str = "/media/";

/// Accepted image types: (MIME type, file extension).
const IMAGE_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
    ("image/gif", "gif"),
];

/// Public URL for a stored image path like `listings/<uuid>.jpg`.
pub fn media_url(path: &str) -> String {
    format!("{MEDIA_PREFIX}{path}")
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next()?.trim();
    IMAGE_TYPES
        .iter()
        .find(|(m, _)| m.eq_ignore_ascii_case(mime))
        .map(|(_, ext)| *ext)
}

/// MIME type for a stored file name. Only `<uuid>.<ext>` names we generated are accepted.
fn content_type_for(file_name: &str) -> Option<&'static str> {
    let (stem, ext) = file_name.split_once('.')?;
    let id = stem.parse::<Uuid>().ok()?;
    if id.to_string() != stem {
        return None;
    }
    IMAGE_TYPES.iter().find(|(_, e)| *e == ext).map(|(m, _)| *m)
}

/// PUT /listings/{listing_id}/image: raw image bytes, typed by Content-Type.
/// Saves to `{uploads_dir}/listings/{uuid}.{ext}` and replaces any previous photo.
pub async fn upload_listing_image(
    State(state): State<AppState>,
    Path(listing_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Result<Json<ListingResponse>, ApiError> {
    let ext = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(extension_for)
        .ok_or_else(|| ApiError::field("image", "Upload a JPEG, PNG, WebP or GIF image."))?;
    if bytes.is_empty() {
        return Err(ApiError::field("image", "The submitted file is empty."));
    }

    let lid = listing_id.to_string();
    let listing = run_db(&state, move |db| db.get_listing(&lid))
        .await?
        .ok_or(ApiError::NotFound("Listing"))?;
    if listing.owner_id != claims.sub.to_string() {
        return Err(ApiError::PermissionDenied(
            "You can only change the image of your own listings.".into(),
        ));
    }

    let dir = state.uploads_dir.join(LISTING_DIR);
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("creating {}", dir.display()))?;

    let file_name = format!("{}.{}", Uuid::new_v4(), ext);
    let file_path = dir.join(&file_name);
    tokio::fs::write(&file_path, &bytes)
        .await
        .with_context(|| format!("writing {}", file_path.display()))?;

    let stored = format!("{LISTING_DIR}/{file_name}");
    let (lid, path) = (listing.id.clone(), stored.clone());
    let previous = match run_db(&state, move |db| db.set_listing_image(&lid, &path)).await {
        Ok(previous) => previous,
        Err(e) => {
            if let Err(rm) = tokio::fs::remove_file(&file_path).await {
                warn!("Failed to remove orphaned upload {}: {}", file_path.display(), rm);
            }
            return Err(e);
        }
    };

    if let Some(previous) = previous {
        let old = state.uploads_dir.join(&previous);
        if let Err(e) = tokio::fs::remove_file(&old).await {
            warn!("Failed to remove replaced image {}: {}", old.display(), e);
        }
    }

    info!(
        "{} uploaded {} ({} bytes) for listing {}",
        claims.username,
        stored,
        bytes.len(),
        listing.id
    );

    let lid = listing.id;
    let row = run_db(&state, move |db| db.get_listing(&lid))
        .await?
        .ok_or(ApiError::NotFound("Listing"))?;
    Ok(Json(convert::listing(row)?))
}

/// GET /media/listings/{file_name}: serves a stored listing photo. No authentication.
pub async fn listing_image(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // Also rejects anything that could escape the uploads directory
    let content_type = content_type_for(&file_name).ok_or(ApiError::NotFound("Image"))?;

    let path = state.uploads_dir.join(LISTING_DIR).join(&file_name);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ApiError::NotFound("Image")),
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context(format!("reading {}", path.display()))
                .into());
        }
    };

    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}
