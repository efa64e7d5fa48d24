use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use rewear_core::messaging::{authorize_read_update, resolve_receiver};
use rewear_types::api::{MessageResponse, SendMessageRequest, UpdateMessageRequest};

use crate::auth::AppState;
use crate::convert;
use crate::error::{ApiError, ApiJson};
use crate::middleware::Claims;
use crate::run_db;

/// Messages the caller sent or received, newest first.
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    let uid = claims.sub.to_string();
    let rows = run_db(&state, move |db| db.get_messages_for_user(&uid)).await?;
    let messages = rows
        .into_iter()
        .map(convert::message)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(messages))
}

/// Unread messages addressed to the caller, newest first.
pub async fn inbox(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    let uid = claims.sub.to_string();
    let rows = run_db(&state, move |db| db.get_unread_inbox(&uid)).await?;
    let messages = rows
        .into_iter()
        .map(convert::message)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(messages))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::field("content", "This field may not be blank."));
    }

    let lid = req.listing.to_string();
    let listing = run_db(&state, move |db| db.get_listing(&lid))
        .await?
        .ok_or(ApiError::NotFound("Listing"))?;

    let owner: Uuid = listing
        .owner_id
        .parse()
        .map_err(|e| anyhow::anyhow!("corrupt owner_id on listing {}: {}", listing.id, e))?;
    let receiver = resolve_receiver(owner, claims.sub).inspect_err(|_| {
        warn!("{} tried to message themselves about {}", claims.username, listing.id);
    })?;

    let message_id = Uuid::new_v4().to_string();
    let (sender_id, receiver_id, listing_id) =
        (claims.sub.to_string(), receiver.to_string(), listing.id.clone());
    let row = run_db(&state, move |db| {
        db.insert_message(&message_id, &sender_id, &receiver_id, &listing_id, &content)
    })
    .await?;

    info!(
        "Message {} from {} to {} about listing {}",
        row.id, row.sender_username, row.receiver_username, row.listing_id
    );

    Ok((StatusCode::CREATED, Json(convert::message(row)?)))
}

/// Flip a message's read flag. Receiver only.
pub async fn update_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<UpdateMessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let mid = message_id.to_string();
    let existing = run_db(&state, move |db| db.get_message(&mid))
        .await?
        .ok_or(ApiError::NotFound("Message"))?;

    let receiver: Uuid = existing
        .receiver_id
        .parse()
        .map_err(|e| anyhow::anyhow!("corrupt receiver_id on message {}: {}", existing.id, e))?;
    authorize_read_update(receiver, claims.sub)?;

    let mid = existing.id.clone();
    let row = run_db(&state, move |db| db.set_message_read(&mid, req.is_read))
        .await?
        .ok_or(ApiError::NotFound("Message"))?;

    Ok(Json(convert::message(row)?))
}
