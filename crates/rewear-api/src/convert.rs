//! Row → response mapping shared by the handlers.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use rewear_db::models::{ListingRow, MessageRow, UserLocationRow, WardrobeRow};
use rewear_types::api::{ListingResponse, ListingSummary, MessageResponse, UserLocationResponse, WardrobeResponse};
use rewear_types::models::{Category, Condition, GeoPoint};

use crate::images;

fn uuid(raw: &str, what: &str, row_id: &str) -> Result<Uuid> {
    raw.parse::<Uuid>()
        .with_context(|| format!("row {} has a corrupt {} '{}'", row_id, what, raw))
}

fn timestamp(raw: &str, row_id: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .with_context(|| format!("row {} has a corrupt timestamp '{}'", row_id, raw))
}

pub fn wardrobe(row: WardrobeRow) -> Result<WardrobeResponse> {
    Ok(WardrobeResponse {
        id: uuid(&row.id, "id", &row.id)?,
        user_id: uuid(&row.user_id, "user_id", &row.id)?,
        created_at: timestamp(&row.created_at, &row.id)?,
    })
}

pub fn listing(row: ListingRow) -> Result<ListingResponse> {
    let condition = row
        .condition
        .parse::<Condition>()
        .with_context(|| format!("listing {} has a bad condition", row.id))?;
    let category = row
        .category
        .parse::<Category>()
        .with_context(|| format!("listing {} has a bad category", row.id))?;

    Ok(ListingResponse {
        id: uuid(&row.id, "id", &row.id)?,
        wardrobe_id: uuid(&row.wardrobe_id, "wardrobe_id", &row.id)?,
        owner_id: uuid(&row.owner_id, "owner_id", &row.id)?,
        location: row.location(),
        created_at: timestamp(&row.created_at, &row.id)?,
        image: row.image.as_deref().map(images::media_url),
        owner_username: row.owner_username,
        title: row.title,
        description: row.description,
        condition,
        category,
        is_public: row.is_public,
        eco_impact: row.eco_impact,
    })
}

pub fn message(row: MessageRow) -> Result<MessageResponse> {
    Ok(MessageResponse {
        id: uuid(&row.id, "id", &row.id)?,
        sender_id: uuid(&row.sender_id, "sender_id", &row.id)?,
        receiver_id: uuid(&row.receiver_id, "receiver_id", &row.id)?,
        listing: ListingSummary {
            id: uuid(&row.listing_id, "listing_id", &row.id)?,
            title: row.listing_title,
        },
        created_at: timestamp(&row.created_at, &row.id)?,
        sender_username: row.sender_username,
        receiver_username: row.receiver_username,
        content: row.content,
        is_read: row.is_read,
    })
}

pub fn user_location(row: UserLocationRow) -> Result<UserLocationResponse> {
    let location = GeoPoint::new(row.longitude, row.latitude)
        .map_err(|e| anyhow!("stored location for {} is invalid: {}", row.user_id, e))?;
    Ok(UserLocationResponse {
        user_id: uuid(&row.user_id, "user_id", &row.user_id)?,
        location,
        updated_at: timestamp(&row.updated_at, &row.user_id)?,
    })
}
