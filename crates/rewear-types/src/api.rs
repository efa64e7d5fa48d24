use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Category, Condition, GeoPoint};

// -- JWT Claims --

/// JWT claims issued at register/login and checked by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

/// Returned by both register and login.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

// -- Wardrobes --

#[derive(Debug, Serialize, Deserialize)]
pub struct WardrobeResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

// -- Listings --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateListingRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub condition: Condition,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default = "default_public")]
    pub is_public: bool,
    /// Left unset to have the score computed from category and condition.
    #[serde(default)]
    pub eco_impact: Option<f64>,
}

fn default_public() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingResponse {
    pub id: Uuid,
    pub wardrobe_id: Uuid,
    pub owner_id: Uuid,
    pub owner_username: String,
    pub title: String,
    pub description: String,
    pub condition: Condition,
    pub category: Category,
    pub location: Option<GeoPoint>,
    pub is_public: bool,
    pub eco_impact: f64,
    /// URL of the listing photo, e.g. `/media/listings/<uuid>.jpg`.
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NearbyListingResponse {
    #[serde(flatten)]
    pub listing: ListingResponse,
    pub distance_km: f64,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub listing: Uuid,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMessageRequest {
    pub is_read: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSummary {
    pub id: Uuid,
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub sender_username: String,
    pub receiver_id: Uuid,
    pub receiver_username: String,
    pub listing: ListingSummary,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

// -- Locations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportLocationRequest {
    pub location: GeoPoint,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserLocationResponse {
    pub user_id: Uuid,
    pub location: GeoPoint,
    pub updated_at: DateTime<Utc>,
}
