//! Database row types. These map directly to SQLite rows.
//! Distinct from rewear-types API models to keep the DB layer independent.
use rewear_core::nearby::Candidate;
use rewear_types::models::GeoPoint;

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct WardrobeRow {
    pub id: String,
    pub user_id: String,
    pub created_at: String,
}

/// Listing joined with its wardrobe owner.
#[derive(Debug, Clone)]
pub struct ListingRow {
    pub id: String,
    pub wardrobe_id: String,
    pub owner_id: String,
    pub owner_username: String,
    pub title: String,
    pub description: String,
    pub condition: String,
    pub category: String,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub is_public: bool,
    pub eco_impact: f64,
    /// Path under the uploads directory, e.g. `listings/<uuid>.jpg`.
    pub image: Option<String>,
    pub created_at: String,
}

impl ListingRow {
    pub fn location(&self) -> Option<GeoPoint> {
        match (self.longitude, self.latitude) {
            (Some(lon), Some(lat)) => GeoPoint::new(lon, lat).ok(),
            _ => None,
        }
    }
}

impl Candidate for ListingRow {
    fn point(&self) -> Option<GeoPoint> {
        self.location()
    }

    fn is_public(&self) -> bool {
        self.is_public
    }

    fn tie_key(&self) -> &str {
        &self.id
    }
}

/// Input for a listing insert. The eco-impact score is already resolved.
pub struct NewListing<'a> {
    pub id: &'a str,
    pub owner_id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub condition: &'a str,
    pub category: &'a str,
    pub location: Option<GeoPoint>,
    pub is_public: bool,
    pub eco_impact: f64,
}

/// Message joined with sender, receiver and listing title.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub receiver_id: String,
    pub receiver_username: String,
    pub listing_id: String,
    pub listing_title: String,
    pub content: String,
    pub is_read: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct UserLocationRow {
    pub user_id: String,
    pub longitude: f64,
    pub latitude: f64,
    pub updated_at: String,
}
