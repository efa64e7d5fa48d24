use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use rewear_core::eco::resolve_eco_impact;
use rewear_core::nearby::{DEFAULT_LIMIT, DEFAULT_RADIUS_KM, NearbyQuery};
use rewear_db::models::NewListing;
use rewear_types::api::{CreateListingRequest, ListingResponse, NearbyListingResponse};
use rewear_types::models::{GeoPoint, PointError};

use crate::auth::AppState;
use crate::convert;
use crate::error::{ApiError, ApiJson};
use crate::middleware::Claims;
use crate::run_db;

const MAX_TITLE_CHARS: usize = 200;
const PUBLIC_FEED_LIMIT: u32 = 20;

/// Raw query values; parsed by hand so bad numbers become field errors.
#[derive(Debug, Deserialize)]
pub struct NearbyParams {
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub radius: Option<String>,
}

pub async fn list_listings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<ListingResponse>>, ApiError> {
    let uid = claims.sub.to_string();
    let rows = run_db(&state, move |db| db.get_listings_for_user(&uid)).await?;
    let listings = rows
        .into_iter()
        .map(convert::listing)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(listings))
}

pub async fn create_listing(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateListingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::field("title", "This field may not be blank."));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(ApiError::field(
            "title",
            format!("Ensure this field has no more than {} characters.", MAX_TITLE_CHARS),
        ));
    }

    let eco_impact = resolve_eco_impact(req.eco_impact, req.category, req.condition)
        .map_err(|e| ApiError::field("eco_impact", e))?;

    let listing_id = Uuid::new_v4().to_string();
    let wardrobe_id = Uuid::new_v4().to_string();
    let owner_id = claims.sub.to_string();
    let row = run_db(&state, move |db| {
        db.insert_listing(
            &NewListing {
                id: &listing_id,
                owner_id: &owner_id,
                title: &title,
                description: &req.description,
                condition: req.condition.as_str(),
                category: req.category.as_str(),
                location: req.location,
                is_public: req.is_public,
                eco_impact,
            },
            &wardrobe_id,
        )
    })
    .await?;

    info!(
        "{} listed '{}' ({}), eco_impact {:.2}",
        claims.username, row.title, row.id, row.eco_impact
    );

    Ok((StatusCode::CREATED, Json(convert::listing(row)?)))
}

/// Latest public listings, newest first. No authentication.
pub async fn public_listings(
    State(state): State<AppState>,
) -> Result<Json<Vec<ListingResponse>>, ApiError> {
    let rows = run_db(&state, |db| db.get_latest_public_listings(PUBLIC_FEED_LIMIT)).await?;
    let listings = rows
        .into_iter()
        .map(convert::listing)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(listings))
}

pub async fn nearby_listings(
    State(state): State<AppState>,
    Query(params): Query<NearbyParams>,
    Extension(_claims): Extension<Claims>,
) -> Result<Json<Vec<NearbyListingResponse>>, ApiError> {
    let Some(origin) = parse_origin(params.lat.as_deref(), params.lon.as_deref())? else {
        return Ok(Json(vec![]));
    };

    let radius_km = match present(params.radius.as_deref()) {
        Some(raw) => raw
            .parse::<f64>()
            .map_err(|_| ApiError::field("radius", format!("'{}' is not a number.", raw)))?,
        None => DEFAULT_RADIUS_KM,
    };
    let query = NearbyQuery::new(origin, radius_km, DEFAULT_LIMIT)
        .map_err(|e| ApiError::field("radius", e))?;

    let ranked = run_db(&state, move |db| db.nearby_listings(&query)).await?;
    let results = ranked
        .into_iter()
        .map(|(row, distance_km)| -> anyhow::Result<NearbyListingResponse> {
            Ok(NearbyListingResponse {
                listing: convert::listing(row)?,
                distance_km,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(results))
}

fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

/// `None` when either coordinate is missing; an error when one is malformed.
fn parse_origin(lat: Option<&str>, lon: Option<&str>) -> Result<Option<GeoPoint>, ApiError> {
    let (Some(lat), Some(lon)) = (present(lat), present(lon)) else {
        return Ok(None);
    };
    let lat = lat
        .parse::<f64>()
        .map_err(|_| ApiError::field("lat", format!("'{}' is not a number.", lat)))?;
    let lon = lon
        .parse::<f64>()
        .map_err(|_| ApiError::field("lon", format!("'{}' is not a number.", lon)))?;

    GeoPoint::new(lon, lat).map(Some).map_err(|e| match e {
        PointError::LongitudeOutOfRange(_) => ApiError::field("lon", e),
        _ => ApiError::field("lat", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_coordinates_mean_no_origin() {
        assert!(parse_origin(None, None).unwrap().is_none());
        assert!(parse_origin(Some("44.9"), None).unwrap().is_none());
        assert!(parse_origin(Some(""), Some(" ")).unwrap().is_none());
    }

    #[test]
    fn origin_is_lon_lat() {
        let origin = parse_origin(Some("56.78"), Some("12.34")).unwrap().unwrap();
        assert_eq!(origin.longitude, 12.34);
        assert_eq!(origin.latitude, 56.78);
    }

    #[test]
    fn malformed_coordinates_name_the_field() {
        assert!(matches!(
            parse_origin(Some("north"), Some("1")),
            Err(ApiError::Validation { field: "lat", .. })
        ));
        assert!(matches!(
            parse_origin(Some("1"), Some("200")),
            Err(ApiError::Validation { field: "lon", .. })
        ));
        assert!(matches!(
            parse_origin(Some("-91"), Some("0")),
            Err(ApiError::Validation { field: "lat", .. })
        ));
    }
}
