use rewear_types::models::GeoPoint;
use tracing::debug;

use crate::CoreError;
use crate::geo::{BoundingBox, distance_km};

pub const DEFAULT_RADIUS_KM: f64 = 10.0;
pub const DEFAULT_LIMIT: usize = 20;

/// Anything the nearby query can rank.
pub trait Candidate {
    fn point(&self) -> Option<GeoPoint>;
    fn is_public(&self) -> bool;
    /// Secondary sort key for equal distances.
    fn tie_key(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyQuery {
    pub origin: GeoPoint,
    pub radius_km: f64,
    pub limit: usize,
}

impl NearbyQuery {
    pub fn new(origin: GeoPoint, radius_km: f64, limit: usize) -> Result<Self, CoreError> {
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(CoreError::InvalidArgument(format!(
                "radius must be a positive number of kilometers, got {}",
                radius_km
            )));
        }
        Ok(Self {
            origin,
            radius_km,
            limit,
        })
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::around(self.origin, self.radius_km)
    }
}

/// Filter to public candidates within the radius, closest first.
///
/// Equal distances are ordered by `tie_key` so results are deterministic.
pub fn rank_nearby<T, I>(query: &NearbyQuery, candidates: I) -> Vec<(T, f64)>
where
    T: Candidate,
    I: IntoIterator<Item = T>,
{
    let mut scanned = 0usize;
    let mut ranked: Vec<(T, f64)> = candidates
        .into_iter()
        .inspect(|_| scanned += 1)
        .filter(|c| c.is_public())
        .filter_map(|c| {
            let distance = distance_km(query.origin, c.point()?);
            (distance <= query.radius_km).then_some((c, distance))
        })
        .collect();

    ranked.sort_by(|(a, da), (b, db)| da.total_cmp(db).then_with(|| a.tie_key().cmp(b.tie_key())));
    ranked.truncate(query.limit);

    debug!(
        "Nearby query at {} within {} km: {} scanned, {} returned",
        query.origin,
        query.radius_km,
        scanned,
        ranked.len()
    );
    ranked
}
