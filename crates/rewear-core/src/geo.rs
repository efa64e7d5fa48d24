use rewear_types::models::GeoPoint;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Slack added to prefilter bounds so float rounding never drops a point
/// that sits exactly on the radius.
const BOX_EPSILON_DEG: f64 = 1e-9;

/// Great-circle distance between two points in kilometers (haversine).
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlng = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (dlng / 2.0).sin().powi(2);

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Lat/lon window containing every point within a radius of an origin.
///
/// `longitude` is `None` when the window touches a pole or wraps the
/// antimeridian; callers then filter on latitude only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub longitude: Option<(f64, f64)>,
}

impl BoundingBox {
    pub fn around(origin: GeoPoint, radius_km: f64) -> Self {
        let angular = radius_km / EARTH_RADIUS_KM;
        let dlat = angular.to_degrees() + BOX_EPSILON_DEG;

        let min_latitude = origin.latitude - dlat;
        let max_latitude = origin.latitude + dlat;

        if min_latitude <= -90.0 || max_latitude >= 90.0 {
            return Self {
                min_latitude: min_latitude.max(-90.0),
                max_latitude: max_latitude.min(90.0),
                longitude: None,
            };
        }

        let dlon = (angular.sin() / origin.latitude.to_radians().cos())
            .asin()
            .to_degrees()
            + BOX_EPSILON_DEG;
        let min_longitude = origin.longitude - dlon;
        let max_longitude = origin.longitude + dlon;

        let longitude = if min_longitude < -180.0 || max_longitude > 180.0 {
            None
        } else {
            Some((min_longitude, max_longitude))
        };

        Self {
            min_latitude,
            max_latitude,
            longitude,
        }
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        let lat_ok = (self.min_latitude..=self.max_latitude).contains(&point.latitude);
        let lon_ok = match self.longitude {
            Some((min, max)) => (min..=max).contains(&point.longitude),
            None => true,
        };
        lat_ok && lon_ok
    }
}
