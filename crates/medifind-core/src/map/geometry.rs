//! Coordinates, bounds and distance formatting.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the maps provider's spherical geometry.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Initial map centre (Mumbai) before any results or location arrive.
pub const DEFAULT_CENTER: LatLng = LatLng {
    lat: 19.0760,
    lng: 72.8777,
};
pub const DEFAULT_ZOOM: u8 = 14;

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle distance in kilometres (haversine).
    pub fn distance_km(&self, other: &LatLng) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

/// Axis-aligned viewport bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    /// Degenerate bounds around one point.
    pub fn from_point(point: LatLng) -> Self {
        Self {
            south: point.lat,
            west: point.lng,
            north: point.lat,
            east: point.lng,
        }
    }

    /// Smallest bounds containing every point, or `None` for no points.
    pub fn covering<I: IntoIterator<Item = LatLng>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let mut bounds = Self::from_point(iter.next()?);
        for point in iter {
            bounds.extend(point);
        }
        Some(bounds)
    }

    pub fn extend(&mut self, point: LatLng) {
        self.south = self.south.min(point.lat);
        self.north = self.north.max(point.lat);
        self.west = self.west.min(point.lng);
        self.east = self.east.max(point.lng);
    }

    pub fn contains(&self, point: LatLng) -> bool {
        (self.south..=self.north).contains(&point.lat) && (self.west..=self.east).contains(&point.lng)
    }

    pub fn center(&self) -> LatLng {
        LatLng::new((self.south + self.north) / 2.0, (self.west + self.east) / 2.0)
    }
}

/// Human distance: whole metres under 1 km, otherwise km with one decimal.
pub fn format_distance(km: f64) -> String {
    let metres = km * 1000.0;
    if metres < 1000.0 {
        format!("{} m", metres.round() as i64)
    } else {
        format!("{:.1} km", km)
    }
}

/// Link that opens turn-by-turn directions in the maps provider.
pub fn directions_url(destination: LatLng) -> String {
    format!(
        "https://www.google.com/maps/dir/?api=1&destination={},{}",
        destination.lat, destination.lng
    )
}
