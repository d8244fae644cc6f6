//! Driving directions.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::LatLng;

const DIRECTIONS_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/directions/json";

/// Directions errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DirectionsError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Directions request failed: {0}")]
    Status(String),

    #[error("No route between the two points")]
    NoRoute,

    #[error("Unexpected directions response: {0}")]
    Decode(String),
}

pub type DirectionsResult<T> = Result<T, DirectionsError>;

/// Travel summary of the first leg of the first route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteInfo {
    pub distance_text: String,
    pub duration_text: String,
    /// Encoded overview polyline, when the provider returns one
    pub polyline: Option<String>,
}

#[async_trait]
pub trait DirectionsService: Send + Sync {
    /// Driving route from `origin` to `destination`.
    async fn route(&self, origin: LatLng, destination: LatLng) -> DirectionsResult<RouteInfo>;
}

#[derive(Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    routes: Vec<RouteBody>,
}

#[derive(Deserialize)]
struct RouteBody {
    #[serde(default)]
    legs: Vec<LegBody>,
    #[serde(default)]
    overview_polyline: Option<PolylineBody>,
}

#[derive(Deserialize)]
struct LegBody {
    distance: TextValue,
    duration: TextValue,
}

#[derive(Deserialize)]
struct TextValue {
    text: String,
}

#[derive(Deserialize)]
struct PolylineBody {
    points: String,
}

/// Read `routes[0].legs[0]` out of a Directions API body.
fn parse_route(body: &str) -> DirectionsResult<RouteInfo> {
    let response: DirectionsResponse =
        serde_json::from_str(body).map_err(|e| DirectionsError::Decode(e.to_string()))?;

    match response.status.as_str() {
        "OK" => {}
        "ZERO_RESULTS" | "NOT_FOUND" => return Err(DirectionsError::NoRoute),
        other => {
            let detail = response
                .error_message
                .map(|m| format!("{}: {}", other, m))
                .unwrap_or_else(|| other.to_string());
            return Err(DirectionsError::Status(detail));
        }
    }

    let route = response.routes.into_iter().next().ok_or(DirectionsError::NoRoute)?;
    let polyline = route.overview_polyline.map(|p| p.points);
    let leg = route.legs.into_iter().next().ok_or(DirectionsError::NoRoute)?;

    Ok(RouteInfo {
        distance_text: leg.distance.text,
        duration_text: leg.duration.text,
        polyline,
    })
}

/// Google Directions REST client.
#[derive(Clone)]
pub struct GoogleDirectionsClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl GoogleDirectionsClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            api_key: api_key.into(),
            endpoint: DIRECTIONS_ENDPOINT.to_string(),
        }
    }

    /// Point the client at another endpoint (proxies, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl DirectionsService for GoogleDirectionsClient {
    async fn route(&self, origin: LatLng, destination: LatLng) -> DirectionsResult<RouteInfo> {
        let resp = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("origin", format!("{},{}", origin.lat, origin.lng)),
                ("destination", format!("{},{}", destination.lat, destination.lng)),
                ("mode", "driving".to_string()),
                ("key", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(|e| DirectionsError::Network(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| DirectionsError::Network(e.to_string()))?;
        if !status.is_success() {
            return Err(DirectionsError::Status(format!("HTTP {}", status.as_u16())));
        }

        parse_route(&body)
    }
}
