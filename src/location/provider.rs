//! One-shot position sources.
//!
//! A [`PositionProvider`] answers a single "where am I" question. It never
//! streams updates; the resolver decides when to ask again.

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Deserialize;

use super::types::{Coordinates, PositionError};

pub const DEFAULT_GEOLOCATION_BASE_URL: &str = "http://ip-api.com";

#[async_trait]
pub trait PositionProvider: Send + Sync {
    /// Returns the name of the position source.
    fn name(&self) -> &str;

    /// Requests the current position once.
    async fn current_position(&self) -> Result<Coordinates, PositionError>;
}

/// Always reports the same coordinates (configured or passed on the command line).
pub struct FixedPosition {
    coordinates: Coordinates,
}

impl FixedPosition {
    pub fn new(coordinates: Coordinates) -> Self {
        Self { coordinates }
    }
}

#[async_trait]
impl PositionProvider for FixedPosition {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn current_position(&self) -> Result<Coordinates, PositionError> {
        Ok(self.coordinates)
    }
}

/// Used when no position capability exists at all.
pub struct NoPosition;

#[async_trait]
impl PositionProvider for NoPosition {
    fn name(&self) -> &str {
        "none"
    }

    async fn current_position(&self) -> Result<Coordinates, PositionError> {
        Err(PositionError::Unavailable("no position source configured".to_string()))
    }
}

// ============================================================================
// IP geolocation
// ============================================================================

/// Response body of `GET {base}/json`.
#[derive(Deserialize, Debug)]
struct IpLookupResponse {
    status: String,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    message: Option<String>,
}

/// Approximate position from the public IP address.
pub struct IpGeolocation {
    base_url: String,
    client: reqwest::Client,
}

impl IpGeolocation {
    pub fn new(base_url: Option<String>) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_GEOLOCATION_BASE_URL.to_string());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PositionProvider for IpGeolocation {
    fn name(&self) -> &str {
        "ip-geolocation"
    }

    async fn current_position(&self) -> Result<Coordinates, PositionError> {
        let url = format!("{}/json", self.base_url);
        debug!("IP geolocation request: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PositionError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            warn!("IP geolocation returned HTTP {}", status);
            return Err(PositionError::Unavailable(format!("HTTP {status}")));
        }

        let body: IpLookupResponse = response
            .json()
            .await
            .map_err(|e| PositionError::Unavailable(format!("malformed response: {e}")))?;

        if body.status != "success" {
            let reason = body.message.unwrap_or_else(|| body.status.clone());
            warn!("IP geolocation lookup failed: {}", reason);
            return Err(PositionError::Unavailable(reason));
        }

        match (body.lat, body.lon) {
            (Some(lat), Some(lon)) => {
                let coords = Coordinates::new(lat, lon).ok_or_else(|| {
                    PositionError::Unavailable(format!("out-of-range coordinates {lat}, {lon}"))
                })?;
                info!("IP geolocation resolved to {}", coords);
                Ok(coords)
            }
            _ => Err(PositionError::Unavailable("response missing lat/lon".to_string())),
        }
    }
}
