//! Zone source fetching the zone table from a JSON endpoint.
//!
//! The endpoint answers either with a bare array of zones or with the array
//! wrapped in a `data` member, each zone in the portal's record shape.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::{debug, info};

use taka_core::{
    model::{ServiceAreaMeta, ZoneRecord},
    ports::{PortError, ZoneSource},
};

/// Accepted response shapes.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ZonesResponse {
    Wrapped { data: Vec<ZoneRecord> },
    Bare(Vec<ZoneRecord>),
}

impl From<ZonesResponse> for Vec<ZoneRecord> {
    fn from(response: ZonesResponse) -> Self {
        match response {
            ZonesResponse::Wrapped { data } | ZonesResponse::Bare(data) => data,
        }
    }
}

/// Zone source backed by an HTTP endpoint.
pub struct HttpZoneSource {
    client: Client,
    url: String,
    meta: ServiceAreaMeta,
}

impl HttpZoneSource {
    /// Create a new source reading `url` with the given HTTP client.
    #[must_use]
    pub fn new(client: Client, url: impl Into<String>, meta: ServiceAreaMeta) -> Self {
        Self {
            client,
            url: url.into(),
            meta,
        }
    }

    /// Endpoint this source reads.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ZoneSource for HttpZoneSource {
    fn service_area(&self) -> &ServiceAreaMeta {
        &self.meta
    }

    async fn fetch_zones(&self) -> Result<Vec<ZoneRecord>, PortError> {
        info!(url = %self.url, "fetching zone table");
        let body = fetch_bytes(self.client.get(&self.url)).await?;
        let records = decode_zones(&body)?;
        debug!(zones = records.len(), "decoded zone table");
        Ok(records)
    }
}

/// Decode a zone table in either accepted shape.
///
/// # Errors
///
/// Returns [`PortError::Decode`] when the payload matches neither shape.
pub fn decode_zones(body: &[u8]) -> Result<Vec<ZoneRecord>, PortError> {
    let response: ZonesResponse = serde_json::from_slice(body)?;
    Ok(response.into())
}

// Small helper to fetch the raw body with status handling.
async fn fetch_bytes(req: RequestBuilder) -> Result<Vec<u8>, PortError> {
    let bytes = req
        .send()
        .await
        .map_err(PortError::from)?
        .error_for_status()
        .map_err(PortError::from)?
        .bytes()
        .await
        .map_err(PortError::from)?;
    Ok(bytes.to_vec())
}
