use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::geo::Bounds;
use crate::grid::GridCellId;
use crate::spots::{CommunityListing, PlaceId, Spot};

/// Read-only view of the spots service.
#[async_trait]
pub trait SpotBackend: Send + Sync {
    async fn fetch_cell(&self, id: GridCellId) -> AppResult<Vec<Spot>>;

    /// Service-area rectangle, or `None` when the service has no boundary to offer.
    async fn fetch_boundary(&self) -> AppResult<Option<Bounds>>;

    async fn communities_for(&self, place_id: &PlaceId) -> AppResult<Vec<CommunityListing>>;
}

pub struct HttpSpotBackend {
    http: Client,
    base: Url,
}

impl HttpSpotBackend {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("spotgrid/", env!("CARGO_PKG_VERSION")))
            .timeout(config.http_timeout())
            .build()?;
        let base = Url::parse(config.spots_api_base.trim_end_matches('/'))
            .map_err(|err| AppError::Config(format!("invalid spots API base URL: {err}")))?;
        Ok(Self { http, base })
    }

    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Config("spots API base cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments)
            // trailing slash, the backend routes end with one
            .push("");
        Ok(url)
    }
}

#[async_trait]
impl SpotBackend for HttpSpotBackend {
    async fn fetch_cell(&self, id: GridCellId) -> AppResult<Vec<Spot>> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            spots: Option<Vec<Value>>,
        }

        let url = self.endpoint(&["api", "fitness-spots"])?;
        trace!(cell = %id, %url, "requesting cell");
        let response = self
            .http
            .get(url)
            .query(&[("gridId", id.to_string())])
            .send()
            .await?
            .error_for_status()?;

        let parsed: Response = response.json().await?;
        let mut spots = Vec::new();
        for entry in parsed.spots.unwrap_or_default() {
            match Spot::from_payload(entry) {
                Ok(spot) => spots.push(spot),
                Err(err) => warn!(cell = %id, ?err, "skipping malformed spot"),
            }
        }
        Ok(spots)
    }

    async fn fetch_boundary(&self) -> AppResult<Option<Bounds>> {
        #[derive(Deserialize)]
        struct Response {
            north: Option<Value>,
            south: Option<Value>,
            east: Option<Value>,
            west: Option<Value>,
        }

        let url = self.endpoint(&["api", "map-boundaries"])?;
        let response = self.http.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("spots service reports no boundary");
            return Ok(None);
        }
        let response = response.error_for_status()?;
        let parsed: Response = response.json().await?;

        let number = |value: Option<Value>| value.and_then(|v| v.as_f64());
        match (
            number(parsed.north),
            number(parsed.south),
            number(parsed.east),
            number(parsed.west),
        ) {
            (Some(north), Some(south), Some(east), Some(west)) => {
                Ok(Some(Bounds::new(north, south, east, west)))
            }
            _ => Ok(None),
        }
    }

    async fn communities_for(&self, place_id: &PlaceId) -> AppResult<Vec<CommunityListing>> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            communities: Vec<CommunityListing>,
            #[serde(default)]
            error: Option<String>,
        }

        let url = self.endpoint(&["community", "by-place-json", place_id.as_str()])?;
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let parsed: Response = response.json().await?;
        if !status.is_success() {
            return Err(AppError::Backend(format!(
                "community lookup for {place_id} failed ({status}): {}",
                parsed.error.unwrap_or_else(|| "unknown error".into())
            )));
        }
        Ok(parsed.communities)
    }
}
