use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::errors::AppResult;
use crate::geo::LatLng;

pub type PlaceId = String;

/// A number the backend may send either as JSON number or as a decimal string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    /// Finite value, or `None` when the payload does not parse.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Numeric::Number(value) => *value,
            Numeric::Text(text) => text.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

impl From<f64> for Numeric {
    fn from(value: f64) -> Self {
        Numeric::Number(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spot {
    pub place_id: PlaceId,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub address: String,
    /// Missing or null coordinates keep the spot in the cell but off the map.
    #[serde(default)]
    pub latitude: Option<Numeric>,
    #[serde(default)]
    pub longitude: Option<Numeric>,
    #[serde(default)]
    pub rating: Option<Numeric>,
    #[serde(default)]
    pub rating_count: Option<u64>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
    /// Remaining payload fields, passed through untouched to the detail view.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Spot {
    pub fn new(
        place_id: impl Into<PlaceId>,
        name: impl Into<String>,
        latitude: impl Into<Numeric>,
        longitude: impl Into<Numeric>,
    ) -> Self {
        Self {
            place_id: place_id.into(),
            name: name.into(),
            address: String::new(),
            latitude: Some(latitude.into()),
            longitude: Some(longitude.into()),
            rating: None,
            rating_count: None,
            website: None,
            phone_number: None,
            types: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Parses one entry of a cell payload.
    pub fn from_payload(entry: Value) -> AppResult<Self> {
        Ok(serde_json::from_value(entry)?)
    }

    pub fn position(&self) -> Option<LatLng> {
        let lat = self.latitude.as_ref()?.as_f64()?;
        let lng = self.longitude.as_ref()?.as_f64()?;
        Some(LatLng::new(lat, lng))
    }

    pub fn rating_value(&self) -> Option<f64> {
        self.rating.as_ref().and_then(Numeric::as_f64)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// What the cache holds for a cell. A failed fetch is terminal and reads as empty.
#[derive(Debug, Clone)]
pub enum CellRecord {
    Loaded(Vec<Spot>),
    Failed,
}

impl CellRecord {
    pub fn spots(&self) -> &[Spot] {
        match self {
            CellRecord::Loaded(spots) => spots,
            CellRecord::Failed => &[],
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, CellRecord::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityListing {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub contact_info: Option<String>,
}
