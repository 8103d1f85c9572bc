use std::str::FromStr;
use std::time::Duration;
use std::{env, io};

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::debug;

use crate::geo::LatLng;
use crate::grid::GridSpec;

const DEFAULT_SPOTS_API_BASE: &str = "http://127.0.0.1:8000";
const DEFAULT_GRID_ORIGIN: LatLng = LatLng {
    lat: -6.8,
    lng: 106.5,
};
const DEFAULT_GRID_CELL_SIZE_DEG: f64 = 0.09;
const DEFAULT_CENTER: LatLng = LatLng {
    lat: -6.370403,
    lng: 106.826946,
};
const DEFAULT_ZOOM: u8 = 17;
const DEFAULT_LOCATED_ZOOM: u8 = 16;
const DEFAULT_SELECTION_ZOOM: u8 = 16;
const DEFAULT_BOUNDARY_BUFFER_DEG: f64 = 0.018;
const DEFAULT_GEOLOCATION_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_PANEL_TRANSITION_DELAY_MS: u64 = 100;
const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub spots_api_base: String,
    pub grid_origin: LatLng,
    pub grid_cell_size_deg: f64,
    pub default_center: LatLng,
    pub default_zoom: u8,
    pub located_zoom: u8,
    pub selection_zoom: u8,
    pub boundary_buffer_deg: f64,
    pub geolocation_timeout_ms: u64,
    pub panel_transition_delay_ms: u64,
    pub cell_fetch_max_attempts: u32,
    pub http_timeout_ms: u64,
    pub maps_api_key: Option<SecretString>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PublicAppConfig {
    pub spots_api_base: String,
    pub grid_origin: LatLng,
    pub grid_cell_size_deg: f64,
    pub default_center: LatLng,
    pub default_zoom: u8,
    pub located_zoom: u8,
    pub selection_zoom: u8,
    pub boundary_buffer_deg: f64,
    pub geolocation_timeout_ms: u64,
    pub panel_transition_delay_ms: u64,
    pub cell_fetch_max_attempts: u32,
    pub http_timeout_ms: u64,
    pub has_maps_api_key: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            spots_api_base: DEFAULT_SPOTS_API_BASE.to_string(),
            grid_origin: DEFAULT_GRID_ORIGIN,
            grid_cell_size_deg: DEFAULT_GRID_CELL_SIZE_DEG,
            default_center: DEFAULT_CENTER,
            default_zoom: DEFAULT_ZOOM,
            located_zoom: DEFAULT_LOCATED_ZOOM,
            selection_zoom: DEFAULT_SELECTION_ZOOM,
            boundary_buffer_deg: DEFAULT_BOUNDARY_BUFFER_DEG,
            geolocation_timeout_ms: DEFAULT_GEOLOCATION_TIMEOUT_MS,
            panel_transition_delay_ms: DEFAULT_PANEL_TRANSITION_DELAY_MS,
            cell_fetch_max_attempts: 1,
            http_timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
            maps_api_key: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        Self {
            spots_api_base: env::var("SPOTS_API_BASE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SPOTS_API_BASE.to_string()),
            grid_origin: LatLng::new(
                parse_f64("GRID_ORIGIN_LAT", DEFAULT_GRID_ORIGIN.lat),
                parse_f64("GRID_ORIGIN_LNG", DEFAULT_GRID_ORIGIN.lng),
            ),
            grid_cell_size_deg: Some(parse_f64("GRID_CELL_SIZE_DEG", DEFAULT_GRID_CELL_SIZE_DEG))
                .filter(|size| *size > 0.0)
                .unwrap_or(DEFAULT_GRID_CELL_SIZE_DEG),
            default_center: LatLng::new(
                parse_f64("DEFAULT_CENTER_LAT", DEFAULT_CENTER.lat),
                parse_f64("DEFAULT_CENTER_LNG", DEFAULT_CENTER.lng),
            ),
            default_zoom: parse_u8("DEFAULT_ZOOM", DEFAULT_ZOOM),
            located_zoom: parse_u8("LOCATED_ZOOM", DEFAULT_LOCATED_ZOOM),
            selection_zoom: parse_u8("SELECTION_ZOOM", DEFAULT_SELECTION_ZOOM),
            boundary_buffer_deg: parse_f64("BOUNDARY_BUFFER_DEG", DEFAULT_BOUNDARY_BUFFER_DEG),
            geolocation_timeout_ms: parse_u64(
                "GEOLOCATION_TIMEOUT_MS",
                DEFAULT_GEOLOCATION_TIMEOUT_MS,
            ),
            panel_transition_delay_ms: parse_u64(
                "PANEL_TRANSITION_DELAY_MS",
                DEFAULT_PANEL_TRANSITION_DELAY_MS,
            ),
            cell_fetch_max_attempts: parse_u32("CELL_FETCH_MAX_ATTEMPTS", 1).max(1),
            http_timeout_ms: parse_u64("HTTP_TIMEOUT_MS", DEFAULT_HTTP_TIMEOUT_MS),
            maps_api_key: env::var("MAPS_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from),
        }
    }

    /// Key the map widget loads with. Never logged or serialized.
    pub fn maps_api_key(&self) -> Option<&str> {
        self.maps_api_key.as_ref().map(|key| key.expose_secret())
    }

    pub fn grid(&self) -> GridSpec {
        GridSpec::new(self.grid_origin, self.grid_cell_size_deg)
    }

    pub fn geolocation_timeout(&self) -> Duration {
        Duration::from_millis(self.geolocation_timeout_ms)
    }

    pub fn panel_transition_delay(&self) -> Duration {
        Duration::from_millis(self.panel_transition_delay_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn public_profile(&self) -> PublicAppConfig {
        PublicAppConfig {
            spots_api_base: self.spots_api_base.clone(),
            grid_origin: self.grid_origin,
            grid_cell_size_deg: self.grid_cell_size_deg,
            default_center: self.default_center,
            default_zoom: self.default_zoom,
            located_zoom: self.located_zoom,
            selection_zoom: self.selection_zoom,
            boundary_buffer_deg: self.boundary_buffer_deg,
            geolocation_timeout_ms: self.geolocation_timeout_ms,
            panel_transition_delay_ms: self.panel_transition_delay_ms,
            cell_fetch_max_attempts: self.cell_fetch_max_attempts,
            http_timeout_ms: self.http_timeout_ms,
            has_maps_api_key: self.maps_api_key.is_some(),
        }
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn parse_f64(key: &str, default: f64) -> f64 {
    parse_var::<f64>(key)
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    parse_var(key).unwrap_or(default)
}

fn parse_u32(key: &str, default: u32) -> u32 {
    parse_var(key).unwrap_or(default)
}

fn parse_u8(key: &str, default: u8) -> u8 {
    parse_var(key).unwrap_or(default)
}
