use std::time::Duration;

use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::backend::SpotBackend;
use crate::config::AppConfig;
use crate::geo::{Bounds, LatLng};
use crate::map::{Geolocator, MapOptions};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartupPlan {
    pub options: MapOptions,
    /// Service area as reported, before the buffer is added.
    pub boundary: Option<Bounds>,
    pub user_position: Option<LatLng>,
}

/// Resolves the service boundary and the user's position side by side, then picks
/// the initial view.
pub async fn plan(
    config: &AppConfig,
    backend: &dyn SpotBackend,
    locator: &dyn Geolocator,
) -> StartupPlan {
    let (boundary, position) = tokio::join!(
        resolve_boundary(backend),
        locate_with_timeout(locator, config.geolocation_timeout()),
    );
    choose_view(config, boundary, position)
}

pub async fn resolve_boundary(backend: &dyn SpotBackend) -> Option<Bounds> {
    match backend.fetch_boundary().await {
        Ok(Some(boundary)) => Some(boundary),
        Ok(None) => {
            info!("no service boundary available; map restriction disabled");
            None
        }
        Err(err) => {
            warn!(?err, "could not fetch service boundary; map restriction disabled");
            None
        }
    }
}

/// `None` when the locator is denied, has nothing, or does not answer in time.
pub async fn locate_with_timeout(locator: &dyn Geolocator, wait: Duration) -> Option<LatLng> {
    match timeout(wait, locator.locate()).await {
        Ok(position) => position,
        Err(_) => {
            debug!(?wait, "geolocation timed out");
            None
        }
    }
}

pub fn choose_view(
    config: &AppConfig,
    boundary: Option<Bounds>,
    position: Option<LatLng>,
) -> StartupPlan {
    let mut center = config.default_center;
    let mut zoom = config.default_zoom;

    if let (Some(boundary), Some(user)) = (boundary, position) {
        if boundary.strictly_contains(user) {
            center = user;
            zoom = config.located_zoom;
        }
    }

    StartupPlan {
        options: MapOptions {
            center,
            zoom,
            restriction: boundary.map(|b| b.expanded(config.boundary_buffer_deg)),
        },
        boundary,
        user_position: position,
    }
}
