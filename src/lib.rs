pub mod backend;
pub mod cache;
pub mod config;
pub mod controller;
pub mod errors;
pub mod fetch;
pub mod geo;
pub mod grid;
pub mod guard;
pub mod headless;
pub mod map;
pub mod render;
pub mod selection;
pub mod spots;
pub mod startup;

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use backend::{HttpSpotBackend, SpotBackend};
pub use cache::CellCache;
pub use config::{AppConfig, PublicAppConfig};
pub use controller::{PassReport, SettleOutcome, ViewportController};
pub use errors::{AppError, AppResult};
pub use fetch::{FetchCoordinator, FetchReport};
pub use geo::{Bounds, LatLng};
pub use grid::{GridCellId, GridSpec};
pub use map::{Geolocator, MapEvent, MapOptions, MapWidget, PanelLayout, SpotListPanel};
pub use render::{RenderReconciler, RenderSummary};
pub use spots::{CellRecord, CommunityListing, Numeric, PlaceId, Spot};

/// Installs the fmt subscriber once; later calls are no-ops.
pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,spotgrid=debug"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    });
}
