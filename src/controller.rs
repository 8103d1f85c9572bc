use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::backend::SpotBackend;
use crate::cache::CellCache;
use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::fetch::{FetchCoordinator, FetchReport};
use crate::geo::LatLng;
use crate::grid::{GridCellId, GridSpec};
use crate::guard::{Admission, SettleGuard};
use crate::map::{Geolocator, MapEvent, MapOptions, MapWidget, PopupContent, SpotCard, SpotListPanel};
use crate::render::{RenderReconciler, RenderSummary};
use crate::selection::SelectionState;
use crate::spots::PlaceId;
use crate::startup::{self, StartupPlan};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassReport {
    pub visible: BTreeSet<GridCellId>,
    pub fetch: FetchReport,
    pub render: RenderSummary,
    pub selection_kept: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SettleOutcome {
    /// Our own pan or zoom settled; nothing reloaded.
    Suppressed,
    /// Another pass was running; the settle was discarded.
    Dropped,
    NoViewport,
    Rendered(PassReport),
}

/// Owns the grid cache session for one map: reacts to settle events, loads the
/// visible cells and redraws markers and list entries from the cache.
pub struct ViewportController {
    config: AppConfig,
    grid: GridSpec,
    backend: Arc<dyn SpotBackend>,
    fetcher: FetchCoordinator,
    reconciler: Mutex<RenderReconciler>,
    selection: Mutex<SelectionState>,
    guard: SettleGuard,
    map: Arc<dyn MapWidget>,
    panel: Arc<dyn SpotListPanel>,
    locator: Arc<dyn Geolocator>,
    startup: StartupPlan,
}

impl ViewportController {
    /// Runs the startup sequence and builds the map with the chosen view. The
    /// factory also receives the Maps API key when one is configured.
    pub async fn start<F>(
        config: AppConfig,
        backend: Arc<dyn SpotBackend>,
        locator: Arc<dyn Geolocator>,
        panel: Arc<dyn SpotListPanel>,
        build_map: F,
    ) -> AppResult<Arc<Self>>
    where
        F: FnOnce(&MapOptions, Option<&str>) -> AppResult<Arc<dyn MapWidget>>,
    {
        let plan = startup::plan(&config, backend.as_ref(), locator.as_ref()).await;
        let map = build_map(&plan.options, config.maps_api_key())?;
        if let Some(position) = plan.user_position {
            map.show_user_location(position);
        }
        info!(
            center = ?plan.options.center,
            zoom = plan.options.zoom,
            restricted = plan.options.restriction.is_some(),
            "map initialised"
        );

        let cache = Arc::new(CellCache::new());
        let fetcher = FetchCoordinator::new(
            Arc::clone(&backend),
            cache,
            config.cell_fetch_max_attempts,
        );
        Ok(Arc::new(Self {
            grid: config.grid(),
            config,
            backend,
            fetcher,
            reconciler: Mutex::new(RenderReconciler::new()),
            selection: Mutex::new(SelectionState::new()),
            guard: SettleGuard::new(),
            map,
            panel,
            locator,
            startup: plan,
        }))
    }

    pub fn startup_plan(&self) -> &StartupPlan {
        &self.startup
    }

    pub fn cache(&self) -> &Arc<CellCache> {
        self.fetcher.cache()
    }

    pub fn fetches_issued(&self) -> u64 {
        self.fetcher.fetches_issued()
    }

    pub fn guard(&self) -> &SettleGuard {
        &self.guard
    }

    pub fn displayed_ids(&self) -> Vec<PlaceId> {
        self.reconciler.lock().displayed_ids().to_vec()
    }

    pub fn active_selection(&self) -> Option<PlaceId> {
        self.selection.lock().active().cloned()
    }

    /// Consumes events until the sender side closes, handling each on its own
    /// task so a settle that arrives mid-pass is seen (and dropped) right away.
    pub async fn run(self: Arc<Self>, mut events: UnboundedReceiver<MapEvent>) {
        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        let this = Arc::clone(&self);
                        tasks.spawn(async move { this.dispatch(event).await });
                    }
                    None => break,
                },
                Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(err) = result {
                        warn!(?err, "map event task aborted");
                    }
                }
            }
        }
        while let Some(result) = tasks.join_next().await {
            if let Err(err) = result {
                warn!(?err, "map event task aborted");
            }
        }
        debug!("map event stream closed");
    }

    pub async fn handle_event(&self, event: MapEvent) -> AppResult<()> {
        match event {
            MapEvent::Settled => {
                self.on_settle().await;
            }
            MapEvent::MarkerClicked(place_id) => self.select(&place_id, false).await?,
            MapEvent::ListEntryClicked(place_id) => self.select(&place_id, true).await?,
            MapEvent::CenterOnUser => {
                self.center_on_user().await?;
            }
        }
        Ok(())
    }

    async fn dispatch(&self, event: MapEvent) {
        let label = format!("{event:?}");
        if let Err(err) = self.handle_event(event).await {
            warn!(?err, event = %label, "map event failed");
        }
    }

    pub async fn on_settle(&self) -> SettleOutcome {
        let _pass = match self.guard.admit() {
            Admission::Suppressed => {
                debug!("settle after programmatic move; skipping reload");
                return SettleOutcome::Suppressed;
            }
            Admission::Busy => {
                debug!("settle during an active pass; dropped");
                return SettleOutcome::Dropped;
            }
            Admission::Pass(token) => token,
        };

        let Some(bounds) = self.map.bounds() else {
            return SettleOutcome::NoViewport;
        };
        let visible = self.grid.cells_intersecting(&bounds);
        let fetch = self.fetcher.ensure_loaded(&visible).await;

        let (render, selection_kept) = {
            let mut reconciler = self.reconciler.lock();
            let render = reconciler.render(
                &visible,
                self.fetcher.cache(),
                self.map.as_ref(),
                self.panel.as_ref(),
            );
            let kept = self
                .selection
                .lock()
                .reapply(&reconciler, self.panel.as_ref());
            (render, kept)
        };
        debug!(
            cells = visible.len(),
            fetched = fetch.fetched,
            displayed = render.displayed,
            "viewport pass complete"
        );

        SettleOutcome::Rendered(PassReport {
            visible,
            fetch,
            render,
            selection_kept,
        })
    }

    /// Focuses a displayed spot: moves the map to it, opens its popup and makes
    /// it the active selection. `zoom_in` is set for selections from the list.
    pub async fn select(&self, place_id: &PlaceId, zoom_in: bool) -> AppResult<()> {
        let spot = self
            .reconciler
            .lock()
            .get(place_id)
            .map(|displayed| displayed.spot.clone())
            .ok_or_else(|| AppError::UnknownSpot(place_id.clone()))?;
        let position = spot
            .position()
            .ok_or_else(|| AppError::UnknownSpot(place_id.clone()))?;

        let layout = self.panel.layout();
        let mut panel_changed = false;
        if zoom_in {
            if layout.small_viewport && layout.panel_visible {
                self.panel.set_visible(false);
                panel_changed = true;
            }
        } else if !layout.small_viewport && layout.detail_mode && !layout.panel_visible {
            self.panel.set_visible(true);
            panel_changed = true;
        }
        if panel_changed {
            sleep(self.config.panel_transition_delay()).await;
        }

        let communities = match self.backend.communities_for(place_id).await {
            Ok(communities) => communities,
            Err(err) => {
                warn!(?err, place_id = %place_id, "community lookup failed");
                Vec::new()
            }
        };

        // a pass may have redrawn while the lookup was pending
        let displayed = self.reconciler.lock();
        if !displayed.contains(place_id) {
            debug!(place_id = %place_id, "spot left the display before it could be focused");
            return Err(AppError::UnknownSpot(place_id.clone()));
        }
        self.guard.arm_programmatic_move();
        self.map.pan_to(position);
        if zoom_in {
            self.map.set_zoom(self.config.selection_zoom);
        }
        self.map.open_popup(
            place_id,
            &PopupContent {
                card: SpotCard::from_spot(&spot),
                website: spot.website.clone(),
                phone_number: spot.phone_number.clone(),
                communities,
            },
        );
        self.selection.lock().activate(place_id, self.panel.as_ref());
        Ok(())
    }

    /// Recenters on the user's current position and refreshes the location marker.
    pub async fn center_on_user(&self) -> AppResult<LatLng> {
        let position =
            startup::locate_with_timeout(self.locator.as_ref(), self.config.geolocation_timeout())
                .await
                .ok_or(AppError::LocationUnavailable)?;
        self.map.show_user_location(position);
        self.guard.arm_programmatic_move();
        self.map.pan_to(position);
        self.map.set_zoom(self.config.selection_zoom);
        Ok(position)
    }
}
