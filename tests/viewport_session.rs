use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Semaphore};

use spotgrid::headless::{FixedLocator, HeadlessMap, HeadlessPanel};
use spotgrid::{
    AppConfig, AppResult, Bounds, CommunityListing, GridCellId, LatLng, MapEvent, MapWidget,
    PlaceId, SettleOutcome, Spot, SpotBackend, ViewportController,
};

/// Cells are 1 degree wide from the origin, so row/col match the integer degrees.
fn unit_config() -> AppConfig {
    AppConfig {
        grid_origin: LatLng::new(0.0, 0.0),
        grid_cell_size_deg: 1.0,
        default_center: LatLng::new(1.5, 1.5),
        panel_transition_delay_ms: 1,
        geolocation_timeout_ms: 50,
        ..AppConfig::default()
    }
}

/// Serves a fixed spot table per cell. Cell requests wait on `gate` when one is set.
#[derive(Default)]
struct TableBackend {
    cells: HashMap<GridCellId, Vec<Spot>>,
    gate: Option<Arc<Semaphore>>,
    started: AtomicUsize,
    calls: Mutex<HashMap<GridCellId, usize>>,
    boundary: Option<Bounds>,
}

impl TableBackend {
    fn with_cell(mut self, cell: &str, spots: Vec<Spot>) -> Self {
        self.cells.insert(cell.parse().unwrap(), spots);
        self
    }

    fn calls_for(&self, cell: &str) -> usize {
        let id: GridCellId = cell.parse().unwrap();
        self.calls.lock().get(&id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl SpotBackend for TableBackend {
    async fn fetch_cell(&self, id: GridCellId) -> AppResult<Vec<Spot>> {
        *self.calls.lock().entry(id).or_default() += 1;
        self.started.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        Ok(self.cells.get(&id).cloned().unwrap_or_default())
    }

    async fn fetch_boundary(&self) -> AppResult<Option<Bounds>> {
        Ok(self.boundary)
    }

    async fn communities_for(&self, _place_id: &PlaceId) -> AppResult<Vec<CommunityListing>> {
        Ok(Vec::new())
    }
}

async fn start(
    backend: Arc<TableBackend>,
    locator: FixedLocator,
) -> (Arc<ViewportController>, Arc<HeadlessMap>, Arc<HeadlessPanel>) {
    let map_slot: Arc<Mutex<Option<Arc<HeadlessMap>>>> = Arc::default();
    let slot = Arc::clone(&map_slot);
    let panel = Arc::new(HeadlessPanel::default());
    let controller = ViewportController::start(
        unit_config(),
        backend,
        Arc::new(locator),
        panel.clone(),
        move |options, _key| {
            let map = Arc::new(HeadlessMap::from_options(options));
            *slot.lock() = Some(Arc::clone(&map));
            Ok(map as Arc<dyn MapWidget>)
        },
    )
    .await
    .unwrap();
    let map = map_slot.lock().clone().unwrap();
    (controller, map, panel)
}

#[tokio::test]
async fn renders_visible_cells_and_reuses_cache() {
    let backend = Arc::new(
        TableBackend::default()
            .with_cell("0-0", vec![Spot::new("a", "Alpha Gym", 0.5, 0.5)])
            .with_cell("1-0", vec![Spot::new("b", "Bravo Park", 1.5, 0.5)]),
    );
    let (controller, map, panel) = start(Arc::clone(&backend), FixedLocator::unavailable()).await;

    map.set_viewport(Bounds::new(2.5, 0.2, 0.8, 0.1));
    let SettleOutcome::Rendered(report) = controller.on_settle().await else {
        panic!("expected a render pass");
    };
    let visible: Vec<String> = report.visible.iter().map(ToString::to_string).collect();
    assert_eq!(visible, vec!["0-0", "1-0", "2-0"]);
    assert_eq!(report.fetch.fetched, 3);
    assert_eq!(report.render.displayed, 2);
    assert_eq!(map.marker_ids(), vec!["a".to_string(), "b".to_string()]);
    assert_eq!(panel.entry_ids(), map.marker_ids());
    assert!(!panel.empty_state());

    map.set_viewport(Bounds::new(0.9, 0.1, 0.9, 0.1));
    let SettleOutcome::Rendered(report) = controller.on_settle().await else {
        panic!("expected a render pass");
    };
    assert_eq!(report.fetch.already_cached, 1);
    assert_eq!(map.marker_ids(), vec!["a".to_string()]);
    assert_eq!(controller.fetches_issued(), 3);
    assert_eq!(backend.calls_for("0-0"), 1);
}

#[tokio::test]
async fn settle_during_a_pass_is_dropped() {
    let gate = Arc::new(Semaphore::new(0));
    let backend = Arc::new(TableBackend {
        gate: Some(Arc::clone(&gate)),
        ..TableBackend::default()
            .with_cell("0-0", vec![Spot::new("a", "Alpha Gym", 0.5, 0.5)])
            .with_cell("0-1", vec![Spot::new("c", "Charlie Court", 0.5, 1.5)])
    });
    let (controller, map, _panel) = start(Arc::clone(&backend), FixedLocator::unavailable()).await;

    map.set_viewport(Bounds::new(0.9, 0.1, 0.9, 0.1));
    let first = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.on_settle().await }
    });
    while backend.started.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
    assert!(controller.guard().is_busy());

    map.set_viewport(Bounds::new(0.9, 0.1, 1.9, 0.1));
    assert_eq!(controller.on_settle().await, SettleOutcome::Dropped);
    assert_eq!(backend.calls_for("0-1"), 0);

    gate.add_permits(1);
    let SettleOutcome::Rendered(report) = first.await.unwrap() else {
        panic!("first pass should finish");
    };
    assert_eq!(report.visible.len(), 1);
    assert!(!controller.guard().is_busy());
    // the viewport moved while the pass ran; markers reflect the older rectangle
    assert_eq!(map.marker_ids(), vec!["a".to_string()]);

    gate.add_permits(1);
    let SettleOutcome::Rendered(report) = controller.on_settle().await else {
        panic!("next settle should render");
    };
    assert_eq!(report.fetch.already_cached, 1);
    assert_eq!(report.fetch.fetched, 1);
    assert_eq!(map.marker_ids(), vec!["a".to_string(), "c".to_string()]);
}

#[tokio::test]
async fn event_loop_handles_selection_and_recentering() {
    let backend = Arc::new(
        TableBackend {
            boundary: Some(Bounds::new(3.0, 0.0, 3.0, 0.0)),
            ..TableBackend::default()
        }
        .with_cell("1-1", vec![Spot::new("gym", "Central Gym", 1.5, 1.5)]),
    );
    let user = LatLng::new(1.2, 1.3);
    let (controller, map, panel) = start(backend, FixedLocator::new(Some(user))).await;

    let options = map.options().unwrap();
    assert_eq!(options.center, user);
    assert_eq!(options.zoom, 16);
    assert!(options.restriction.unwrap().north > 3.0);
    assert_eq!(map.user_location(), Some(user));

    map.set_viewport(Bounds::new(1.9, 1.1, 1.9, 1.1));
    let (events, receiver) = mpsc::unbounded_channel();
    let session = tokio::spawn(Arc::clone(&controller).run(receiver));

    events.send(MapEvent::Settled).unwrap();
    while controller.displayed_ids().is_empty() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    events
        .send(MapEvent::ListEntryClicked("gym".to_string()))
        .unwrap();
    while controller.active_selection().is_none() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    events
        .send(MapEvent::MarkerClicked("not-rendered".to_string()))
        .unwrap();
    drop(events);
    session.await.unwrap();

    assert_eq!(controller.active_selection(), Some("gym".to_string()));
    assert_eq!(panel.highlighted(), vec!["gym".to_string()]);
    assert_eq!(map.pans().last().copied(), Some(LatLng::new(1.5, 1.5)));
    assert!(controller.guard().programmatic_move_armed());

    let position = controller.center_on_user().await.unwrap();
    assert_eq!(position, user);
    assert_eq!(map.pans().last().copied(), Some(user));
}
