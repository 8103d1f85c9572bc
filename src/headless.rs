//! In-memory collaborators that record what the controller asks of them.
//!
//! Used by the probe binary (no real map to draw on) and by tests.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::geo::{Bounds, LatLng};
use crate::map::{
    Geolocator, MapOptions, MapWidget, MarkerSpec, PanelLayout, PopupContent, SpotCard,
    SpotListPanel,
};
use crate::spots::PlaceId;

#[derive(Default)]
struct MapState {
    options: Option<MapOptions>,
    viewport: Option<Bounds>,
    markers: Vec<MarkerSpec>,
    pans: Vec<LatLng>,
    zoom: Option<u8>,
    popup: Option<(PlaceId, PopupContent)>,
    user_location: Option<LatLng>,
}

#[derive(Default)]
pub struct HeadlessMap {
    state: Mutex<MapState>,
}

impl HeadlessMap {
    pub fn from_options(options: &MapOptions) -> Self {
        let map = Self::default();
        {
            let mut state = map.state.lock();
            state.zoom = Some(options.zoom);
            state.options = Some(options.clone());
        }
        map
    }

    /// Moves the visible rectangle, as a user pan or zoom would.
    pub fn set_viewport(&self, bounds: Bounds) {
        self.state.lock().viewport = Some(bounds);
    }

    pub fn options(&self) -> Option<MapOptions> {
        self.state.lock().options.clone()
    }

    pub fn marker_ids(&self) -> Vec<PlaceId> {
        self.state
            .lock()
            .markers
            .iter()
            .map(|marker| marker.place_id.clone())
            .collect()
    }

    pub fn markers(&self) -> Vec<MarkerSpec> {
        self.state.lock().markers.clone()
    }

    pub fn pans(&self) -> Vec<LatLng> {
        self.state.lock().pans.clone()
    }

    pub fn zoom(&self) -> Option<u8> {
        self.state.lock().zoom
    }

    pub fn popup(&self) -> Option<(PlaceId, PopupContent)> {
        self.state.lock().popup.clone()
    }

    pub fn user_location(&self) -> Option<LatLng> {
        self.state.lock().user_location
    }
}

impl MapWidget for HeadlessMap {
    fn bounds(&self) -> Option<Bounds> {
        self.state.lock().viewport
    }

    fn pan_to(&self, position: LatLng) {
        self.state.lock().pans.push(position);
    }

    fn set_zoom(&self, zoom: u8) {
        self.state.lock().zoom = Some(zoom);
    }

    fn place_marker(&self, marker: &MarkerSpec) {
        self.state.lock().markers.push(marker.clone());
    }

    fn remove_marker(&self, place_id: &PlaceId) {
        self.state
            .lock()
            .markers
            .retain(|marker| &marker.place_id != place_id);
    }

    fn open_popup(&self, anchor: &PlaceId, content: &PopupContent) {
        self.state.lock().popup = Some((anchor.clone(), content.clone()));
    }

    fn close_popup(&self) {
        self.state.lock().popup = None;
    }

    fn show_user_location(&self, position: LatLng) {
        self.state.lock().user_location = Some(position);
    }
}

#[derive(Default)]
struct PanelState {
    entries: Vec<SpotCard>,
    highlighted: BTreeSet<PlaceId>,
    scrolled: Vec<PlaceId>,
    empty_state: bool,
    layout: PanelLayout,
}

#[derive(Default)]
pub struct HeadlessPanel {
    state: Mutex<PanelState>,
}

impl HeadlessPanel {
    pub fn with_layout(layout: PanelLayout) -> Self {
        let panel = Self::default();
        panel.set_layout(layout);
        panel
    }

    pub fn set_layout(&self, layout: PanelLayout) {
        self.state.lock().layout = layout;
    }

    pub fn entry_ids(&self) -> Vec<PlaceId> {
        self.state
            .lock()
            .entries
            .iter()
            .map(|card| card.place_id.clone())
            .collect()
    }

    pub fn entries(&self) -> Vec<SpotCard> {
        self.state.lock().entries.clone()
    }

    pub fn highlighted(&self) -> Vec<PlaceId> {
        self.state.lock().highlighted.iter().cloned().collect()
    }

    pub fn scrolled(&self) -> Vec<PlaceId> {
        self.state.lock().scrolled.clone()
    }

    pub fn empty_state(&self) -> bool {
        self.state.lock().empty_state
    }
}

impl SpotListPanel for HeadlessPanel {
    fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        // highlights live on the entries, so they go with them
        state.highlighted.clear();
    }

    fn append(&self, card: &SpotCard) {
        self.state.lock().entries.push(card.clone());
    }

    fn set_empty_state(&self, empty: bool) {
        self.state.lock().empty_state = empty;
    }

    fn set_highlight(&self, place_id: &PlaceId, active: bool) {
        let mut state = self.state.lock();
        if !state.entries.iter().any(|card| &card.place_id == place_id) {
            return;
        }
        if active {
            state.highlighted.insert(place_id.clone());
        } else {
            state.highlighted.remove(place_id);
        }
    }

    fn scroll_into_view(&self, place_id: &PlaceId) {
        self.state.lock().scrolled.push(place_id.clone());
    }

    fn layout(&self) -> PanelLayout {
        self.state.lock().layout
    }

    fn set_visible(&self, visible: bool) {
        self.state.lock().layout.panel_visible = visible;
    }
}

/// Geolocator answering with a fixed position, optionally after a delay.
#[derive(Debug, Clone, Default)]
pub struct FixedLocator {
    position: Option<LatLng>,
    delay: Option<Duration>,
}

impl FixedLocator {
    pub fn new(position: Option<LatLng>) -> Self {
        Self {
            position,
            delay: None,
        }
    }

    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Geolocator for FixedLocator {
    async fn locate(&self) -> Option<LatLng> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.position
    }
}
