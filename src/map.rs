use async_trait::async_trait;
use serde::Serialize;

use crate::geo::{Bounds, LatLng};
use crate::spots::{CommunityListing, PlaceId, Spot};

/// Events the host map and list UI feed back into the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    /// The viewport stopped changing, after a user or programmatic move.
    Settled,
    MarkerClicked(PlaceId),
    ListEntryClicked(PlaceId),
    CenterOnUser,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapOptions {
    pub center: LatLng,
    pub zoom: u8,
    /// Panning is clamped to this rectangle when present.
    pub restriction: Option<Bounds>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerSpec {
    pub place_id: PlaceId,
    pub position: LatLng,
    pub title: String,
}

/// List entry data for one spot. Markup is the panel's business.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpotCard {
    pub place_id: PlaceId,
    pub name: String,
    pub address: String,
    pub rating: Option<f64>,
    pub rating_count: Option<u64>,
}

impl SpotCard {
    pub fn from_spot(spot: &Spot) -> Self {
        Self {
            place_id: spot.place_id.clone(),
            name: spot.name.clone(),
            address: spot.address.clone(),
            rating: spot.rating_value(),
            rating_count: spot.rating_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopupContent {
    pub card: SpotCard,
    pub website: Option<String>,
    pub phone_number: Option<String>,
    pub communities: Vec<CommunityListing>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PanelLayout {
    pub small_viewport: bool,
    /// Full-screen map with the list as an overlay.
    pub detail_mode: bool,
    pub panel_visible: bool,
}

/// Map widget handle. Markers are addressed by place id, and clicks on them come
/// back as [`MapEvent::MarkerClicked`].
pub trait MapWidget: Send + Sync {
    fn bounds(&self) -> Option<Bounds>;
    fn pan_to(&self, position: LatLng);
    fn set_zoom(&self, zoom: u8);
    fn place_marker(&self, marker: &MarkerSpec);
    fn remove_marker(&self, place_id: &PlaceId);
    fn open_popup(&self, anchor: &PlaceId, content: &PopupContent);
    fn close_popup(&self);
    fn show_user_location(&self, position: LatLng);
}

/// Side panel listing the displayed spots. Entry clicks come back as
/// [`MapEvent::ListEntryClicked`].
pub trait SpotListPanel: Send + Sync {
    fn clear(&self);
    fn append(&self, card: &SpotCard);
    fn set_empty_state(&self, empty: bool);
    fn set_highlight(&self, place_id: &PlaceId, active: bool);
    fn scroll_into_view(&self, place_id: &PlaceId);
    fn layout(&self) -> PanelLayout;
    fn set_visible(&self, visible: bool);
}

#[async_trait]
pub trait Geolocator: Send + Sync {
    /// Current position, or `None` when denied or unavailable.
    async fn locate(&self) -> Option<LatLng>;
}
