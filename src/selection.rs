use crate::map::SpotListPanel;
use crate::render::RenderReconciler;
use crate::spots::PlaceId;

/// The single highlighted spot shared by the markers and the list.
#[derive(Debug, Default)]
pub struct SelectionState {
    active: Option<PlaceId>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&PlaceId> {
        self.active.as_ref()
    }

    pub fn activate(&mut self, place_id: &PlaceId, panel: &dyn SpotListPanel) {
        if let Some(previous) = self.active.as_ref().filter(|prev| *prev != place_id) {
            panel.set_highlight(previous, false);
        }
        panel.set_highlight(place_id, true);
        if panel.layout().panel_visible {
            panel.scroll_into_view(place_id);
        }
        self.active = Some(place_id.clone());
    }

    /// Restores the highlight after a render pass. A selection whose spot is no
    /// longer displayed is dropped.
    pub fn reapply(&mut self, displayed: &RenderReconciler, panel: &dyn SpotListPanel) -> bool {
        match self.active.clone() {
            Some(place_id) if displayed.contains(&place_id) => {
                self.activate(&place_id, panel);
                true
            }
            Some(_) => {
                self.active = None;
                false
            }
            None => false,
        }
    }
}
