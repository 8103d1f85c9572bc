use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::trace;

use crate::cache::CellCache;
use crate::grid::GridCellId;
use crate::map::{MapWidget, MarkerSpec, SpotCard, SpotListPanel};
use crate::spots::{PlaceId, Spot};

#[derive(Debug, Clone)]
pub struct DisplayedSpot {
    pub spot: Spot,
    pub cell: GridCellId,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RenderSummary {
    pub cells: usize,
    pub displayed: usize,
    pub duplicates: usize,
    pub invalid: usize,
}

/// Owns the markers and list entries currently on screen.
///
/// Every pass replaces the whole set: the previous representations are removed
/// before the visible cells are drawn again from the cache.
#[derive(Default)]
pub struct RenderReconciler {
    displayed: HashMap<PlaceId, DisplayedSpot>,
    order: Vec<PlaceId>,
}

impl RenderReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draws the spots of `visible`. Cells missing from the cache contribute nothing.
    pub fn render(
        &mut self,
        visible: &BTreeSet<GridCellId>,
        cache: &CellCache,
        map: &dyn MapWidget,
        panel: &dyn SpotListPanel,
    ) -> RenderSummary {
        self.clear(map, panel);

        let mut summary = RenderSummary {
            cells: visible.len(),
            ..RenderSummary::default()
        };
        for cell in visible {
            let Some(record) = cache.get(cell) else {
                trace!(cell = %cell, "visible cell not cached; skipping");
                continue;
            };
            for spot in record.spots() {
                if self.displayed.contains_key(&spot.place_id) {
                    summary.duplicates += 1;
                    continue;
                }
                let Some(position) = spot.position() else {
                    summary.invalid += 1;
                    continue;
                };

                map.place_marker(&MarkerSpec {
                    place_id: spot.place_id.clone(),
                    position,
                    title: spot.name.clone(),
                });
                panel.append(&SpotCard::from_spot(spot));
                self.order.push(spot.place_id.clone());
                self.displayed.insert(
                    spot.place_id.clone(),
                    DisplayedSpot {
                        spot: spot.clone(),
                        cell: *cell,
                    },
                );
            }
        }

        summary.displayed = self.order.len();
        panel.set_empty_state(summary.displayed == 0);
        summary
    }

    pub fn clear(&mut self, map: &dyn MapWidget, panel: &dyn SpotListPanel) {
        // a popup cannot outlive the marker it is anchored to
        if !self.order.is_empty() {
            map.close_popup();
        }
        for place_id in self.order.drain(..) {
            map.remove_marker(&place_id);
        }
        self.displayed.clear();
        panel.clear();
    }

    pub fn get(&self, place_id: &str) -> Option<&DisplayedSpot> {
        self.displayed.get(place_id)
    }

    pub fn contains(&self, place_id: &str) -> bool {
        self.displayed.contains_key(place_id)
    }

    /// Place ids in display order.
    pub fn displayed_ids(&self) -> &[PlaceId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
