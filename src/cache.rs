use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::grid::GridCellId;
use crate::spots::CellRecord;

/// Session-lifetime store of fetched cells. Grows only; a cell is written once.
#[derive(Default)]
pub struct CellCache {
    records: Mutex<HashMap<GridCellId, Arc<CellRecord>>>,
}

impl CellCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, id: &GridCellId) -> bool {
        self.records.lock().contains_key(id)
    }

    pub fn get(&self, id: &GridCellId) -> Option<Arc<CellRecord>> {
        self.records.lock().get(id).cloned()
    }

    /// Stores `record` unless the cell is already present. Returns whether it was stored.
    pub fn put(&self, id: GridCellId, record: CellRecord) -> bool {
        let mut records = self.records.lock();
        if records.contains_key(&id) {
            return false;
        }
        records.insert(id, Arc::new(record));
        true
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}
