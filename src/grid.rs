use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};
use crate::geo::{Bounds, LatLng};

/// Row/column address of one grid cell, counted from the grid origin.
///
/// Rendered as `"{row}-{col}"`, which is also the key the spots API expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridCellId {
    pub row: u32,
    pub col: u32,
}

impl GridCellId {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for GridCellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.row, self.col)
    }
}

impl FromStr for GridCellId {
    type Err = AppError;

    fn from_str(value: &str) -> AppResult<Self> {
        let (row, col) = value
            .split_once('-')
            .ok_or_else(|| AppError::InvalidCell(value.to_string()))?;
        let row = row
            .parse::<u32>()
            .map_err(|_| AppError::InvalidCell(value.to_string()))?;
        let col = col
            .parse::<u32>()
            .map_err(|_| AppError::InvalidCell(value.to_string()))?;
        Ok(Self { row, col })
    }
}

/// Fixed square tiling anchored at a south-west origin.
///
/// The origin has to sit south-west of the whole service area; points beyond it
/// have no cell. Degrees are treated as flat (equirectangular), which is fine at
/// metropolitan scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridSpec {
    pub origin: LatLng,
    pub cell_size_deg: f64,
}

impl GridSpec {
    pub fn new(origin: LatLng, cell_size_deg: f64) -> Self {
        Self {
            origin,
            cell_size_deg,
        }
    }

    pub fn cell_for(&self, point: LatLng) -> Option<GridCellId> {
        if point.lat < self.origin.lat || point.lng < self.origin.lng {
            return None;
        }
        let row = u32::try_from(self.row_index(point.lat)).ok()?;
        let col = u32::try_from(self.col_index(point.lng)).ok()?;
        Some(GridCellId { row, col })
    }

    /// Every cell whose extent touches `bounds`, corners inclusive.
    pub fn cells_intersecting(&self, bounds: &Bounds) -> BTreeSet<GridCellId> {
        const LAST: i64 = u32::MAX as i64;
        let start_row = self.row_index(bounds.south).max(0);
        let end_row = self.row_index(bounds.north).min(LAST);
        let start_col = self.col_index(bounds.west).max(0);
        let end_col = self.col_index(bounds.east).min(LAST);

        let mut cells = BTreeSet::new();
        for row in start_row..=end_row {
            for col in start_col..=end_col {
                if let (Ok(row), Ok(col)) = (u32::try_from(row), u32::try_from(col)) {
                    cells.insert(GridCellId { row, col });
                }
            }
        }
        cells
    }

    pub fn cell_bounds(&self, id: GridCellId) -> Bounds {
        let south = self.origin.lat + f64::from(id.row) * self.cell_size_deg;
        let west = self.origin.lng + f64::from(id.col) * self.cell_size_deg;
        Bounds {
            north: south + self.cell_size_deg,
            south,
            east: west + self.cell_size_deg,
            west,
        }
    }

    fn row_index(&self, lat: f64) -> i64 {
        ((lat - self.origin.lat) / self.cell_size_deg).floor() as i64
    }

    fn col_index(&self, lng: f64) -> i64 {
        ((lng - self.origin.lng) / self.cell_size_deg).floor() as i64
    }
}
