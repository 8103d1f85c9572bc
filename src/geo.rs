use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Axis-aligned geographic rectangle in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl Bounds {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }

    pub fn from_corners(south_west: LatLng, north_east: LatLng) -> Self {
        Self {
            north: north_east.lat,
            south: south_west.lat,
            east: north_east.lng,
            west: south_west.lng,
        }
    }

    pub fn south_west(&self) -> LatLng {
        LatLng::new(self.south, self.west)
    }

    pub fn north_east(&self) -> LatLng {
        LatLng::new(self.north, self.east)
    }

    /// Grows the rectangle by `margin` degrees on every side.
    pub fn expanded(&self, margin: f64) -> Self {
        Self {
            north: self.north + margin,
            south: self.south - margin,
            east: self.east + margin,
            west: self.west - margin,
        }
    }

    /// Interior test; points on an edge are outside.
    pub fn strictly_contains(&self, point: LatLng) -> bool {
        point.lat < self.north
            && point.lat > self.south
            && point.lng < self.east
            && point.lng > self.west
    }
}
