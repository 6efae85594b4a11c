use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_LATITUDE: f64 = 90.0;
pub const MAX_LONGITUDE: f64 = 180.0;
/// Largest radius [`Grid::neighborhood`] honours; larger requests are clamped.
pub const MAX_NEIGHBORHOOD_RADIUS: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    /// Finite, with latitude within ±90 and longitude within ±180.
    pub fn is_on_map(&self) -> bool {
        self.is_finite() && self.lat.abs() <= MAX_LATITUDE && self.lng.abs() <= MAX_LONGITUDE
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub i: i32,
    pub j: i32,
}

impl Cell {
    pub const fn new(i: i32, j: i32) -> Self {
        Self { i, j }
    }

    pub fn key(self) -> CellKey {
        CellKey::of(self)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.i, self.j)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl GeoBounds {
    pub fn contains(&self, point: LatLng) -> bool {
        point.lat >= self.south_west.lat
            && point.lat < self.north_east.lat
            && point.lng >= self.south_west.lng
            && point.lng < self.north_east.lng
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub fn as_token(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::South => "south",
            Self::East => "east",
            Self::West => "west",
        }
    }

    fn unit_offset(self) -> (f64, f64) {
        match self {
            Self::North => (1.0, 0.0),
            Self::South => (-1.0, 0.0),
            Self::East => (0.0, 1.0),
            Self::West => (0.0, -1.0),
        }
    }
}

/// Canonical registry key for a [`Cell`].
///
/// The text form is `"i,j"` with plain decimal integers. Parsing accepts only
/// that exact form, so `CellKey::parse(key.as_str())` always yields the key
/// back and distinct cells never share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    cell: Cell,
    text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CellKeyError {
    #[error("cell key must not be empty")]
    Empty,
    #[error("cell key '{key}' must have exactly two comma-separated parts")]
    PartCount { key: String },
    #[error("cell key '{key}' has a non-canonical coordinate '{part}'")]
    NonCanonical { key: String, part: String },
}

impl CellKey {
    pub fn of(cell: Cell) -> Self {
        Self {
            cell,
            text: format!("{},{}", cell.i, cell.j),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, CellKeyError> {
        let cell = parse_cell(raw)?;
        Ok(Self::of(cell))
    }

    pub fn cell(&self) -> Cell {
        self.cell
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn parse_cell(raw: &str) -> Result<Cell, CellKeyError> {
    if raw.is_empty() {
        return Err(CellKeyError::Empty);
    }
    let parts = raw.split(',').collect::<Vec<_>>();
    if parts.len() != 2 {
        return Err(CellKeyError::PartCount {
            key: raw.to_string(),
        });
    }
    let i = parse_coordinate(raw, parts[0])?;
    let j = parse_coordinate(raw, parts[1])?;
    Ok(Cell { i, j })
}

fn parse_coordinate(key: &str, part: &str) -> Result<i32, CellKeyError> {
    let non_canonical = || CellKeyError::NonCanonical {
        key: key.to_string(),
        part: part.to_string(),
    };
    let value = part.parse::<i32>().map_err(|_| non_canonical())?;
    // Rejects "+1", "01", "-0" and anything else that would not print back identically.
    if value.to_string() != part {
        return Err(non_canonical());
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    tile_degrees: f64,
}

impl Grid {
    pub fn new(tile_degrees: f64) -> Self {
        Self { tile_degrees }
    }

    pub fn tile_degrees(&self) -> f64 {
        self.tile_degrees
    }

    pub fn cell_of(&self, point: LatLng) -> Cell {
        Cell {
            i: (point.lat / self.tile_degrees).floor() as i32,
            j: (point.lng / self.tile_degrees).floor() as i32,
        }
    }

    pub fn bounds_of(&self, cell: Cell) -> GeoBounds {
        let t = self.tile_degrees;
        GeoBounds {
            south_west: LatLng::new(f64::from(cell.i) * t, f64::from(cell.j) * t),
            north_east: LatLng::new(
                (f64::from(cell.i) + 1.0) * t,
                (f64::from(cell.j) + 1.0) * t,
            ),
        }
    }

    pub fn center_of(&self, cell: Cell) -> LatLng {
        let t = self.tile_degrees;
        LatLng::new(
            (f64::from(cell.i) + 0.5) * t,
            (f64::from(cell.j) + 0.5) * t,
        )
    }

    /// Square window of `(2 * radius)^2` cells around the cell containing
    /// `center`, offsets `-radius..radius` on both axes, row-major.
    ///
    /// `radius` is clamped to [`MAX_NEIGHBORHOOD_RADIUS`]; offsets that would
    /// leave the `i32` cell range are skipped.
    pub fn neighborhood(&self, center: LatLng, radius: u32) -> Vec<Cell> {
        let origin = self.cell_of(center);
        let radius = i32::try_from(radius.min(MAX_NEIGHBORHOOD_RADIUS)).unwrap_or_default();
        let side = usize::try_from(2 * radius).unwrap_or_default();
        let mut cells = Vec::with_capacity(side * side);
        for di in -radius..radius {
            let Some(i) = origin.i.checked_add(di) else {
                continue;
            };
            for dj in -radius..radius {
                if let Some(j) = origin.j.checked_add(dj) {
                    cells.push(Cell { i, j });
                }
            }
        }
        cells
    }

    pub fn step(&self, from: LatLng, direction: Direction) -> LatLng {
        let (d_lat, d_lng) = direction.unit_offset();
        LatLng::new(
            from.lat + d_lat * self.tile_degrees,
            from.lng + d_lng * self.tile_degrees,
        )
    }
}
