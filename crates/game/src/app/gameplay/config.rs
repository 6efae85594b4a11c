use geocoin_engine::{Grid, LatLng};

pub(crate) const TILE_DEGREES: f64 = 1e-4;
pub(crate) const NEIGHBORHOOD_SIZE: u32 = 8;
pub(crate) const CACHE_SPAWN_PROBABILITY: f64 = 0.1;
pub(crate) const MAX_COINS_PER_CACHE: u32 = 3;
pub(crate) const HOME_LOCATION: LatLng = LatLng::new(36.98949379578401, -122.06277128548504);

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GameConfig {
    pub(crate) tile_degrees: f64,
    pub(crate) neighborhood_size: u32,
    pub(crate) cache_spawn_probability: f64,
    pub(crate) max_coins_per_cache: u32,
    pub(crate) home: LatLng,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tile_degrees: TILE_DEGREES,
            neighborhood_size: NEIGHBORHOOD_SIZE,
            cache_spawn_probability: CACHE_SPAWN_PROBABILITY,
            max_coins_per_cache: MAX_COINS_PER_CACHE,
            home: HOME_LOCATION,
        }
    }
}

impl GameConfig {
    pub(crate) fn grid(&self) -> Grid {
        Grid::new(self.tile_degrees)
    }
}
