use geocoin_engine::LatLng;

use super::cache::{Cache, Coin};
use super::registry::CacheMarker;

/// State-change notifications for whatever renders the game.
///
/// The core never draws anything itself; every method defaults to a no-op so
/// a front-end only implements what it displays.
pub(crate) trait GameObserver {
    fn cache_spawned(&mut self, _marker: &CacheMarker, _cache: &Cache) {}
    fn cache_despawned(&mut self, _marker: &CacheMarker) {}
    fn cache_changed(&mut self, _cache: &Cache) {}
    fn inventory_changed(&mut self, _inventory: &[Coin]) {}
    fn player_moved(&mut self, _location: LatLng, _history: &[LatLng]) {}
    fn game_reset(&mut self) {}
}

#[derive(Debug, Default)]
pub(crate) struct NullObserver;

impl GameObserver for NullObserver {}
