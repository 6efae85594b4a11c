use std::fmt;
use std::io::Write;

use geocoin_engine::LatLng;
use tracing::warn;

use super::gameplay::{Cache, CacheMarker, Coin, GameObserver};

/// Renders game notifications as transcript lines.
pub(crate) struct TextObserver<W: Write> {
    out: W,
}

impl<W: Write> TextObserver<W> {
    pub(crate) fn new(out: W) -> Self {
        Self { out }
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        if let Err(error) = writeln!(self.out, "{args}") {
            warn!(error = %error, "transcript_write_failed");
        }
    }
}

pub(crate) fn coin_list(coins: &[Coin]) -> String {
    if coins.is_empty() {
        return "(none)".to_string();
    }
    coins
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl<W: Write> GameObserver for TextObserver<W> {
    fn cache_spawned(&mut self, marker: &CacheMarker, cache: &Cache) {
        self.line(format_args!(
            "+ cache {} appears at {} ({} coins)",
            marker.cell,
            marker.bounds.south_west,
            cache.coin_count()
        ));
    }

    fn cache_despawned(&mut self, marker: &CacheMarker) {
        self.line(format_args!("- cache {} out of view", marker.cell));
    }

    fn cache_changed(&mut self, cache: &Cache) {
        self.line(format_args!(
            "cache {} now holds: {}",
            cache.cell,
            coin_list(&cache.coins)
        ));
    }

    fn inventory_changed(&mut self, inventory: &[Coin]) {
        self.line(format_args!(
            "inventory ({}): {}",
            inventory.len(),
            coin_list(inventory)
        ));
    }

    fn player_moved(&mut self, location: LatLng, history: &[LatLng]) {
        self.line(format_args!(
            "player at {location} ({} points travelled)",
            history.len()
        ));
    }

    fn game_reset(&mut self) {
        self.line(format_args!("all progress erased"));
    }
}
