use std::collections::HashSet;

use geocoin_engine::{cell_seed, luck, Cell, CellKey, Direction, Grid, KeyValueStore, LatLng};
use tracing::{debug, info, warn};

use super::cache::{Cache, Coin};
use super::config::GameConfig;
use super::observer::{GameObserver, NullObserver};
use super::persistence::{self, CACHES_KEY, INVENTORY_KEY, PLAYER_LOCATION_KEY};
use super::registry::{CacheMarker, CacheRegistry, MarkerRegistry};

/// Owned game state: registries, player and the store they persist to.
pub(crate) struct Game {
    config: GameConfig,
    grid: Grid,
    store: Box<dyn KeyValueStore>,
    caches: CacheRegistry,
    markers: MarkerRegistry,
    location: LatLng,
    inventory: Vec<Coin>,
    history: Vec<LatLng>,
    observer: Box<dyn GameObserver>,
}

impl Game {
    pub(crate) fn new(config: GameConfig, store: Box<dyn KeyValueStore>) -> Self {
        Self {
            grid: config.grid(),
            location: config.home,
            history: vec![config.home],
            config,
            store,
            caches: CacheRegistry::default(),
            markers: MarkerRegistry::default(),
            inventory: Vec::new(),
            observer: Box::new(NullObserver),
        }
    }

    pub(crate) fn with_observer(mut self, observer: Box<dyn GameObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Drops in-memory state, restores caches, inventory and movement
    /// history (in that order) from the store, then settles the view.
    pub(crate) fn init(&mut self) {
        self.despawn_all();
        self.caches.clear();
        self.inventory.clear();
        self.location = self.config.home;
        self.history = vec![self.config.home];

        self.caches = persistence::load_caches(&*self.store);
        self.inventory = persistence::load_inventory(&*self.store);
        let history = persistence::load_history(&*self.store);
        if let Some(last) = history.last().copied() {
            self.location = last;
            self.history = history;
        }

        info!(
            caches = self.caches.len(),
            inventory = self.inventory.len(),
            history = self.history.len(),
            location = %self.location,
            "game_restored"
        );
        self.observer.inventory_changed(&self.inventory);
        self.observer.player_moved(self.location, &self.history);
        self.settle();
    }

    pub(crate) fn move_player(&mut self, location: LatLng) {
        if !location.is_on_map() {
            warn!(lat = location.lat, lng = location.lng, "move_rejected_off_map");
            return;
        }
        self.location = location;
        self.history.push(location);
        self.persist_history();
        debug!(location = %location, history = self.history.len(), "player_moved");
        self.observer.player_moved(self.location, &self.history);
        self.settle();
    }

    pub(crate) fn step(&mut self, direction: Direction) {
        let next = self.grid.step(self.location, direction);
        self.move_player(next);
    }

    pub(crate) fn visible_cells(&self, location: LatLng) -> Vec<Cell> {
        self.grid.neighborhood(location, self.config.neighborhood_size)
    }

    /// Despawns markers that left the neighborhood, spawns eligible cells
    /// that entered it and persists the registry once.
    pub(crate) fn settle(&mut self) {
        let visible = self.visible_cells(self.location);
        let visible_set = visible.iter().copied().collect::<HashSet<_>>();

        let mut despawned = 0usize;
        for marker in self.markers.markers() {
            if !visible_set.contains(&marker.cell) && self.despawn_cache(marker.cell) {
                despawned += 1;
            }
        }

        let mut spawned = 0usize;
        for cell in visible {
            if self.markers.contains(&cell.key()) {
                continue;
            }
            if self.spawn_roll(cell) < self.config.cache_spawn_probability
                && self.install_cache(cell).0
            {
                spawned += 1;
            }
        }

        self.persist_caches();
        debug!(
            visible = visible_set.len(),
            spawned,
            despawned,
            markers = self.markers.len(),
            registry = self.caches.len(),
            "caches_settled"
        );
    }

    /// Idempotent: returns `false` when the cell already has a marker.
    pub(crate) fn spawn_cache(&mut self, cell: Cell) -> bool {
        let (installed, created) = self.install_cache(cell);
        if created {
            self.persist_caches();
        }
        installed
    }

    pub(crate) fn despawn_cache(&mut self, cell: Cell) -> bool {
        self.despawn_key(&cell.key())
    }

    /// Spawns the coin's home cache regardless of the spawn roll and
    /// returns its cell so the front-end can center on it.
    pub(crate) fn focus_coin_home(&mut self, coin: &Coin) -> Cell {
        self.spawn_cache(coin.cell);
        coin.cell
    }

    pub(crate) fn collect(&mut self, coin: &Coin, cell: Cell) -> bool {
        let key = cell.key();
        let Some(mut cache) = self.decode_cache(&key) else {
            debug!(cell = %key, coin = %coin, "collect_skipped_no_cache");
            return false;
        };
        let Some(taken) = cache.take(coin) else {
            debug!(cell = %key, coin = %coin, "collect_skipped_absent_coin");
            return false;
        };

        self.inventory.push(taken);
        self.caches.set(key.clone(), cache.to_memento());
        self.persist_caches();
        self.persist_inventory();
        info!(
            cell = %key,
            coin = %taken,
            inventory = self.inventory.len(),
            "coin_collected"
        );
        self.observer.cache_changed(&cache);
        self.observer.inventory_changed(&self.inventory);
        true
    }

    /// Moves the whole inventory into the cache, last collected first.
    pub(crate) fn deposit(&mut self, cell: Cell) -> usize {
        if self.inventory.is_empty() {
            debug!(cell = %cell, "deposit_skipped_empty_inventory");
            return 0;
        }
        let key = cell.key();
        let Some(mut cache) = self.decode_cache(&key) else {
            debug!(cell = %key, "deposit_skipped_no_cache");
            return 0;
        };

        let mut moved = 0usize;
        while let Some(coin) = self.inventory.pop() {
            cache.put(coin);
            moved += 1;
        }

        self.caches.set(key.clone(), cache.to_memento());
        self.persist_caches();
        self.persist_inventory();
        info!(cell = %key, moved, cache_coins = cache.coin_count(), "coins_deposited");
        self.observer.cache_changed(&cache);
        self.observer.inventory_changed(&self.inventory);
        moved
    }

    /// Clears registries, inventory, history and all persisted records when
    /// `confirm` agrees. Caches come back on the next movement or `init`.
    pub(crate) fn reset(&mut self, confirm: impl FnOnce() -> bool) -> bool {
        if !confirm() {
            info!("reset_declined");
            return false;
        }

        self.despawn_all();
        self.caches.clear();
        self.inventory.clear();
        self.location = self.config.home;
        self.history = vec![self.config.home];
        if let Err(error) = persistence::clear_all(&mut *self.store) {
            warn!(error = %error, "persist_clear_failed");
        }

        info!(home = %self.config.home, "game_reset");
        self.observer.game_reset();
        self.observer.inventory_changed(&self.inventory);
        self.observer.player_moved(self.location, &self.history);
        true
    }

    pub(crate) fn cache(&self, cell: Cell) -> Option<Cache> {
        self.decode_cache(&cell.key())
    }

    /// Coins across every registered cache plus the inventory.
    pub(crate) fn coin_total(&self) -> usize {
        let in_caches = self
            .caches
            .entries()
            .iter()
            .filter_map(|(key, _)| self.decode_cache(key))
            .map(|cache| cache.coin_count())
            .sum::<usize>();
        in_caches + self.inventory.len()
    }

    pub(crate) fn config(&self) -> &GameConfig {
        &self.config
    }

    pub(crate) fn grid(&self) -> Grid {
        self.grid
    }

    pub(crate) fn location(&self) -> LatLng {
        self.location
    }

    pub(crate) fn current_cell(&self) -> Cell {
        self.grid.cell_of(self.location)
    }

    pub(crate) fn history(&self) -> &[LatLng] {
        &self.history
    }

    pub(crate) fn inventory(&self) -> &[Coin] {
        &self.inventory
    }

    pub(crate) fn markers(&self) -> Vec<CacheMarker> {
        self.markers.markers()
    }

    pub(crate) fn has_marker(&self, cell: Cell) -> bool {
        self.markers.contains(&cell.key())
    }

    pub(crate) fn registry_len(&self) -> usize {
        self.caches.len()
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &dyn KeyValueStore {
        &*self.store
    }

    fn spawn_roll(&self, cell: Cell) -> f64 {
        luck(&cell_seed(cell, None))
    }

    /// Returns `(marker installed, registry entry created)`.
    fn install_cache(&mut self, cell: Cell) -> (bool, bool) {
        let key = cell.key();
        if self.markers.contains(&key) {
            return (false, false);
        }
        let (cache, created) = self.load_or_create(&key);
        let Some(marker) = self.markers.install(key, self.grid.bounds_of(cell)) else {
            return (false, created);
        };
        debug!(
            cell = %cell,
            marker = marker.id.0,
            coins = cache.coin_count(),
            created,
            "cache_spawned"
        );
        self.observer.cache_spawned(&marker, &cache);
        (true, created)
    }

    fn load_or_create(&mut self, key: &CellKey) -> (Cache, bool) {
        if let Some(memento) = self.caches.get(key) {
            match Cache::from_memento(memento, key.cell()) {
                Ok(cache) => return (cache, false),
                Err(error) => {
                    warn!(cell = %key, error = %error, "cache_memento_discarded");
                }
            }
        }
        let cache = Cache::generate(key.cell(), self.config.max_coins_per_cache);
        self.caches.set(key.clone(), cache.to_memento());
        (cache, true)
    }

    fn decode_cache(&self, key: &CellKey) -> Option<Cache> {
        let memento = self.caches.get(key)?;
        match Cache::from_memento(memento, key.cell()) {
            Ok(cache) => Some(cache),
            Err(error) => {
                warn!(cell = %key, error = %error, "cache_memento_unreadable");
                None
            }
        }
    }

    fn despawn_key(&mut self, key: &CellKey) -> bool {
        let Some(marker) = self.markers.remove(key) else {
            return false;
        };
        debug!(cell = %key, marker = marker.id.0, "cache_despawned");
        self.observer.cache_despawned(&marker);
        true
    }

    fn despawn_all(&mut self) {
        for marker in self.markers.drain() {
            self.observer.cache_despawned(&marker);
        }
    }

    fn persist_caches(&mut self) {
        if let Err(error) = persistence::save_caches(&mut *self.store, &self.caches) {
            warn!(record = CACHES_KEY, error = %error, "persist_failed");
        }
    }

    fn persist_inventory(&mut self) {
        if let Err(error) = persistence::save_inventory(&mut *self.store, &self.inventory) {
            warn!(record = INVENTORY_KEY, error = %error, "persist_failed");
        }
    }

    fn persist_history(&mut self) {
        if let Err(error) = persistence::save_history(&mut *self.store, &self.history) {
            warn!(record = PLAYER_LOCATION_KEY, error = %error, "persist_failed");
        }
    }
}
