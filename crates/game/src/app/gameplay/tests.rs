use std::cell::RefCell;
use std::rc::Rc;

use geocoin_engine::{Cell, Direction, FileStore, KeyValueStore, LatLng, MemoryStore};
use serde_json::json;
use tempfile::TempDir;

use super::persistence::{CACHES_KEY, INVENTORY_KEY, PLAYER_LOCATION_KEY};
use super::*;

const ORIGIN: LatLng = LatLng::new(0.00005, 0.00005);

fn test_config() -> GameConfig {
    GameConfig {
        tile_degrees: 1e-4,
        neighborhood_size: 2,
        cache_spawn_probability: 1.0,
        max_coins_per_cache: 3,
        home: ORIGIN,
    }
}

fn started_game(config: GameConfig) -> Game {
    let mut game = Game::new(config, Box::new(MemoryStore::new()));
    game.init();
    game
}

fn coin(i: i32, j: i32, serial: u32) -> Coin {
    Coin {
        cell: Cell::new(i, j),
        serial,
    }
}

fn walk(game: &mut Game, direction: Direction, steps: usize) {
    for _ in 0..steps {
        game.step(direction);
    }
}

#[derive(Debug, Default)]
struct Recorded {
    spawned: Vec<Cell>,
    despawned: Vec<Cell>,
    changed: Vec<Cell>,
    inventory_sizes: Vec<usize>,
    moves: usize,
    resets: usize,
}

struct RecordingObserver(Rc<RefCell<Recorded>>);

impl GameObserver for RecordingObserver {
    fn cache_spawned(&mut self, marker: &CacheMarker, cache: &Cache) {
        assert_eq!(marker.cell, cache.cell);
        self.0.borrow_mut().spawned.push(marker.cell);
    }

    fn cache_despawned(&mut self, marker: &CacheMarker) {
        self.0.borrow_mut().despawned.push(marker.cell);
    }

    fn cache_changed(&mut self, cache: &Cache) {
        self.0.borrow_mut().changed.push(cache.cell);
    }

    fn inventory_changed(&mut self, inventory: &[Coin]) {
        self.0.borrow_mut().inventory_sizes.push(inventory.len());
    }

    fn player_moved(&mut self, _location: LatLng, _history: &[LatLng]) {
        self.0.borrow_mut().moves += 1;
    }

    fn game_reset(&mut self) {
        self.0.borrow_mut().resets += 1;
    }
}

#[test]
fn init_spawns_every_visible_cell_when_probability_is_one() {
    let game = started_game(test_config());

    assert_eq!(game.markers().len(), 16);
    assert_eq!(game.registry_len(), 16);
    assert_eq!(game.visible_cells(ORIGIN).len(), 16);
    for cell in game.visible_cells(ORIGIN) {
        assert!(game.has_marker(cell), "cell {cell}");
    }
    assert!(game.store().get(CACHES_KEY).expect("get").is_some());
}

#[test]
fn default_spawn_probability_around_origin_spawns_only_known_cell() {
    let config = GameConfig {
        cache_spawn_probability: 0.1,
        ..test_config()
    };
    let game = started_game(config);

    let cells = game
        .markers()
        .into_iter()
        .map(|marker| marker.cell)
        .collect::<Vec<_>>();
    assert_eq!(cells, vec![Cell::new(1, 1)]);
    assert_eq!(game.cache(Cell::new(1, 1)).expect("cache").coin_count(), 2);
}

#[test]
fn origin_cache_has_stable_coin_count() {
    let mut game = Game::new(test_config(), Box::new(MemoryStore::new()));
    assert!(game.spawn_cache(Cell::new(0, 0)));
    let cache = game.cache(Cell::new(0, 0)).expect("cache");
    assert_eq!(cache.coins, vec![coin(0, 0, 0)]);
}

#[test]
fn independent_games_generate_identical_content() {
    let first = started_game(test_config());
    let second = started_game(test_config());
    for cell in first.visible_cells(ORIGIN) {
        assert_eq!(first.cache(cell), second.cache(cell), "cell {cell}");
    }
}

#[test]
fn spawn_twice_keeps_one_marker_and_same_content() {
    let mut game = started_game(test_config());
    let cell = Cell::new(1, 1);
    let before = game.cache(cell).expect("cache");
    let marker_before = game
        .markers()
        .into_iter()
        .find(|marker| marker.cell == cell)
        .expect("marker");

    assert!(!game.spawn_cache(cell));
    assert!(!game.spawn_cache(cell));

    let matching = game
        .markers()
        .into_iter()
        .filter(|marker| marker.cell == cell)
        .collect::<Vec<_>>();
    assert_eq!(matching, vec![marker_before]);
    assert_eq!(game.cache(cell), Some(before));
}

#[test]
fn respawned_cache_is_missing_exactly_the_collected_coin() {
    let mut game = started_game(test_config());
    let cell = Cell::new(1, 1);
    assert!(game.collect(&coin(1, 1, 0), cell));

    walk(&mut game, Direction::East, 4);
    assert!(!game.has_marker(cell));
    assert!(game.registry_len() > 16);
    assert_eq!(game.cache(cell).expect("kept").coins, vec![coin(1, 1, 1)]);

    walk(&mut game, Direction::West, 4);
    assert!(game.has_marker(cell));
    assert_eq!(game.cache(cell).expect("respawned").coins, vec![coin(1, 1, 1)]);
    assert_eq!(game.inventory(), &[coin(1, 1, 0)]);
}

#[test]
fn moving_north_appends_exactly_one_history_point() {
    let mut game = started_game(test_config());
    let before = game.history().to_vec();
    assert_eq!(before, vec![ORIGIN]);

    game.step(Direction::North);

    let history = game.history();
    assert_eq!(history.len(), before.len() + 1);
    assert_eq!(history[0], before[0]);
    assert!((history[1].lat - (ORIGIN.lat + 1e-4)).abs() < 1e-12);
    assert_eq!(history[1].lng, ORIGIN.lng);
    assert_eq!(game.location(), history[1]);
    assert_eq!(game.current_cell(), Cell::new(1, 0));

    let saved: serde_json::Value = serde_json::from_str(
        &game
            .store()
            .get(PLAYER_LOCATION_KEY)
            .expect("get")
            .expect("saved"),
    )
    .expect("json");
    assert_eq!(saved.as_array().map(Vec::len), Some(2));
}

#[test]
fn reset_clears_inventory_registry_storage_and_returns_home() {
    let mut game = started_game(test_config());
    let cell = Cell::new(1, 1);
    assert!(game.collect(&coin(1, 1, 0), cell));
    assert!(game.collect(&coin(1, 1, 1), cell));
    game.step(Direction::South);
    assert_eq!(game.inventory().len(), 2);

    assert!(game.reset(|| true));

    assert!(game.inventory().is_empty());
    assert_eq!(game.registry_len(), 0);
    assert!(game.markers().is_empty());
    assert_eq!(game.location(), ORIGIN);
    assert_eq!(game.history(), &[ORIGIN]);
    for key in [CACHES_KEY, INVENTORY_KEY, PLAYER_LOCATION_KEY] {
        assert_eq!(game.store().get(key).expect("get"), None, "key={key}");
    }
}

#[test]
fn declined_reset_changes_nothing() {
    let mut game = started_game(test_config());
    assert!(game.collect(&coin(1, 1, 0), Cell::new(1, 1)));
    game.step(Direction::North);
    let markers = game.markers();
    let history = game.history().to_vec();

    assert!(!game.reset(|| false));

    assert_eq!(game.inventory(), &[coin(1, 1, 0)]);
    assert_eq!(game.markers(), markers);
    assert_eq!(game.history(), history.as_slice());
    assert!(game.store().get(INVENTORY_KEY).expect("get").is_some());
}

#[test]
fn deposit_with_empty_inventory_leaves_cache_unchanged() {
    let mut game = started_game(test_config());
    let cell = Cell::new(0, -2);
    let before = game.cache(cell).expect("cache");

    assert_eq!(game.deposit(cell), 0);

    assert_eq!(game.cache(cell), Some(before));
    assert!(game.inventory().is_empty());
}

#[test]
fn deposit_moves_whole_inventory_last_collected_first() {
    let mut game = started_game(test_config());
    assert!(game.collect(&coin(1, 1, 0), Cell::new(1, 1)));
    assert!(game.collect(&coin(0, -2, 2), Cell::new(0, -2)));

    assert_eq!(game.deposit(Cell::new(0, 0)), 2);

    assert!(game.inventory().is_empty());
    assert_eq!(
        game.cache(Cell::new(0, 0)).expect("cache").coins,
        vec![coin(0, 0, 0), coin(0, -2, 2), coin(1, 1, 0)]
    );
}

#[test]
fn collect_absent_or_stale_coin_is_a_no_op() {
    let mut game = started_game(test_config());
    let cell = Cell::new(1, 1);
    let before = game.cache(cell).expect("cache");

    assert!(!game.collect(&coin(1, 1, 9), cell));
    assert!(!game.collect(&coin(0, -2, 0), cell));
    assert!(!game.collect(&coin(7, 7, 0), Cell::new(7, 7)));
    assert_eq!(game.cache(cell), Some(before));
    assert!(game.inventory().is_empty());

    assert!(game.collect(&coin(1, 1, 0), cell));
    assert!(!game.collect(&coin(1, 1, 0), cell));
    assert_eq!(game.inventory().len(), 1);
}

#[test]
fn collect_and_deposit_conserve_total_coins() {
    let mut game = started_game(test_config());
    let total = game.coin_total();
    assert_eq!(total, game.markers().len() + extra_coins(&game));

    let steps: Vec<Box<dyn Fn(&mut Game)>> = vec![
        Box::new(|game| {
            game.collect(&coin(0, -2, 0), Cell::new(0, -2));
        }),
        Box::new(|game| {
            game.collect(&coin(0, -2, 1), Cell::new(0, -2));
        }),
        Box::new(|game| {
            game.collect(&coin(1, 1, 1), Cell::new(1, 1));
        }),
        Box::new(|game| {
            game.deposit(Cell::new(-1, -1));
        }),
        Box::new(|game| {
            game.collect(&coin(0, -2, 1), Cell::new(-1, -1));
        }),
        Box::new(|game| {
            game.collect(&coin(0, -2, 1), Cell::new(-1, -1));
        }),
        Box::new(|game| {
            game.deposit(Cell::new(1, 1));
        }),
        Box::new(|game| {
            game.deposit(Cell::new(1, 1));
        }),
    ];
    for (index, step) in steps.iter().enumerate() {
        step(&mut game);
        assert_eq!(game.coin_total(), total, "after step {index}");
    }
    assert_eq!(
        game.cache(Cell::new(1, 1)).expect("cache").coins,
        vec![coin(1, 1, 0), coin(0, -2, 1)]
    );
}

fn extra_coins(game: &Game) -> usize {
    game.markers()
        .iter()
        .map(|marker| game.cache(marker.cell).expect("cache").coin_count() - 1)
        .sum()
}

#[test]
fn focus_coin_home_respawns_out_of_view_cache() {
    let mut game = started_game(test_config());
    assert!(game.collect(&coin(1, 1, 0), Cell::new(1, 1)));
    walk(&mut game, Direction::South, 5);
    assert!(!game.has_marker(Cell::new(1, 1)));

    let held = game.inventory()[0];
    assert_eq!(game.focus_coin_home(&held), Cell::new(1, 1));
    assert!(game.has_marker(Cell::new(1, 1)));
    assert_eq!(
        game.cache(Cell::new(1, 1)).expect("cache").coins,
        vec![coin(1, 1, 1)]
    );
}

#[test]
fn state_survives_restart_through_file_store() {
    let temp = TempDir::new().expect("tempdir");
    let dir = temp.path().join("saves");

    {
        let mut game = Game::new(test_config(), Box::new(FileStore::new(&dir)));
        game.init();
        assert!(game.collect(&coin(1, 1, 1), Cell::new(1, 1)));
        game.step(Direction::East);
    }

    let mut restored = Game::new(test_config(), Box::new(FileStore::new(&dir)));
    restored.init();
    assert_eq!(restored.inventory(), &[coin(1, 1, 1)]);
    assert_eq!(restored.history().len(), 2);
    assert_eq!(restored.current_cell(), Cell::new(0, 1));
    assert_eq!(
        restored.cache(Cell::new(1, 1)).expect("cache").coins,
        vec![coin(1, 1, 0)]
    );
}

#[test]
fn restore_uses_last_history_point_as_location() {
    let mut store = MemoryStore::new();
    let far = LatLng::new(0.00105, -0.00095);
    store
        .set(
            PLAYER_LOCATION_KEY,
            &json!([{"lat": ORIGIN.lat, "lng": ORIGIN.lng}, {"lat": far.lat, "lng": far.lng}])
                .to_string(),
        )
        .expect("set");

    let mut game = Game::new(test_config(), Box::new(store));
    game.init();

    assert_eq!(game.location(), far);
    assert_eq!(game.history().len(), 2);
    assert_eq!(game.current_cell(), Cell::new(10, -10));
    assert!(game.has_marker(Cell::new(10, -10)));
    assert!(!game.has_marker(Cell::new(0, 0)));
}

#[test]
fn corrupt_caches_record_does_not_block_inventory_restore() {
    let mut store = MemoryStore::new();
    store.set(CACHES_KEY, "[[\"1,1\"").expect("set");
    store
        .set(
            INVENTORY_KEY,
            &json!([{"cell": {"i": 5, "j": 5}, "serial": 0}]).to_string(),
        )
        .expect("set");

    let mut game = Game::new(test_config(), Box::new(store));
    game.init();

    assert_eq!(game.inventory(), &[coin(5, 5, 0)]);
    assert_eq!(game.location(), ORIGIN);
    assert_eq!(game.registry_len(), 16);
    assert_eq!(
        game.cache(Cell::new(1, 1)).expect("regenerated").coins,
        vec![coin(1, 1, 0), coin(1, 1, 1)]
    );
}

#[test]
fn unreadable_memento_is_regenerated_on_spawn() {
    let mut store = MemoryStore::new();
    store
        .set(CACHES_KEY, &json!([["0,-2", "garbage"]]).to_string())
        .expect("set");

    let mut game = Game::new(test_config(), Box::new(store));
    game.init();

    assert_eq!(game.cache(Cell::new(0, -2)).expect("cache").coin_count(), 3);
}

#[test]
fn observer_sees_spawns_despawns_and_inventory_changes() {
    let recorded = Rc::new(RefCell::new(Recorded::default()));
    let mut game = Game::new(test_config(), Box::new(MemoryStore::new()))
        .with_observer(Box::new(RecordingObserver(Rc::clone(&recorded))));
    game.init();
    assert_eq!(recorded.borrow().spawned.len(), 16);

    game.step(Direction::North);
    {
        let seen = recorded.borrow();
        assert_eq!(seen.despawned.len(), 4);
        assert_eq!(seen.spawned.len(), 20);
        assert!(seen.despawned.iter().all(|cell| cell.i == -2));
        assert_eq!(seen.moves, 2);
    }

    assert!(game.collect(&coin(1, 1, 0), Cell::new(1, 1)));
    assert_eq!(game.deposit(Cell::new(0, 0)), 1);
    assert!(game.reset(|| true));

    let seen = recorded.borrow();
    assert_eq!(seen.changed, vec![Cell::new(1, 1), Cell::new(0, 0)]);
    assert_eq!(seen.inventory_sizes, vec![0, 1, 0, 0]);
    assert_eq!(seen.resets, 1);
    assert_eq!(seen.despawned.len(), 4 + 16);
}

#[test]
fn non_finite_movement_is_ignored() {
    let mut game = started_game(test_config());
    game.move_player(LatLng::new(f64::NAN, 0.0));
    assert_eq!(game.history(), &[ORIGIN]);
    assert_eq!(game.location(), ORIGIN);
}

#[test]
fn off_map_movement_is_ignored_and_not_persisted() {
    let mut game = started_game(test_config());
    let markers = game.markers();

    game.move_player(LatLng::new(1.0e6, 0.0));
    game.move_player(LatLng::new(0.0, -180.5));

    assert_eq!(game.history(), &[ORIGIN]);
    assert_eq!(game.location(), ORIGIN);
    assert_eq!(game.markers(), markers);
    assert_eq!(game.store().get(PLAYER_LOCATION_KEY).expect("get"), None);
}

#[test]
fn saved_off_map_history_falls_back_to_home() {
    let mut store = MemoryStore::new();
    store
        .set(
            PLAYER_LOCATION_KEY,
            &json!([{"lat": 1.0e6, "lng": 0.0}]).to_string(),
        )
        .expect("set");

    let mut game = Game::new(test_config(), Box::new(store));
    game.init();

    assert_eq!(game.location(), ORIGIN);
    assert_eq!(game.history(), &[ORIGIN]);
    assert_eq!(game.markers().len(), 16);
}

#[test]
fn memento_stored_under_wrong_cell_is_regenerated() {
    let foreign = Cache::generate(Cell::new(5, 5), 3).to_memento();
    let mut store = MemoryStore::new();
    store
        .set(CACHES_KEY, &json!([["0,0", foreign.as_str()]]).to_string())
        .expect("set");

    let mut game = Game::new(test_config(), Box::new(store));
    game.init();

    assert_eq!(
        game.cache(Cell::new(0, 0)).expect("regenerated").coins,
        vec![coin(0, 0, 0)]
    );
    assert!(!game.collect(&coin(5, 5, 0), Cell::new(0, 0)));
}
