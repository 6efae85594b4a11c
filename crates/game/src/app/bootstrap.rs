use std::env;
use std::path::PathBuf;

use geocoin_engine::{
    ensure_save_dir, resolve_app_paths, FileStore, KeyValueStore, LatLng, MemoryStore,
    StartupError, MAX_NEIGHBORHOOD_RADIUS,
};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::gameplay::GameConfig;
use super::geolocation::{FixedGeolocation, GeolocationSource, NoGeolocation};

const NEIGHBORHOOD_SIZE_ENV_VAR: &str = "GEOCOIN_NEIGHBORHOOD_SIZE";
const SPAWN_PROBABILITY_ENV_VAR: &str = "GEOCOIN_SPAWN_PROBABILITY";
const HOME_ENV_VAR: &str = "GEOCOIN_HOME";
const GEOLOCATION_ENV_VAR: &str = "GEOCOIN_GEOLOCATION";
const SAVE_DIR_ENV_VAR: &str = "GEOCOIN_SAVE_DIR";
const EPHEMERAL_ENV_VAR: &str = "GEOCOIN_EPHEMERAL";

#[derive(Debug, Clone, PartialEq, Error)]
pub(crate) enum ConfigError {
    #[error("{var}={value:?} is not an integer in [0, {max}]")]
    InvalidCount {
        var: &'static str,
        value: String,
        max: u32,
    },
    #[error("{var}={value:?} is not a probability in [0, 1]")]
    InvalidProbability { var: &'static str, value: String },
    #[error("{var}={value:?} is not a \"lat,lng\" pair within ±90,±180")]
    InvalidPosition { var: &'static str, value: String },
}

pub(crate) struct AppWiring {
    pub(crate) config: GameConfig,
    pub(crate) store: Box<dyn KeyValueStore>,
    pub(crate) geolocation: Box<dyn GeolocationSource>,
}

pub(crate) fn build_app() -> Result<AppWiring, StartupError> {
    init_tracing();
    info!("=== Geocoin Startup ===");

    let vars = |name: &str| env::var(name).ok();
    let config = config_from(&vars);
    let geolocation = geolocation_from(&vars);
    let store = open_store(&vars)?;
    info!(
        neighborhood = config.neighborhood_size,
        spawn_probability = config.cache_spawn_probability,
        home = %config.home,
        "config_loaded"
    );

    Ok(AppWiring {
        config,
        store,
        geolocation,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

/// Defaults with every valid override applied; invalid ones are logged.
fn config_from(vars: &impl Fn(&str) -> Option<String>) -> GameConfig {
    let mut config = GameConfig::default();
    apply_override(vars, NEIGHBORHOOD_SIZE_ENV_VAR, parse_radius, &mut config.neighborhood_size);
    apply_override(
        vars,
        SPAWN_PROBABILITY_ENV_VAR,
        parse_probability,
        &mut config.cache_spawn_probability,
    );
    apply_override(vars, HOME_ENV_VAR, parse_position, &mut config.home);
    config
}

fn geolocation_from(vars: &impl Fn(&str) -> Option<String>) -> Box<dyn GeolocationSource> {
    let mut position = None;
    apply_override(
        vars,
        GEOLOCATION_ENV_VAR,
        |var, raw| parse_position(var, raw).map(Some),
        &mut position,
    );
    match position {
        Some(position) => {
            info!(position = %position, "geolocation_fixed");
            Box::new(FixedGeolocation::new(position))
        }
        None => Box::new(NoGeolocation),
    }
}

fn open_store(
    vars: &impl Fn(&str) -> Option<String>,
) -> Result<Box<dyn KeyValueStore>, StartupError> {
    if vars(EPHEMERAL_ENV_VAR).is_some_and(|raw| is_truthy(&raw)) {
        info!(backend = "memory", "storage_ready");
        return Ok(Box::new(MemoryStore::new()));
    }

    let save_dir = match vars(SAVE_DIR_ENV_VAR).filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => {
            let dir = PathBuf::from(raw);
            ensure_save_dir(&dir)?;
            dir
        }
        None => resolve_app_paths()?.save_dir,
    };
    info!(backend = "file", dir = %save_dir.display(), "storage_ready");
    Ok(Box::new(FileStore::new(save_dir)))
}

fn apply_override<T>(
    vars: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    parse: impl Fn(&'static str, &str) -> Result<T, ConfigError>,
    target: &mut T,
) {
    let Some(raw) = vars(var) else {
        return;
    };
    match parse(var, raw.trim()) {
        Ok(value) => *target = value,
        Err(error) => warn!(error = %error, "config_override_ignored"),
    }
}

fn parse_radius(var: &'static str, raw: &str) -> Result<u32, ConfigError> {
    match raw.parse::<u32>() {
        Ok(value) if value <= MAX_NEIGHBORHOOD_RADIUS => Ok(value),
        _ => Err(ConfigError::InvalidCount {
            var,
            value: raw.to_string(),
            max: MAX_NEIGHBORHOOD_RADIUS,
        }),
    }
}

fn parse_probability(var: &'static str, raw: &str) -> Result<f64, ConfigError> {
    match raw.parse::<f64>() {
        Ok(value) if (0.0..=1.0).contains(&value) => Ok(value),
        _ => Err(ConfigError::InvalidProbability {
            var,
            value: raw.to_string(),
        }),
    }
}

fn parse_position(var: &'static str, raw: &str) -> Result<LatLng, ConfigError> {
    let invalid = || ConfigError::InvalidPosition {
        var,
        value: raw.to_string(),
    };
    let (lat, lng) = raw.split_once(',').ok_or_else(invalid)?;
    let lat = lat.trim().parse::<f64>().map_err(|_| invalid())?;
    let lng = lng.trim().parse::<f64>().map_err(|_| invalid())?;
    let position = LatLng::new(lat, lng);
    if position.is_on_map() {
        Ok(position)
    } else {
        Err(invalid())
    }
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
