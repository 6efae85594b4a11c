use geocoin_engine::{CellKey, KeyValueStore, LatLng, StorageError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::cache::{Coin, Memento};
use super::registry::CacheRegistry;

pub(crate) const CACHES_KEY: &str = "caches";
pub(crate) const INVENTORY_KEY: &str = "inventory";
pub(crate) const PLAYER_LOCATION_KEY: &str = "playerLocation";

#[derive(Debug, Error)]
pub(crate) enum PersistError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("encode record '{key}': {source}")]
    Encode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("parse record '{key}': {message}")]
    Parse { key: &'static str, message: String },
    #[error("parse record '{key}' at {path}: {message}")]
    ParseAt {
        key: &'static str,
        path: String,
        message: String,
    },
}

pub(crate) fn save_caches(
    store: &mut dyn KeyValueStore,
    registry: &CacheRegistry,
) -> Result<(), PersistError> {
    let pairs = registry
        .entries()
        .iter()
        .map(|(key, memento)| (key.as_str(), memento.as_str()))
        .collect::<Vec<_>>();
    write_record(store, CACHES_KEY, &pairs)
}

pub(crate) fn save_inventory(
    store: &mut dyn KeyValueStore,
    inventory: &[Coin],
) -> Result<(), PersistError> {
    write_record(store, INVENTORY_KEY, &inventory)
}

pub(crate) fn save_history(
    store: &mut dyn KeyValueStore,
    history: &[LatLng],
) -> Result<(), PersistError> {
    write_record(store, PLAYER_LOCATION_KEY, &history)
}

pub(crate) fn load_caches(store: &dyn KeyValueStore) -> CacheRegistry {
    read_record(store, CACHES_KEY, parse_caches_record).unwrap_or_default()
}

pub(crate) fn load_inventory(store: &dyn KeyValueStore) -> Vec<Coin> {
    read_record(store, INVENTORY_KEY, |raw| parse_json(INVENTORY_KEY, raw)).unwrap_or_default()
}

pub(crate) fn load_history(store: &dyn KeyValueStore) -> Vec<LatLng> {
    read_record(store, PLAYER_LOCATION_KEY, parse_history_record).unwrap_or_default()
}

pub(crate) fn clear_all(store: &mut dyn KeyValueStore) -> Result<(), PersistError> {
    for key in [CACHES_KEY, INVENTORY_KEY, PLAYER_LOCATION_KEY] {
        store.remove(key)?;
    }
    Ok(())
}

fn write_record<T: Serialize + ?Sized>(
    store: &mut dyn KeyValueStore,
    key: &'static str,
    value: &T,
) -> Result<(), PersistError> {
    let json = serde_json::to_string(value).map_err(|source| PersistError::Encode { key, source })?;
    store.set(key, &json)?;
    Ok(())
}

/// Missing and malformed records both come back as `None`.
fn read_record<T>(
    store: &dyn KeyValueStore,
    key: &'static str,
    parse: impl FnOnce(&str) -> Result<T, PersistError>,
) -> Option<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(key, "save_record_absent");
            return None;
        }
        Err(error) => {
            warn!(key, error = %error, "save_record_unreadable");
            return None;
        }
    };
    match parse(&raw) {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(key, error = %error, "save_record_discarded");
            None
        }
    }
}

fn parse_json<T: DeserializeOwned>(key: &'static str, raw: &str) -> Result<T, PersistError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    match serde_path_to_error::deserialize::<_, T>(&mut deserializer) {
        Ok(value) => Ok(value),
        Err(error) => {
            let path = error.path().to_string();
            let message = error.into_inner().to_string();
            if path.is_empty() || path == "." {
                Err(PersistError::Parse { key, message })
            } else {
                Err(PersistError::ParseAt { key, path, message })
            }
        }
    }
}

fn parse_history_record(raw: &str) -> Result<Vec<LatLng>, PersistError> {
    let history: Vec<LatLng> = parse_json(PLAYER_LOCATION_KEY, raw)?;
    if let Some(index) = history.iter().position(|point| !point.is_on_map()) {
        return Err(PersistError::ParseAt {
            key: PLAYER_LOCATION_KEY,
            path: format!("[{index}]"),
            message: format!("position {} is off the map", history[index]),
        });
    }
    Ok(history)
}

fn parse_caches_record(raw: &str) -> Result<CacheRegistry, PersistError> {
    let pairs: Vec<(String, String)> = parse_json(CACHES_KEY, raw)?;
    let mut entries = Vec::with_capacity(pairs.len());
    for (index, (raw_key, memento)) in pairs.into_iter().enumerate() {
        let key = CellKey::parse(&raw_key).map_err(|error| PersistError::ParseAt {
            key: CACHES_KEY,
            path: format!("[{index}][0]"),
            message: error.to_string(),
        })?;
        entries.push((key, Memento::from_raw(memento)));
    }
    Ok(CacheRegistry::from_entries(entries))
}
