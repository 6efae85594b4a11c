use std::fmt;

use geocoin_engine::{cell_seed, luck, Cell};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

const MEMENTO_VERSION: u32 = 1;
const COIN_COUNT_PURPOSE: &str = "numCoins";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) struct Coin {
    pub(crate) cell: Cell,
    pub(crate) serial: u32,
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}#{}", self.cell.i, self.cell.j, self.serial)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Cache {
    pub(crate) cell: Cell,
    pub(crate) coins: Vec<Coin>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Memento(String);

impl Memento {
    pub(crate) fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum MementoError {
    #[error("decode cache memento: {message}")]
    Decode { message: String },
    #[error("decode cache memento at {path}: {message}")]
    DecodeAt { path: String, message: String },
    #[error("cache memento version: expected {expected}, got {actual}")]
    Version { expected: u32, actual: u32 },
    #[error("cache memento for cell {actual} stored under cell {expected}")]
    CellMismatch { expected: Cell, actual: Cell },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SavedCache {
    version: u32,
    cell: Cell,
    coins: Vec<Coin>,
}

impl Cache {
    /// Content is a function of the cell coordinates alone.
    pub(crate) fn generate(cell: Cell, max_coins: u32) -> Self {
        let roll = luck(&cell_seed(cell, Some(COIN_COUNT_PURPOSE)));
        let count = (roll * f64::from(max_coins.max(1))).floor() as u32 + 1;
        let coins = (0..count).map(|serial| Coin { cell, serial }).collect();
        Self { cell, coins }
    }

    pub(crate) fn coin_count(&self) -> usize {
        self.coins.len()
    }

    pub(crate) fn contains(&self, coin: &Coin) -> bool {
        self.coins.iter().any(|candidate| candidate == coin)
    }

    pub(crate) fn take(&mut self, coin: &Coin) -> Option<Coin> {
        let index = self.coins.iter().position(|candidate| candidate == coin)?;
        Some(self.coins.remove(index))
    }

    pub(crate) fn put(&mut self, coin: Coin) {
        self.coins.push(coin);
    }

    pub(crate) fn to_memento(&self) -> Memento {
        let saved = SavedCache {
            version: MEMENTO_VERSION,
            cell: self.cell,
            coins: self.coins.clone(),
        };
        match serde_json::to_string(&saved) {
            Ok(json) => Memento(json),
            Err(error) => {
                // An empty memento fails to decode and the cell is regenerated.
                warn!(cell = %self.cell, error = %error, "cache_memento_encode_failed");
                Memento(String::new())
            }
        }
    }

    /// Decodes a memento stored under `expected`; one describing any other
    /// cell is rejected.
    pub(crate) fn from_memento(memento: &Memento, expected: Cell) -> Result<Self, MementoError> {
        let mut deserializer = serde_json::Deserializer::from_str(memento.as_str());
        let saved = match serde_path_to_error::deserialize::<_, SavedCache>(&mut deserializer) {
            Ok(saved) => saved,
            Err(error) => {
                let path = error.path().to_string();
                let message = error.into_inner().to_string();
                return Err(if path.is_empty() || path == "." {
                    MementoError::Decode { message }
                } else {
                    MementoError::DecodeAt { path, message }
                });
            }
        };
        if saved.version != MEMENTO_VERSION {
            return Err(MementoError::Version {
                expected: MEMENTO_VERSION,
                actual: saved.version,
            });
        }
        if saved.cell != expected {
            return Err(MementoError::CellMismatch {
                expected,
                actual: saved.cell,
            });
        }
        Ok(Self {
            cell: saved.cell,
            coins: saved.coins,
        })
    }
}
