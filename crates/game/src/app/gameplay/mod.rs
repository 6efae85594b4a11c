mod cache;
mod config;
mod game;
mod observer;
mod persistence;
mod registry;

pub(crate) use cache::{Cache, Coin};
pub(crate) use config::GameConfig;
pub(crate) use game::Game;
pub(crate) use observer::GameObserver;
pub(crate) use registry::CacheMarker;

#[cfg(test)]
mod tests;
