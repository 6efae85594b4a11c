use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod grid;
pub mod luck;
pub mod storage;

pub use grid::{
    Cell, CellKey, CellKeyError, Direction, GeoBounds, Grid, LatLng, MAX_LATITUDE, MAX_LONGITUDE,
    MAX_NEIGHBORHOOD_RADIUS,
};
pub use luck::{cell_seed, luck};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};

pub const ROOT_ENV_VAR: &str = "GEOCOIN_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub save_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cannot locate the running executable: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("cannot create save directory {path}: {source}")]
    CreateSaveDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{ROOT_ENV_VAR}={path} has no Cargo.toml and crates/ directory")]
    InvalidRootOverride { path: PathBuf },
    #[error("no workspace root above {start}; set {ROOT_ENV_VAR}")]
    RootNotFound { start: PathBuf },
}

/// Save directory under the workspace root, created if missing.
pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
    let root = find_root(env::var_os(ROOT_ENV_VAR).map(PathBuf::from), &exe)?;
    let save_dir = root.join("cache").join("saves");
    ensure_save_dir(&save_dir)?;
    Ok(AppPaths { root, save_dir })
}

pub fn ensure_save_dir(path: &Path) -> Result<(), StartupError> {
    fs::create_dir_all(path).map_err(|source| StartupError::CreateSaveDir {
        path: path.to_path_buf(),
        source,
    })
}

/// An explicit root must be a workspace; otherwise the nearest workspace
/// enclosing `search_from` wins.
fn find_root(explicit: Option<PathBuf>, search_from: &Path) -> Result<PathBuf, StartupError> {
    if let Some(path) = explicit {
        let path = canonical(&path);
        return if is_workspace_root(&path) {
            Ok(path)
        } else {
            Err(StartupError::InvalidRootOverride { path })
        };
    }
    search_from
        .ancestors()
        .find(|dir| is_workspace_root(dir))
        .map(canonical)
        .ok_or_else(|| StartupError::RootNotFound {
            start: canonical(search_from),
        })
}

fn is_workspace_root(dir: &Path) -> bool {
    dir.join("Cargo.toml").is_file() && dir.join("crates").is_dir()
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
