use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const APP_DIR: &str = "crimson-arena";
const PREFS_FILE: &str = "prefs.json";

/// The only state that outlives a dashboard session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prefs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
}

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("prefs io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("prefs json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn default_prefs_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(PREFS_FILE))
}

/// A missing file yields defaults; a corrupt one is an error.
pub fn load(path: &Path) -> Result<Prefs, PrefsError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Prefs::default()),
        Err(source) => {
            return Err(PrefsError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if content.trim().is_empty() {
        return Ok(Prefs::default());
    }
    Ok(serde_json::from_str(&content)?)
}

pub fn save(path: &Path, prefs: &Prefs) -> Result<(), PrefsError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| PrefsError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let payload = serde_json::to_string_pretty(prefs)?;
    fs::write(path, payload).map_err(|source| PrefsError::Io {
        path: path.to_path_buf(),
        source,
    })
}
