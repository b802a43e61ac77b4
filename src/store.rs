//! String-keyed persistence shared by the engines.
//!
//! Every engine owns a fixed set of keys and never reads another engine's.
//! Reads always fall back to a default; a value that is present but does not
//! parse is logged and treated as missing.

use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use tracing::warn;

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}

/// A JSON object on disk, rewritten atomically after every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Loads `path` if it exists. Non-string scalars are kept in their JSON
    /// text form so each key still falls back on its own when read. A file
    /// that is not a JSON object is moved to `<name>.bak` before starting
    /// fresh, so the next write never clobbers it.
    pub fn open(path: &Path) -> Self {
        let entries = match fs::read_to_string(path) {
            Ok(s) => match serde_json::from_str::<BTreeMap<String, Value>>(&s) {
                Ok(raw) => raw
                    .into_iter()
                    .filter_map(|(key, value)| match value {
                        Value::String(v) => Some((key, v)),
                        Value::Null => None,
                        other => Some((key, other.to_string())),
                    })
                    .collect(),
                Err(err) => {
                    warn!(path = %path.display(), %err, "save file unreadable, starting fresh");
                    set_aside(path);
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                warn!(path = %path.display(), %err, "save file unreadable, starting fresh");
                set_aside(path);
                BTreeMap::new()
            }
        };
        Self {
            path: path.to_path_buf(),
            entries,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(&self.entries)?;
        fs::write(&tmp, data)?;
        atomic_rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.flush()
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

fn set_aside(path: &Path) {
    let bak = backup_path(path);
    match atomic_rename(path, &bak) {
        Ok(()) => warn!(backup = %bak.display(), "kept unreadable save"),
        Err(err) => warn!(%err, "could not move unreadable save aside"),
    }
}

pub(crate) fn atomic_rename(from: &Path, to: &Path) -> Result<()> {
    // Best-effort replace on the same filesystem.
    if to.exists() {
        let _ = fs::remove_file(to);
    }
    fs::rename(from, to)?;
    Ok(())
}

/// Reads and parses `key`, falling back to `default` when absent or corrupt.
pub fn read_or<T>(store: &dyn KeyValueStore, key: &str, default: T) -> T
where
    T: FromStr,
{
    match store.get(key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                warn!(key, value = %raw, "corrupt stored value, using default");
                default
            }
        },
        None => default,
    }
}

/// Writes `value` under `key`. A failing backend is logged; the in-memory
/// state stays authoritative for the rest of the session.
pub fn write_through(store: &mut dyn KeyValueStore, key: &str, value: impl Display) {
    if let Err(err) = store.set(key, &value.to_string()) {
        warn!(key, %err, "failed to persist value");
    }
}
