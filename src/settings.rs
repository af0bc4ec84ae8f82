// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! The persisted rendering toggle.

Settings are stored as a small JSON object under [STORAGE_KEY]:

```json
{"graphics":"fast"}
```

Loading is lenient: unreadable JSON, a non-object, or an unknown value for a key
all fall back to that key's default.  When every key is at its default the blob is
removed rather than written.
*/

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

pub const STORAGE_KEY: &str = "smooth_canvas_settings";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SettingsError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Graphics {
    /// The host's own drawing: no interpolation, and the host keeps its timing.
    #[default]
    Original,
    /// Interpolated rendering on the fixed tick.
    Fast,
}

impl Graphics {
    pub const ALL: [Graphics; 2] = [Graphics::Original, Graphics::Fast];

    pub fn interpolates(self) -> bool {
        self == Graphics::Fast
    }

    pub fn name(self) -> &'static str {
        match self {
            Graphics::Original => "original",
            Graphics::Fast => "fast",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Settings {
    pub graphics: Graphics,
}

impl Settings {
    /// Reads a stored blob, falling back per key.
    pub fn parse(text: Option<&str>) -> Settings {
        let value = text
            .and_then(|t| serde_json::from_str::<serde_json::Value>(t).ok())
            .unwrap_or(serde_json::Value::Null);
        let key = |name: &str| value.as_object().and_then(|o| o.get(name)).cloned();
        Settings {
            graphics: key("graphics")
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default(),
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Settings::default()
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Key-value persistence for settings blobs.
pub trait SettingsStore: Send {
    fn load(&self, key: &str) -> Result<Option<String>, SettingsError>;
    fn store(&mut self, key: &str, value: &str) -> Result<(), SettingsError>;
    fn remove(&mut self, key: &str) -> Result<(), SettingsError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, SettingsError> {
        Ok(self.values.get(key).cloned())
    }

    fn store(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), SettingsError> {
        self.values.remove(key);
        Ok(())
    }
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl SettingsStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>, SettingsError> {
        match std::fs::read_to_string(self.path(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path(key), value)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), SettingsError> {
        match std::fs::remove_file(self.path(key)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

type Listener = Box<dyn FnMut(Graphics) + Send>;

/// Current settings, their store, and whoever wants to hear about changes.
pub struct SettingsManager {
    store: Box<dyn SettingsStore>,
    current: Settings,
    listeners: Vec<Listener>,
}

impl std::fmt::Debug for SettingsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsManager")
            .field("current", &self.current)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl SettingsManager {
    pub fn load(store: Box<dyn SettingsStore>) -> Result<Self, SettingsError> {
        let current = Settings::parse(store.load(STORAGE_KEY)?.as_deref());
        logwise::info_sync!(
            "Loaded settings: graphics={graphics}",
            graphics = logwise::privacy::LogIt(&current.graphics)
        );
        Ok(SettingsManager {
            store,
            current,
            listeners: Vec::new(),
        })
    }

    pub fn settings(&self) -> Settings {
        self.current
    }

    pub fn graphics(&self) -> Graphics {
        self.current.graphics
    }

    /// Runs `listener` after every change to `graphics`.
    pub fn on_graphics_change(&mut self, listener: impl FnMut(Graphics) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Persists `graphics` and notifies listeners.  `Ok(false)` if it was already set.
    pub fn set_graphics(&mut self, graphics: Graphics) -> Result<bool, SettingsError> {
        if self.current.graphics == graphics {
            return Ok(false);
        }
        let next = Settings { graphics };
        if next.is_default() {
            self.store.remove(STORAGE_KEY)?;
        } else {
            self.store.store(STORAGE_KEY, &next.to_json()?)?;
        }
        self.current = next;
        for listener in &mut self.listeners {
            listener(graphics);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn parse_falls_back_per_key() {
        assert_eq!(Settings::parse(None), Settings::default());
        assert_eq!(Settings::parse(Some("not json")), Settings::default());
        assert_eq!(Settings::parse(Some("[1,2]")), Settings::default());
        assert_eq!(
            Settings::parse(Some(r#"{"graphics":"sparkly"}"#)),
            Settings::default()
        );
        assert_eq!(
            Settings::parse(Some(r#"{"graphics":"fast","audio":"fixed"}"#)).graphics,
            Graphics::Fast
        );
    }

    #[test]
    fn only_fast_graphics_interpolate() {
        assert!(Graphics::Fast.interpolates());
        assert!(!Graphics::Original.interpolates());
        assert!(!Graphics::default().interpolates());
    }

    #[test]
    fn defaults_remove_the_blob() {
        let mut manager = SettingsManager::load(Box::new(MemoryStore::new())).unwrap();
        assert_eq!(manager.graphics(), Graphics::Original);
        assert!(manager.set_graphics(Graphics::Fast).unwrap());
        assert!(!manager.set_graphics(Graphics::Fast).unwrap());
        assert!(manager.set_graphics(Graphics::Original).unwrap());
        assert_eq!(manager.graphics(), Graphics::Original);
    }

    #[test]
    fn listeners_hear_changes() {
        let heard = Arc::new(Mutex::new(Vec::new()));
        let move_heard = heard.clone();
        let mut manager = SettingsManager::load(Box::new(MemoryStore::new())).unwrap();
        manager.on_graphics_change(move |g| move_heard.lock().unwrap().push(g));
        manager.set_graphics(Graphics::Fast).unwrap();
        manager.set_graphics(Graphics::Fast).unwrap();
        manager.set_graphics(Graphics::Original).unwrap();
        assert_eq!(*heard.lock().unwrap(), vec![Graphics::Fast, Graphics::Original]);
    }

    #[test]
    fn file_store_round_trips_and_removes() {
        let dir = std::env::temp_dir().join(format!("smooth_canvas_settings_{}", std::process::id()));
        let mut store = FileStore::new(&dir);
        assert_eq!(store.load(STORAGE_KEY).unwrap(), None);
        store.store(STORAGE_KEY, r#"{"graphics":"fast"}"#).unwrap();
        let manager = SettingsManager::load(Box::new(store.clone())).unwrap();
        assert_eq!(manager.graphics(), Graphics::Fast);
        store.remove(STORAGE_KEY).unwrap();
        store.remove(STORAGE_KEY).unwrap();
        assert_eq!(store.load(STORAGE_KEY).unwrap(), None);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn memory_store_reflects_writes() {
        let mut store = MemoryStore::new();
        store.store(STORAGE_KEY, r#"{"graphics":"fast"}"#).unwrap();
        assert_eq!(store.get(STORAGE_KEY), Some(r#"{"graphics":"fast"}"#));
        assert_eq!(
            Settings::parse(store.get(STORAGE_KEY)).to_json().unwrap(),
            r#"{"graphics":"fast"}"#
        );
    }
}
