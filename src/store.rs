use crate::config::*;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Every file the game reads or writes, resolved under one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub root: PathBuf,
    pub score_file: PathBuf,
    pub config_file: PathBuf,
    pub assets_dir: PathBuf,
    pub menu_image: PathBuf,
    pub button_image: PathBuf,
}

impl AppPaths {
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let assets_dir = root.join(ASSETS_DIR);
        Self {
            score_file: root.join(SCORE_DIR).join(SCORE_FILE),
            config_file: root.join(CONFIG_DIR).join(CONFIG_FILE),
            menu_image: assets_dir.join(MENU_IMAGE_FILE),
            button_image: assets_dir.join(BUTTON_IMAGE_FILE),
            assets_dir,
            root,
        }
    }

    /// Resolves the per-user data directory, falling back to the working directory.
    pub fn from_data_dir() -> Self {
        let base = dirs::data_dir().unwrap_or_else(|| {
            warn!("No per-user data directory found, using the current directory.");
            PathBuf::from(".")
        });
        Self::under(base.join(APP_DIR_NAME))
    }

    fn dirs(&self) -> [&Path; 3] {
        [
            self.score_file.parent().unwrap_or(self.root.as_path()),
            self.config_file.parent().unwrap_or(self.root.as_path()),
            self.assets_dir.as_path(),
        ]
    }
}

/// Ordered setting name -> enabled map. Every value is a JSON boolean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigMap(Map<String, Value>);

impl Default for ConfigMap {
    fn default() -> Self {
        let mut map = Map::new();
        for (key, value) in DEFAULT_SETTINGS {
            map.insert(key.to_string(), Value::Bool(value));
        }
        Self(map)
    }
}

impl ConfigMap {
    /// Defaults first, then every boolean entry of `saved` on top.
    pub fn merged_over_defaults(saved: Map<String, Value>) -> Self {
        let mut config = Self::default();
        for (key, value) in saved {
            match value {
                Value::Bool(enabled) => config.set(&key, enabled),
                other => warn!("Ignoring non-boolean setting '{}': {}", key, other),
            }
        }
        config
    }

    pub fn get(&self, key: &str) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn set(&mut self, key: &str, enabled: bool) {
        self.0.insert(key.to_string(), Value::Bool(enabled));
    }

    pub fn toggle(&mut self, key: &str) {
        let current = self.get(key);
        self.set(key, !current);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0
            .iter()
            .filter_map(|(key, value)| value.as_bool().map(|v| (key.as_str(), v)))
    }

    /// Pretty JSON with 4-space indentation.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut serializer)?;
        Ok(out)
    }
}

/// Parses like a decimal integer prefix: "42.9" is 42, "abc" is 0.
/// Negative or overflowing values are coerced to 0.
pub fn parse_score(text: &str) -> u64 {
    let text = text.trim_start();
    let (negative, rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || negative {
        return 0;
    }
    rest[..digits].parse().unwrap_or(0)
}

/// Owns the on-disk score and settings.
#[derive(Debug, Clone)]
pub struct Store {
    paths: AppPaths,
}

impl Store {
    pub fn new(paths: AppPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn ensure_dirs(&self) -> Result<(), StoreError> {
        for dir in self.paths.dirs() {
            fs::create_dir_all(dir).map_err(|source| StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn ensure_score(&self) -> Result<(), StoreError> {
        if self.paths.score_file.exists() {
            return Ok(());
        }
        info!("Creating score file at '{}'.", self.paths.score_file.display());
        self.save_score(0)
    }

    pub fn ensure_config(&self) -> Result<(), StoreError> {
        if self.paths.config_file.exists() {
            return Ok(());
        }
        info!("Creating settings file at '{}'.", self.paths.config_file.display());
        self.save_config(&ConfigMap::default())
    }

    /// Safe to call on every launch; failures are logged and swallowed.
    pub fn ensure_initialized(&self) {
        let steps = [
            self.ensure_dirs(),
            self.ensure_score(),
            self.ensure_config(),
        ];
        for result in steps {
            if let Err(e) = result {
                warn!("Store initialization incomplete: {}", e);
            }
        }
    }

    pub fn load_score(&self) -> u64 {
        match fs::read_to_string(&self.paths.score_file) {
            Ok(text) => parse_score(&text),
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("Failed to read score, starting from 0: {}", e);
                }
                0
            }
        }
    }

    pub fn save_score(&self, score: u64) -> Result<(), StoreError> {
        write_file(&self.paths.score_file, score.to_string().as_bytes())
    }

    pub fn load_config(&self) -> ConfigMap {
        let text = match fs::read_to_string(&self.paths.config_file) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let defaults = ConfigMap::default();
                if let Err(e) = self.save_config(&defaults) {
                    debug!("Default settings not persisted: {}", e);
                }
                return defaults;
            }
            Err(e) => {
                warn!("Failed to read settings, using defaults: {}", e);
                return ConfigMap::default();
            }
        };

        match serde_json::from_str::<Map<String, Value>>(&text) {
            Ok(saved) => ConfigMap::merged_over_defaults(saved),
            Err(e) => {
                warn!("Settings file is not a JSON object, using defaults: {}", e);
                ConfigMap::default()
            }
        }
    }

    pub fn save_config(&self, config: &ConfigMap) -> Result<(), StoreError> {
        let json = config.to_json().map_err(|e| {
            warn!("Failed to encode settings: {}", e);
            StoreError::Encode(e)
        })?;
        write_file(&self.paths.config_file, &json)
    }
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    fs::write(path, contents).map_err(|source| {
        warn!("Failed to write '{}': {}", path.display(), source);
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}
