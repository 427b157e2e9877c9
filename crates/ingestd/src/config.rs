use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use common::MediaRoots;
use library::{ImportMode, DEFAULT_EXTENSIONS, DEFAULT_HASH_WINDOW};
use serde::{Deserialize, Serialize};

pub const CONFIG_VERSION: u32 = 1;

const DEFAULT_DEBOUNCE_MS: u64 = 2000;

/// What to run when the process starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartupImport {
    None,
    Incremental,
    Full,
}

impl StartupImport {
    pub fn mode(&self) -> Option<ImportMode> {
        match self {
            StartupImport::None => None,
            StartupImport::Incremental => Some(ImportMode::Incremental),
            StartupImport::Full => Some(ImportMode::Full),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub version: u32,
    pub music_root: String,
    pub audiobook_root: String,
    pub artwork_cache_path: String,
    pub index_path: String,
    pub extensions: Vec<String>,
    pub watch_enabled: bool,
    pub watch_debounce_ms: u64,
    pub hash_window_bytes: u64,
    pub hash_sweep_delay_secs: u64,
    pub startup_import: StartupImport,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            music_root: "music".to_string(),
            audiobook_root: "audiobooks".to_string(),
            artwork_cache_path: "covers".to_string(),
            index_path: "catalog.redb".to_string(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            watch_enabled: true,
            watch_debounce_ms: DEFAULT_DEBOUNCE_MS,
            hash_window_bytes: DEFAULT_HASH_WINDOW,
            hash_sweep_delay_secs: 5,
            startup_import: StartupImport::Incremental,
        }
    }
}

impl IngestConfig {
    pub fn media_roots(&self, config_path: &Path) -> MediaRoots {
        MediaRoots::new(
            resolve_path(config_path, or_default(&self.music_root, "music")),
            resolve_path(config_path, or_default(&self.audiobook_root, "audiobooks")),
            resolve_path(config_path, or_default(&self.artwork_cache_path, "covers")),
        )
    }

    pub fn index_path(&self, config_path: &Path) -> PathBuf {
        resolve_path(config_path, or_default(&self.index_path, "catalog.redb"))
    }

    pub fn debounce(&self) -> Duration {
        let ms = if self.watch_debounce_ms == 0 {
            DEFAULT_DEBOUNCE_MS
        } else {
            self.watch_debounce_ms
        };
        Duration::from_millis(ms)
    }

    pub fn hash_window(&self) -> u64 {
        if self.hash_window_bytes == 0 {
            DEFAULT_HASH_WINDOW
        } else {
            self.hash_window_bytes
        }
    }

    pub fn hash_sweep_delay(&self) -> Duration {
        Duration::from_secs(self.hash_sweep_delay_secs)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

pub fn config_path_from_env() -> PathBuf {
    match env::var("SOUNDX_CONFIG") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("config.yaml"))
            .unwrap_or_else(|| PathBuf::from("config.yaml")),
        Err(_) => PathBuf::from("config.yaml"),
    }
}

/// Loads the config, writing the defaults first when the file is missing.
/// The flag is true when a new file was created.
pub fn load_or_create_config(path: &Path) -> Result<(IngestConfig, bool), ConfigError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let mut config: IngestConfig = serde_yaml::from_str(&contents)?;
        if config.version < CONFIG_VERSION {
            config.version = CONFIG_VERSION;
        }
        if config.extensions.is_empty() {
            config.extensions = DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect();
        }
        return Ok((config, false));
    }

    let config = IngestConfig::default();
    save_config(path, &config)?;
    Ok((config, true))
}

pub fn save_config(path: &Path, config: &IngestConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    fs::write(path, contents)?;
    Ok(())
}

pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value);
    if raw.is_absolute() {
        return raw;
    }
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    base.join(raw)
}

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("config.yaml");

        let (config, created) = load_or_create_config(&path).unwrap();
        assert!(created);
        assert!(path.exists());
        assert_eq!(config.watch_debounce_ms, 2000);
        assert_eq!(config.startup_import, StartupImport::Incremental);

        let (_, created) = load_or_create_config(&path).unwrap();
        assert!(!created);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "music_root: /srv/music\nstartup_import: full\nwatch_debounce_ms: 0\nextensions: []\n",
        )
        .unwrap();

        let (config, created) = load_or_create_config(&path).unwrap();
        assert!(!created);
        assert_eq!(config.startup_import.mode(), Some(ImportMode::Full));
        assert_eq!(config.debounce(), Duration::from_millis(2000));
        assert_eq!(config.hash_window(), DEFAULT_HASH_WINDOW);
        assert_eq!(config.extensions.len(), DEFAULT_EXTENSIONS.len());

        let roots = config.media_roots(&path);
        assert_eq!(roots.music, PathBuf::from("/srv/music"));
        assert_eq!(roots.audiobook, dir.path().join("audiobooks"));
        assert_eq!(roots.covers, dir.path().join("covers"));
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let resolved = resolve_path(Path::new("/etc/soundx/config.yaml"), "data/catalog.redb");
        assert_eq!(resolved, PathBuf::from("/etc/soundx/data/catalog.redb"));
        let bare = resolve_path(Path::new("config.yaml"), "catalog.redb");
        assert_eq!(bare, PathBuf::from("./catalog.redb"));
    }

    #[test]
    fn startup_none_disables_import() {
        let config: IngestConfig = serde_yaml::from_str("startup_import: none\n").unwrap();
        assert_eq!(config.startup_import.mode(), None);
    }
}
