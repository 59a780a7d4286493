//! Directory layout and persisted settings for the Jarvis client.
//!
//! Directory layout:
//! ```text
//! jarvis_data/
//! ├── state/           # Persisted client state (session id, queue, history)
//! └── logs/            # Rolling log files
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const ROOT_ENV: &str = "JARVIS_ROOT";
pub const SERVER_URL_ENV: &str = "JARVIS_SERVER_URL";

pub const DEFAULT_SERVER_URL: &str = "ws://localhost:5001/ws";
pub const DEFAULT_MODEL: &str = "gemini";
pub const DEFAULT_WHISPER_MODEL: &str = "small";
pub const DEFAULT_TTS_VOICE: &str = "zh-CN-XiaoxiaoNeural";

/// User settings stored in `<config dir>/jarvis/config.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub server_url: String,
    pub model: String,
    pub whisper_model: String,
    pub tts_voice: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_root: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            whisper_model: DEFAULT_WHISPER_MODEL.to_string(),
            tts_voice: DEFAULT_TTS_VOICE.to_string(),
            data_root: None,
        }
    }
}

impl Settings {
    /// Load from the global config file, then apply environment overrides.
    pub fn load() -> Self {
        let settings = match config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        };
        settings.with_env_overrides()
    }

    /// Missing or malformed files yield defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Settings>(&content) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("Failed to parse config file at {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read config file at {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = config_path().ok_or_else(|| anyhow::anyhow!("Could not determine config dir"))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        ensure_parent(path)?;
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(SERVER_URL_ENV).ok(),
            std::env::var_os(ROOT_ENV).map(PathBuf::from),
        )
    }

    fn with_overrides(mut self, server_url: Option<String>, root: Option<PathBuf>) -> Self {
        if let Some(url) = server_url.filter(|u| !u.trim().is_empty()) {
            self.server_url = url;
        }
        if let Some(root) = root {
            self.data_root = Some(root);
        }
        self
    }

    /// Data root from settings, falling back to `jarvis_data` in the working directory.
    pub fn root(&self) -> PathBuf {
        self.data_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("jarvis_data"))
    }
}

/// Global configuration path
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("jarvis").join("config.json"))
}

pub fn state_dir(root: &Path) -> PathBuf {
    root.join("state")
}

/// Key-value state file used by the client's persistent store
pub fn state_path(root: &Path) -> PathBuf {
    state_dir(root).join("client.json")
}

pub fn logs_dir(root: &Path) -> PathBuf {
    root.join("logs")
}

/// Ensure a single directory exists
pub fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
        info!("Created directory: {:?}", path);
    }
    Ok(())
}

pub fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    Ok(())
}

/// Create the directory structure under `root`. Call once at startup.
pub fn init_structure(root: &Path) -> anyhow::Result<PathBuf> {
    ensure_dir(root)?;
    ensure_dir(&state_dir(root))?;
    ensure_dir(&logs_dir(root))?;

    let canonical = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    info!("Jarvis directory structure initialized at: {:?}", canonical);
    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.server_url, "ws://localhost:5001/ws");
        assert_eq!(s.model, "gemini");
        assert_eq!(s.whisper_model, "small");
        assert_eq!(s.tts_voice, "zh-CN-XiaoxiaoNeural");
        assert_eq!(s.root(), PathBuf::from("jarvis_data"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load_from(&dir.path().join("nope.json"));
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"model":"deepseek"}"#).unwrap();
        let s = Settings::load_from(&path);
        assert_eq!(s.model, "deepseek");
        assert_eq!(s.whisper_model, "small");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let s = Settings {
            server_url: "wss://example.test/ws".into(),
            data_root: Some(dir.path().to_path_buf()),
            ..Settings::default()
        };
        s.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), s);
    }

    #[test]
    fn test_overrides() {
        let s = Settings::default().with_overrides(
            Some("ws://10.0.0.2:5001/ws".into()),
            Some(PathBuf::from("/tmp/j")),
        );
        assert_eq!(s.server_url, "ws://10.0.0.2:5001/ws");
        assert_eq!(s.root(), PathBuf::from("/tmp/j"));

        let blank = Settings::default().with_overrides(Some("  ".into()), None);
        assert_eq!(blank.server_url, DEFAULT_SERVER_URL);
    }

    #[test]
    fn test_init_structure() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("data");
        init_structure(&root).unwrap();
        assert!(state_dir(&root).is_dir());
        assert!(logs_dir(&root).is_dir());
        assert!(state_path(&root).starts_with(state_dir(&root)));
    }
}
