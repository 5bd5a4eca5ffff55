use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use turtledown_core::{Endpoints, ROOT_ID};
use turtledown_render::{ViewConfig, DEFAULT_PIXEL_THRESHOLD};

// ---------------------------------------------------------------------------
// Application preferences
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppPreferences {
    #[serde(default = "default_window_width")]
    pub window_width: f32,
    #[serde(default = "default_window_height")]
    pub window_height: f32,
    /// Fetch over https. Ignored for any endpoint set explicitly below.
    #[serde(default = "default_true")]
    pub secure: bool,
    /// Image host override, e.g. a local mirror. Empty uses the default.
    #[serde(default)]
    pub image_endpoint: String,
    /// Metadata host override. Empty uses the default.
    #[serde(default)]
    pub metadata_endpoint: String,
    /// Fixed root seed. `None` draws a fresh one each session.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Scale above which tiles are drawn pixel by pixel.
    #[serde(default = "default_pixel_threshold")]
    pub pixel_threshold: f64,
    #[serde(default = "default_fetch_workers")]
    pub fetch_workers: usize,
    #[serde(default = "default_true")]
    pub show_hud: bool,
    /// HUD panel background opacity 0.0..=1.0 (default 0.65).
    #[serde(default = "default_hud_panel_opacity")]
    pub hud_panel_opacity: f32,
}

fn default_window_width() -> f32 {
    900.0
}
fn default_window_height() -> f32 {
    900.0
}
fn default_true() -> bool {
    true
}
fn default_pixel_threshold() -> f64 {
    DEFAULT_PIXEL_THRESHOLD
}
fn default_fetch_workers() -> usize {
    4
}
fn default_hud_panel_opacity() -> f32 {
    0.65
}

impl Default for AppPreferences {
    fn default() -> Self {
        Self {
            window_width: default_window_width(),
            window_height: default_window_height(),
            secure: true,
            image_endpoint: String::new(),
            metadata_endpoint: String::new(),
            seed: None,
            pixel_threshold: default_pixel_threshold(),
            fetch_workers: default_fetch_workers(),
            show_hud: true,
            hud_panel_opacity: default_hud_panel_opacity(),
        }
    }
}

impl AppPreferences {
    /// Load preferences from next to the executable, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(json) => match serde_json::from_str::<AppPreferences>(&json) {
                    Ok(prefs) => {
                        info!("Loaded preferences from {}", path.display());
                        return prefs;
                    }
                    Err(e) => {
                        error!("Failed to parse preferences: {e}");
                    }
                },
                Err(e) => {
                    error!("Failed to read preferences file: {e}");
                }
            }
        } else {
            debug!("No preferences file at {}", path.display());
        }
        Self::default()
    }

    /// Persist preferences to disk.
    pub fn save(&self) {
        self.save_to(&config_path());
    }

    fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory: {e}");
                return;
            }
        }
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, &json) {
                    error!("Failed to write preferences: {e}");
                } else {
                    debug!("Saved preferences");
                }
            }
            Err(e) => error!("Failed to serialize preferences: {e}"),
        }
    }

    pub fn endpoints(&self) -> Endpoints {
        let mut endpoints = Endpoints::for_transport(self.secure);
        if !self.image_endpoint.trim().is_empty() {
            endpoints.images = self.image_endpoint.trim().to_string();
        }
        if !self.metadata_endpoint.trim().is_empty() {
            endpoints.metadata = self.metadata_endpoint.trim().to_string();
        }
        endpoints
    }

    /// View settings for a new session, drawing a seed when none is pinned.
    pub fn view_config(&self) -> ViewConfig {
        ViewConfig {
            root_id: ROOT_ID.to_string(),
            endpoints: self.endpoints(),
            seed: self.seed.unwrap_or_else(session_seed),
            pixel_threshold: self.pixel_threshold,
            ..ViewConfig::default()
        }
    }
}

/// Fresh root seed when none is configured.
fn session_seed() -> u64 {
    rand::random()
}

fn config_path() -> PathBuf {
    crate::app_dir::exe_directory().join("preferences.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let prefs: AppPreferences = serde_json::from_str(r#"{"secure": false}"#).unwrap();
        assert!(!prefs.secure);
        assert_eq!(prefs.fetch_workers, 4);
        assert_eq!(prefs.pixel_threshold, DEFAULT_PIXEL_THRESHOLD);
        assert!(prefs.show_hud);
    }

    #[test]
    fn endpoint_overrides_win_over_transport() {
        let prefs = AppPreferences {
            secure: false,
            image_endpoint: " http://localhost:8000 ".into(),
            ..AppPreferences::default()
        };
        let endpoints = prefs.endpoints();
        assert_eq!(endpoints.images, "http://localhost:8000");
        assert_eq!(endpoints.metadata, Endpoints::for_transport(false).metadata);
    }

    #[test]
    fn pinned_seed_is_used() {
        let prefs = AppPreferences {
            seed: Some(99),
            ..AppPreferences::default()
        };
        assert_eq!(prefs.view_config().seed, 99);
    }

    #[test]
    fn unpinned_seed_changes_per_session() {
        let prefs = AppPreferences::default();
        assert_eq!(prefs.seed, None);
        assert_ne!(prefs.view_config().seed, prefs.view_config().seed);
    }

    #[test]
    fn save_then_load_keeps_every_field() {
        let dir = std::env::temp_dir().join("turtledown_test_prefs");
        let path = dir.join("preferences.json");
        let prefs = AppPreferences {
            seed: Some(5),
            fetch_workers: 2,
            show_hud: false,
            ..AppPreferences::default()
        };
        prefs.save_to(&path);
        assert_eq!(AppPreferences::load_from(&path), prefs);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn unreadable_file_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join("turtledown_test_prefs_bad");
        let _ = fs::create_dir_all(&dir);
        let path = dir.join("preferences.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(AppPreferences::load_from(&path), AppPreferences::default());
        let _ = fs::remove_dir_all(&dir);
    }
}
