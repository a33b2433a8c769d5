// Window configuration module
// Loads, sanitizes and persists the window geometry/state between sessions

use crate::geometry::{Geometry, WmState};
use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory name under the user's config dir
const CONFIG_DIR_NAME: &str = "stillview";
/// File holding the persisted window configuration
pub const CONFIG_FILE_NAME: &str = "window.json";

/// Built-in fallbacks used when the file is missing or holds garbage
const FALLBACK_GEOMETRY: &str = "800x600+100+100";
const FALLBACK_STATE: &str = "normal";
/// Matches the largest texture edge the renderer is happy with
const FALLBACK_ROI_SIZE: u32 = 4096;
/// Modifier-bit delta produced by pressing Control (X11 ControlMask)
pub const DEFAULT_CONTROL_CHORD: u32 = 4;

/// On-disk window configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub geometry: String,
    pub state: String,
    pub default_geometry: String,
    pub default_state: String,
    pub roi_size: u32,
    pub control_chord: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            geometry: FALLBACK_GEOMETRY.to_string(),
            state: FALLBACK_STATE.to_string(),
            default_geometry: FALLBACK_GEOMETRY.to_string(),
            default_state: FALLBACK_STATE.to_string(),
            roi_size: FALLBACK_ROI_SIZE,
            control_chord: DEFAULT_CONTROL_CHORD,
        }
    }
}

impl WindowConfig {
    /// Replace invalid values with defaults so getters never have to fail
    pub fn sanitize(&mut self) {
        if self.default_geometry.parse::<Geometry>().is_err() {
            warn!(
                "Invalid default geometry {:?}, using {}",
                self.default_geometry, FALLBACK_GEOMETRY
            );
            self.default_geometry = FALLBACK_GEOMETRY.to_string();
        }
        if WmState::parse(&self.default_state).is_none() {
            warn!(
                "Invalid default state {:?}, using {}",
                self.default_state, FALLBACK_STATE
            );
            self.default_state = FALLBACK_STATE.to_string();
        }
        if let Err(e) = self.geometry.parse::<Geometry>() {
            warn!("{}; falling back to {}", e, self.default_geometry);
            self.geometry = self.default_geometry.clone();
        }
        if WmState::parse(&self.state).is_none() {
            warn!(
                "Invalid window state {:?}, using {}",
                self.state, self.default_state
            );
            self.state = self.default_state.clone();
        }
        if self.roi_size == 0 {
            warn!("ROI size must be positive, using {}", FALLBACK_ROI_SIZE);
            self.roi_size = FALLBACK_ROI_SIZE;
        }
        if self.control_chord == 0 {
            warn!(
                "Control chord must be non-zero, using {}",
                DEFAULT_CONTROL_CHORD
            );
            self.control_chord = DEFAULT_CONTROL_CHORD;
        }
    }
}

/// Resolve `<config_dir>/stillview/window.json`
pub fn default_config_path() -> Result<PathBuf> {
    let base = dirs_next::config_dir().ok_or_else(|| anyhow!("no user config directory"))?;
    Ok(base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// In-memory window configuration with write-back to a JSON file.
///
/// Setters only touch memory. [`ConfigStore::flush`] writes the file through a
/// temporary sibling and a rename, and runs again on drop so the last values
/// survive every exit path.
#[derive(Debug)]
pub struct ConfigStore {
    path: Option<PathBuf>,
    config: WindowConfig,
    dirty: bool,
}

impl ConfigStore {
    /// Load from `path`, substituting defaults for anything missing or invalid
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (mut config, dirty) = match read_config(&path) {
            Ok(Some(config)) => (config, false),
            Ok(None) => {
                info!("No window config at {}, using defaults", path.display());
                (WindowConfig::default(), true)
            }
            Err(e) => {
                warn!("{:#}; using defaults", e);
                backup_unreadable(&path);
                (WindowConfig::default(), true)
            }
        };
        let before = config.clone();
        config.sanitize();

        Self {
            path: Some(path),
            dirty: dirty || before != config,
            config,
        }
    }

    /// A store that never touches the filesystem
    pub fn in_memory(mut config: WindowConfig) -> Self {
        config.sanitize();
        Self {
            path: None,
            config,
            dirty: false,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[cfg(test)]
    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    #[cfg(test)]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn geometry(&self) -> Geometry {
        parse_or_fallback(&self.config.geometry)
    }

    pub fn state(&self) -> WmState {
        WmState::parse(&self.config.state).unwrap_or_default()
    }

    pub fn default_geometry(&self) -> Geometry {
        parse_or_fallback(&self.config.default_geometry)
    }

    pub fn default_state(&self) -> WmState {
        WmState::parse(&self.config.default_state).unwrap_or_default()
    }

    pub fn roi_size(&self) -> u32 {
        self.config.roi_size
    }

    pub fn control_chord(&self) -> u32 {
        self.config.control_chord
    }

    pub fn set_geometry(&mut self, geometry: &Geometry) {
        let value = geometry.to_string();
        if self.config.geometry != value {
            debug!("Geometry {} -> {}", self.config.geometry, value);
            self.config.geometry = value;
            self.dirty = true;
        }
    }

    pub fn set_state(&mut self, state: WmState) {
        if self.config.state != state.as_str() {
            debug!("State {} -> {}", self.config.state, state);
            self.config.state = state.as_str().to_string();
            self.dirty = true;
        }
    }

    /// Write pending changes; a no-op for in-memory stores and clean state
    pub fn flush(&mut self) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            self.dirty = false;
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create config folder {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.config)
            .context("serialize window config")?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("replace window config {}", path.display()))?;

        debug!("Window config written to {}", path.display());
        self.dirty = false;
        Ok(())
    }
}

impl Drop for ConfigStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            error!("Failed to save window config: {:#}", e);
        }
    }
}

fn read_config(path: &Path) -> Result<Option<WindowConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("read window config {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    let config = serde_json::from_str(&content)
        .with_context(|| format!("parse window config {}", path.display()))?;
    Ok(Some(config))
}

/// Keep a copy of a config we could not use before defaults replace it
fn backup_unreadable(path: &Path) {
    let backup = path.with_extension("json.bak");
    match fs::copy(path, &backup) {
        Ok(_) => warn!("Unusable window config saved as {}", backup.display()),
        Err(e) => error!("Failed to back up {}: {}", path.display(), e),
    }
}

fn parse_or_fallback(value: &str) -> Geometry {
    value
        .parse()
        .or_else(|_| FALLBACK_GEOMETRY.parse())
        .unwrap_or(Geometry::new(800, 600, 100, 100))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults_and_is_written_on_flush() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut store = ConfigStore::load(&path);
        assert_eq!(store.config(), &WindowConfig::default());
        assert!(store.is_dirty());

        store.flush().expect("flush");
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
        assert!(!store.is_dirty());
    }

    #[test]
    fn invalid_values_are_replaced_by_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            r#"{"geometry":"huge","state":"iconic","default_geometry":"640x480+0+0","roi_size":0}"#,
        )
        .expect("write");

        let store = ConfigStore::load(&path);
        assert_eq!(store.geometry(), Geometry::new(640, 480, 0, 0));
        assert_eq!(store.state(), WmState::Normal);
        assert_eq!(store.roi_size(), FALLBACK_ROI_SIZE);
        assert_eq!(store.control_chord(), DEFAULT_CONTROL_CHORD);
    }

    #[test]
    fn corrupt_json_is_backed_up_and_replaced_by_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "{ not json").expect("write");

        let store = ConfigStore::load(&path);
        assert_eq!(store.config(), &WindowConfig::default());
        drop(store);

        let backup = fs::read_to_string(path.with_extension("json.bak")).expect("backup");
        assert_eq!(backup, "{ not json");
        assert_eq!(ConfigStore::load(&path).config(), &WindowConfig::default());
    }

    #[test]
    fn setters_only_mark_dirty_on_change() {
        let mut store = ConfigStore::in_memory(WindowConfig::default());
        store.set_state(WmState::Normal);
        assert!(!store.is_dirty());

        store.set_state(WmState::Zoomed);
        store.set_geometry(&Geometry::new(300, 200, 5, -5));
        assert!(store.is_dirty());
        assert_eq!(store.config().state, "zoomed");
        assert_eq!(store.config().geometry, "300x200+5-5");
    }

    #[test]
    fn drop_flushes_pending_changes() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(CONFIG_FILE_NAME);

        {
            let mut store = ConfigStore::load(&path);
            store.set_geometry(&Geometry::new(1024, 768, 10, 20));
            store.set_state(WmState::Zoomed);
        }

        let reloaded = ConfigStore::load(&path);
        assert_eq!(reloaded.geometry(), Geometry::new(1024, 768, 10, 20));
        assert_eq!(reloaded.state(), WmState::Zoomed);
        assert!(!reloaded.is_dirty());
    }
}
