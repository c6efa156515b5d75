//! Configuration types for the workspace coordination core.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for a document session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Debounced persistence settings.
    pub autosave: AutosaveConfig,
    /// Selection broadcast settings.
    pub selection: SelectionConfig,
}

/// Auto-save controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    /// Whether auto-save is active. When false both `notify_content_changed`
    /// and `force_save` are no-ops.
    pub enabled: bool,
    /// Quiet period after the last edit before a save fires, in ms.
    pub debounce_ms: u64,
    /// How long the `Saved` state is displayed before returning to `Idle`, in ms.
    pub saved_display_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 3000,
            saved_display_ms: 2000,
        }
    }
}

/// Selection broadcast emitter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Quiet period after the last native selection signal before the
    /// selection is read and broadcast, in ms.
    pub debounce_ms: u64,
    /// Label for the originating surface, carried on emitted events.
    pub surface: String,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            surface: "editor".to_owned(),
        }
    }
}

impl WorkspaceConfig {
    /// Load configuration from a TOML file. Missing sections fall back to
    /// defaults; unknown keys are ignored.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::QuillError::Config(e.to_string()))
    }

    /// Serialize to a pretty TOML string.
    pub fn to_toml_string(&self) -> crate::error::Result<String> {
        toml::to_string_pretty(self).map_err(|e| crate::error::QuillError::Config(e.to_string()))
    }

    /// Write configuration to a TOML file.
    pub fn save(&self, path: &Path) -> crate::error::Result<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn defaults_match_documented_windows() {
        let config = WorkspaceConfig::default();
        assert!(config.autosave.enabled);
        assert_eq!(config.autosave.debounce_ms, 3000);
        assert_eq!(config.autosave.saved_display_ms, 2000);
        assert_eq!(config.selection.debounce_ms, 300);
        assert_eq!(config.selection.surface, "editor");
    }

    #[test]
    fn toml_round_trip_preserves_fields() {
        let mut config = WorkspaceConfig::default();
        config.autosave.debounce_ms = 500;
        config.selection.surface = "sidebar".to_owned();

        let toml_str = config.to_toml_string().unwrap();
        let loaded: WorkspaceConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(loaded.autosave.debounce_ms, 500);
        assert_eq!(loaded.selection.surface, "sidebar");
    }

    #[test]
    fn partial_toml_uses_section_defaults() {
        let config: WorkspaceConfig = toml::from_str(
            r#"
            [autosave]
            debounce_ms = 100
            "#,
        )
        .unwrap();
        assert_eq!(config.autosave.debounce_ms, 100);
        // Untouched fields keep their defaults.
        assert!(config.autosave.enabled);
        assert_eq!(config.selection.debounce_ms, 300);
    }

    #[test]
    fn load_and_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quill.toml");

        let mut config = WorkspaceConfig::default();
        config.autosave.enabled = false;
        config.save(&path).unwrap();

        let loaded = WorkspaceConfig::load(&path).unwrap();
        assert!(!loaded.autosave.enabled);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let result = WorkspaceConfig::load(Path::new("/nonexistent/quill.toml"));
        assert!(matches!(result, Err(crate::error::QuillError::Io(_))));
    }
}
