// src/config/mod.rs
mod loader;
mod schema;
mod settings;

use std::path::{Path, PathBuf};
use config::{Config as ConfigLoader, FileFormat};
use tracing::{info, warn};

pub use loader::{load_workflow, parse_workflow};
pub use schema::{
    WorkflowConfig, TrainConfig, SummaryConfig,
    DatasetSourceConfig, ArtifactRefLiteral, ExecutorConfig
};
pub use settings::{Settings, StoreSettings, BackendSettings, WorkflowSettings};

use crate::error::{FlowResult, FlowError};

/// Centralized settings handling
impl Settings {
    /// Load settings from a file, falling back to the built-in defaults
    pub fn load(settings_path: Option<&Path>) -> FlowResult<Self> {
        info!("Loading settings");

        let mut builder = ConfigLoader::builder();

        // Default settings
        builder = builder.add_source(
            config::File::from_str(
                include_str!("../../config/default.toml"),
                FileFormat::Toml
            )
        );

        // User-provided settings
        if let Some(path) = settings_path {
            if path.exists() {
                builder = builder.add_source(config::File::from(path));
                info!("Loading user settings from: {}", path.display());
            } else {
                warn!("Specified settings file not found: {}", path.display());
            }
        } else {
            let default_path = Self::get_default_path();
            if default_path.exists() {
                builder = builder.add_source(config::File::from(default_path.as_path()));
                info!("Loading default settings from: {}", default_path.display());
            }
        }

        // Environment variables, e.g. DPFLOW__BACKEND__ENDPOINT
        builder = builder.add_source(
            config::Environment::with_prefix("DPFLOW").prefix_separator("__").separator("__")
        );

        let settings: Settings = match builder.build() {
            Ok(c) => match c.try_deserialize() {
                Ok(settings) => settings,
                Err(e) => return Err(FlowError::ConfigError(format!("Failed to parse settings: {}", e))),
            },
            Err(e) => return Err(FlowError::ConfigError(format!("Failed to build settings: {}", e))),
        };

        Ok(settings)
    }

    /// Write the default settings file
    pub fn init(path: Option<&Path>, force: bool) -> FlowResult<PathBuf> {
        let settings_path = path.map(Path::to_path_buf).unwrap_or_else(Self::get_default_path);

        if let Some(parent) = settings_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| FlowError::FileError {
                    path: parent.to_path_buf(),
                    message: format!("Failed to create directory: {}", e),
                })?;
        }

        if settings_path.exists() && !force {
            return Err(FlowError::ConfigError(
                format!("Settings already exist at {}. Use --force to overwrite.", settings_path.display())
            ));
        }

        Settings::default().save(&settings_path)?;

        Ok(settings_path)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> FlowResult<()> {
        let settings_str = toml::to_string_pretty(self)
            .map_err(|e| FlowError::SerializationError(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(path, settings_str)
            .map_err(|e| FlowError::FileError {
                path: path.to_path_buf(),
                message: format!("Failed to write settings: {}", e),
            })?;

        info!("Settings saved to {}", path.display());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(Some(&dir.path().join("missing.toml"))).unwrap();

        assert_eq!(settings.store.scheme, "oss://");
        assert_eq!(settings.workflow.default_name, "dpa-test");
        assert_eq!(settings.workflow.train_command, vec!["dpflow", "run-train"]);
        assert!(settings.workflow.trainer_command.is_none());
    }

    #[test]
    fn test_user_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[backend]\nnamespace = \"ml\"\n").unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.backend.namespace, "ml");
        assert_eq!(settings.backend.endpoint, "http://127.0.0.1:2746");
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/settings.toml");

        let written = Settings::init(Some(&path), false).unwrap();
        assert_eq!(written, path);

        let err = Settings::init(Some(&path), false).unwrap_err();
        assert!(matches!(err, FlowError::ConfigError(_)));

        Settings::init(Some(&path), true).unwrap();
        let reloaded = Settings::load(Some(&path)).unwrap();
        assert_eq!(reloaded.store.bucket, "dpflow");
    }
}
