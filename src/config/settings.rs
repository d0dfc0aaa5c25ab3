use serde::{Serialize, Deserialize};
use std::path::PathBuf;

/// Tool settings, layered from built-in defaults, a settings file and the environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub workflow: WorkflowSettings,
}

/// Artifact store connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    pub endpoint: String,
    pub bucket: String,
    /// Prefix marking a dataset reference as already resident in the store
    pub scheme: String,
    pub timeout_seconds: u64,
}

/// Workflow backend connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    pub endpoint: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub timeout_seconds: u64,
}

/// Defaults applied to every submitted workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSettings {
    pub default_name: String,
    pub train_command: Vec<String>,
    pub summary_command: Vec<String>,
    /// External training command run inside each slice; the stub trainer is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trainer_command: Option<String>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9000".to_string(),
            bucket: "dpflow".to_string(),
            scheme: "oss://".to_string(),
            timeout_seconds: 120,
        }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:2746".to_string(),
            namespace: "argo".to_string(),
            token: None,
            timeout_seconds: 30,
        }
    }
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            default_name: "dpa-test".to_string(),
            train_command: vec!["dpflow".to_string(), "run-train".to_string()],
            summary_command: vec!["dpflow".to_string(), "summary".to_string()],
            trainer_command: None,
        }
    }
}

impl Settings {
    /// Get the default settings path
    pub fn get_default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".dpflow/settings.toml")
    }
}
