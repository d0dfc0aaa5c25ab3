use std::path::Path;
use tracing::{info, debug};

use super::schema::WorkflowConfig;
use crate::error::{FlowResult, FlowError};

/// Load and validate a workflow document
pub fn load_workflow(path: &Path) -> FlowResult<WorkflowConfig> {
    info!("Loading workflow configuration from {}", path.display());

    let json = std::fs::read_to_string(path)
        .map_err(|e| FlowError::ConfigError(format!("Failed to read {}: {}", path.display(), e)))?;

    parse_workflow(&json)
}

/// Parse and validate a workflow document held in memory
pub fn parse_workflow(json: &str) -> FlowResult<WorkflowConfig> {
    let config: WorkflowConfig = serde_json::from_str(json)
        .map_err(|e| FlowError::ConfigError(format!("Malformed workflow configuration: {}", e)))?;

    validate(&config)?;

    debug!("Workflow configuration lists {} datasets", config.train.data_dict.len());
    Ok(config)
}

fn validate(config: &WorkflowConfig) -> FlowResult<()> {
    if config.train.image.trim().is_empty() {
        return Err(FlowError::ConfigError("train.image must not be empty".to_string()));
    }
    if config.summary.image.trim().is_empty() {
        return Err(FlowError::ConfigError("summary.image must not be empty".to_string()));
    }
    if config.train.template_script.as_os_str().is_empty() {
        return Err(FlowError::ConfigError("train.template_script must not be empty".to_string()));
    }
    if let Some(name) = &config.name {
        if name.trim().is_empty() {
            return Err(FlowError::ConfigError("name must not be empty when given".to_string()));
        }
    }
    Ok(())
}
