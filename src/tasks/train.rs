// src/tasks/train.rs
use std::path::{Path, PathBuf};
use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use serde_json::{json, Value};
use tracing::{info, debug};

use crate::error::{FlowResult, FlowError};
use crate::utils::shell::execute_command_in;

/// Rewritten training configuration handed to the trainer
pub const INPUT_FILE: &str = "input.json";
/// Output files captured as the `log` and `lcurve` artifacts
pub const LOG_FILE: &str = "log";
pub const LCURVE_FILE: &str = "lcurve.out";

/// Inputs of one training slice as delivered by the backend
#[derive(Debug, Clone)]
pub struct TrainTaskInput {
    pub dataset_name: String,
    pub script: PathBuf,
    pub training_data: Vec<PathBuf>,
    pub validation_data: Vec<PathBuf>,
    pub work_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainOutputs {
    pub log: PathBuf,
    pub lcurve: PathBuf,
}

/// The training procedure itself, run once per slice inside its working directory
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Trainer: Send + Sync {
    async fn train(&self, dataset_name: &str, input: &Path, work_dir: &Path) -> FlowResult<()>;
}

/// Writes placeholder outputs without training anything
pub struct StubTrainer;

#[async_trait]
impl Trainer for StubTrainer {
    async fn train(&self, dataset_name: &str, _input: &Path, work_dir: &Path) -> FlowResult<()> {
        debug!("Stub training for {}", dataset_name);
        write_file(&work_dir.join(LOG_FILE), format!("This is log for {}", dataset_name)).await?;
        write_file(&work_dir.join(LCURVE_FILE), format!("This is lcurve for {}", dataset_name)).await?;
        Ok(())
    }
}

/// Runs an external training command, e.g. `dp --pt train input.json`
pub struct CommandTrainer {
    command: String,
}

impl CommandTrainer {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into() }
    }
}

#[async_trait]
impl Trainer for CommandTrainer {
    async fn train(&self, dataset_name: &str, _input: &Path, work_dir: &Path) -> FlowResult<()> {
        info!("Training {} with: {}", dataset_name, self.command);

        let output = execute_command_in(&self.command, work_dir).await
            .map_err(|e| FlowError::ExternalToolError {
                tool: self.command.clone(),
                message: format!("{:#}", e),
            })?;

        if !output.status.success() {
            return Err(FlowError::ExternalToolError {
                tool: self.command.clone(),
                message: format!(
                    "exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}

/// Point the configuration's dataset paths at the received artifacts
pub fn rewrite_config(mut config: Value, training_data: &[PathBuf], validation_data: &[PathBuf]) -> FlowResult<Value> {
    let training = config.get_mut("training")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| FlowError::ConfigError("Training configuration has no training section".to_string()))?;

    for (section, paths) in [("training_data", training_data), ("validation_data", validation_data)] {
        let systems: Vec<Value> = paths
            .iter()
            .map(|path| Value::String(path.to_string_lossy().into_owned()))
            .collect();

        let entry = training.entry(section).or_insert_with(|| json!({}));
        let entry = entry.as_object_mut()
            .ok_or_else(|| FlowError::ConfigError(format!("training.{} must be an object", section)))?;
        entry.insert("systems".to_string(), Value::Array(systems));
    }

    Ok(config)
}

/// Run one training slice: rewrite config, train, collect outputs
pub async fn run_train(input: &TrainTaskInput, trainer: &dyn Trainer) -> FlowResult<TrainOutputs> {
    info!("Training dataset {} in {}", input.dataset_name, input.work_dir.display());

    tokio::fs::create_dir_all(&input.work_dir).await
        .map_err(|e| FlowError::FileError {
            path: input.work_dir.clone(),
            message: format!("Failed to create working directory: {}", e),
        })?;

    let script = tokio::fs::read_to_string(&input.script).await
        .map_err(|e| FlowError::FileError {
            path: input.script.clone(),
            message: format!("Failed to read training configuration: {}", e),
        })?;
    let config: Value = serde_json::from_str(&script)
        .map_err(|e| FlowError::ConfigError(format!("Malformed training configuration: {}", e)))?;

    let config = rewrite_config(config, &input.training_data, &input.validation_data)?;

    let input_path = input.work_dir.join(INPUT_FILE);
    write_file(&input_path, to_pretty_json(&config)?).await?;

    trainer.train(&input.dataset_name, &input_path, &input.work_dir).await?;

    let outputs = TrainOutputs {
        log: input.work_dir.join(LOG_FILE),
        lcurve: input.work_dir.join(LCURVE_FILE),
    };
    for path in [&outputs.log, &outputs.lcurve] {
        if !path.is_file() {
            return Err(FlowError::TaskError {
                task: format!("run-train {}", input.dataset_name),
                message: format!("{} was not produced", path.display()),
            });
        }
    }

    Ok(outputs)
}

fn to_pretty_json(value: &Value) -> FlowResult<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)
        .map_err(|e| FlowError::SerializationError(format!("Failed to serialize training configuration: {}", e)))?;
    String::from_utf8(buf)
        .map_err(|e| FlowError::SerializationError(e.to_string()))
}

async fn write_file(path: &Path, contents: String) -> FlowResult<()> {
    tokio::fs::write(path, contents).await
        .map_err(|e| FlowError::FileError {
            path: path.to_path_buf(),
            message: format!("Failed to write file: {}", e),
        })
}
