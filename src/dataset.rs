// src/dataset.rs
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::artifact::{ArtifactRef, ResolvedArtifact};
use crate::config::TrainConfig;
use crate::error::{FlowResult, FlowError};

/// One named dataset of the training stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub name: String,
    pub train_source: ArtifactRef,
    pub valid_source: ArtifactRef,
}

/// Resolved inputs of one dataset, index-aligned with its `DatasetEntry`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetArtifacts {
    pub training_data: ResolvedArtifact,
    pub validation_data: ResolvedArtifact,
}

/// Build dataset entries in `data_dict` order
pub fn datasets_from_config(train: &TrainConfig, scheme: &str) -> FlowResult<Vec<DatasetEntry>> {
    let mut entries = Vec::with_capacity(train.data_dict.len());

    for (name, sources) in &train.data_dict {
        if name.trim().is_empty() {
            return Err(FlowError::ConfigError("Dataset names must not be empty".to_string()));
        }

        let train_source = sources.train.as_ref()
            .ok_or_else(|| FlowError::ConfigMismatch(format!("Dataset {} has no train source", name)))?
            .to_ref(scheme);
        let valid_source = sources.valid.as_ref()
            .ok_or_else(|| FlowError::ConfigMismatch(format!("Dataset {} has no valid source", name)))?
            .to_ref(scheme);

        for source in [&train_source, &valid_source] {
            if matches!(source, ArtifactRef::Local { paths } if paths.is_empty()) {
                return Err(FlowError::ConfigError(format!("Dataset {} lists an empty path set", name)));
            }
        }

        entries.push(DatasetEntry {
            name: name.clone(),
            train_source,
            valid_source,
        });
    }

    debug!("Parsed {} dataset entries", entries.len());
    Ok(entries)
}
