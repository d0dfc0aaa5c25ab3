use indexmap::IndexMap;
use serde::{Serialize, Deserialize};
use std::path::PathBuf;

use crate::artifact::ArtifactRef;

/// Workflow document passed on the command line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub train: TrainConfig,
    pub summary: SummaryConfig,
}

/// Training stage section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub template_script: PathBuf,
    /// Datasets in document order
    pub data_dict: IndexMap<String, DatasetSourceConfig>,
    pub image: String,
    #[serde(default)]
    pub executor: Option<ExecutorConfig>,
}

/// Summary stage section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    pub image: String,
    #[serde(default)]
    pub executor: Option<ExecutorConfig>,
}

/// Sources for one dataset. Both are required, but a missing one is reported
/// as a mismatch between the datasets and their artifacts rather than a parse failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSourceConfig {
    #[serde(default)]
    pub train: Option<ArtifactRefLiteral>,
    #[serde(default)]
    pub valid: Option<ArtifactRefLiteral>,
}

/// Either a remote locator (`oss://...`) or a local path / path list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArtifactRefLiteral {
    Single(String),
    Many(Vec<PathBuf>),
}

impl ArtifactRefLiteral {
    /// Interpret the literal against the store's remote scheme
    pub fn to_ref(&self, scheme: &str) -> ArtifactRef {
        match self {
            ArtifactRefLiteral::Single(value) => match value.strip_prefix(scheme) {
                Some(locator) => ArtifactRef::Remote { locator: locator.to_string() },
                None => ArtifactRef::Local { paths: vec![PathBuf::from(value)] },
            },
            ArtifactRefLiteral::Many(paths) => ArtifactRef::Local { paths: paths.clone() },
        }
    }
}

/// Opaque dispatch-target configuration, passed to the backend untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutorConfig(pub serde_json::Map<String, serde_json::Value>);

impl ExecutorConfig {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
