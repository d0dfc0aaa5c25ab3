// src/engine/task.rs
use serde::{Serialize, Deserialize};

use crate::artifact::ResolvedArtifact;

/// Kind of file data carried by an artifact slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Path,
    PathList,
}

impl ArtifactKind {
    /// Kind seen downstream when this output is collected across all slices
    pub fn collected(self) -> ArtifactKind {
        ArtifactKind::PathList
    }
}

/// Kind of a plain parameter slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    Text,
    TextList,
}

/// Named, typed slot of a task contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Slot<K> {
    pub name: &'static str,
    pub kind: K,
}

pub type ArtifactSlot = Slot<ArtifactKind>;
pub type ParameterSlot = Slot<ParameterKind>;

/// Statically declared inputs and outputs of a task
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct TaskContract {
    pub name: &'static str,
    pub parameters: &'static [ParameterSlot],
    pub inputs: &'static [ArtifactSlot],
    pub outputs: &'static [ArtifactSlot],
}

impl TaskContract {
    pub fn parameter(&self, name: &str) -> Option<&ParameterSlot> {
        self.parameters.iter().find(|slot| slot.name == name)
    }

    pub fn input(&self, name: &str) -> Option<&ArtifactSlot> {
        self.inputs.iter().find(|slot| slot.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&ArtifactSlot> {
        self.outputs.iter().find(|slot| slot.name == name)
    }

    pub fn output_names(&self) -> Vec<&'static str> {
        self.outputs.iter().map(|slot| slot.name).collect()
    }
}

/// Train one dataset: rewrite the training config, run the trainer, keep log and learning curve
pub static TRAIN_CONTRACT: TaskContract = TaskContract {
    name: "run-train",
    parameters: &[
        Slot { name: "dataset_name", kind: ParameterKind::Text },
    ],
    inputs: &[
        Slot { name: "script", kind: ArtifactKind::Path },
        Slot { name: "training_data", kind: ArtifactKind::PathList },
        Slot { name: "validation_data", kind: ArtifactKind::PathList },
    ],
    outputs: &[
        Slot { name: "log", kind: ArtifactKind::Path },
        Slot { name: "lcurve", kind: ArtifactKind::Path },
    ],
};

/// Read-only aggregation over every training slice
pub static SUMMARY_CONTRACT: TaskContract = TaskContract {
    name: "summary",
    parameters: &[
        Slot { name: "names", kind: ParameterKind::TextList },
    ],
    inputs: &[
        Slot { name: "logs", kind: ArtifactKind::PathList },
        Slot { name: "lcurves", kind: ArtifactKind::PathList },
    ],
    outputs: &[],
};

/// Contract plus the command the stage image runs for it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskTemplate {
    pub contract: &'static TaskContract,
    pub command: Vec<String>,
}

impl TaskTemplate {
    pub fn new(contract: &'static TaskContract, command: Vec<String>) -> Self {
        Self { contract, command }
    }
}

/// Concrete parameter value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Text(String),
    TextList(Vec<String>),
}

impl ParameterValue {
    pub fn kind(&self) -> ParameterKind {
        match self {
            ParameterValue::Text(_) => ParameterKind::Text,
            ParameterValue::TextList(_) => ParameterKind::TextList,
        }
    }
}

/// How a parameter slot receives its value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum ParameterBinding {
    /// Same value for every invocation
    Value { value: ParameterValue },
    /// The display name of the invocation's slice key
    SliceName,
}

/// How an artifact slot receives its files
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum ArtifactBinding {
    /// Same artifact for every invocation
    Resolved { artifact: ResolvedArtifact },
    /// One artifact per slice key, in slice order
    Sliced { artifacts: Vec<ResolvedArtifact> },
    /// Collected outputs of an upstream stage, in that stage's slice order
    StageOutput { stage: String, output: String },
}
