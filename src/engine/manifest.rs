// src/engine/manifest.rs
use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use super::task::{ArtifactBinding, ParameterBinding, ParameterValue};
use super::workflow::{StageSpec, TaskGraph};
use crate::config::ExecutorConfig;
use crate::error::{FlowResult, FlowError};
use crate::slice::{SliceKey, SliceParams};

/// Task graph in the form the workflow backend accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowManifest {
    pub name: String,
    pub steps: Vec<StepManifest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepManifest {
    pub name: String,
    pub template: String,
    pub image: String,
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor: Option<ExecutorConfig>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub outputs: Vec<String>,
    pub invocations: Vec<InvocationManifest>,
}

/// One scheduled run of a step with all inputs spelled out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationManifest {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slice: Option<SliceParams>,
    /// Working directory of the invocation, created before it starts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,
    pub parameters: BTreeMap<String, ParameterValue>,
    pub artifacts: BTreeMap<String, ArtifactSource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactSource {
    /// Object already in the artifact store
    Stored { locator: String },
    /// Output of every invocation of `step`, in invocation order
    Collected { step: String, output: String, count: usize },
}

impl WorkflowManifest {
    pub fn from_graph(graph: &TaskGraph) -> FlowResult<Self> {
        let training = graph.training();
        let summary = graph.summary();

        let mut steps = vec![step(training, None, Vec::new())?];
        steps.push(step(
            summary,
            Some(training),
            vec![graph.edge().from.clone()],
        )?);

        Ok(Self {
            name: graph.name().to_string(),
            steps,
        })
    }

    pub fn step(&self, name: &str) -> Option<&StepManifest> {
        self.steps.iter().find(|step| step.name == name)
    }
}

fn step(stage: &StageSpec, upstream: Option<&StageSpec>, depends_on: Vec<String>) -> FlowResult<StepManifest> {
    let invocations = match stage.slicing() {
        Some(plan) => plan
            .iter()
            .map(|key| invocation(stage, upstream, Some(key)))
            .collect::<FlowResult<Vec<_>>>()?,
        None => vec![invocation(stage, upstream, None)?],
    };

    Ok(StepManifest {
        name: stage.name().to_string(),
        template: stage.template().contract.name.to_string(),
        image: stage.image().to_string(),
        command: stage.template().command.clone(),
        executor: stage.executor().cloned(),
        depends_on,
        outputs: stage.template().contract.output_names().into_iter().map(String::from).collect(),
        invocations,
    })
}

fn invocation(stage: &StageSpec, upstream: Option<&StageSpec>, key: Option<&SliceKey>) -> FlowResult<InvocationManifest> {
    let mut parameters = BTreeMap::new();
    for (name, binding) in stage.parameters() {
        let value = match (binding, key) {
            (ParameterBinding::Value { value }, _) => value.clone(),
            (ParameterBinding::SliceName, Some(key)) => ParameterValue::Text(key.name().to_string()),
            (ParameterBinding::SliceName, None) => {
                return Err(unsliced(stage, name));
            }
        };
        parameters.insert(name.clone(), value);
    }

    let mut artifacts = BTreeMap::new();
    for (name, binding) in stage.artifacts() {
        let source = match (binding, key) {
            (ArtifactBinding::Resolved { artifact }, _) => ArtifactSource::Stored {
                locator: artifact.locator().to_string(),
            },
            (ArtifactBinding::Sliced { artifacts }, Some(key)) => {
                let artifact = artifacts.get(key.order()).ok_or_else(|| {
                    FlowError::ConfigMismatch(format!("no {} artifact for slice {}", name, key.order()))
                })?;
                ArtifactSource::Stored { locator: artifact.locator().to_string() }
            }
            (ArtifactBinding::Sliced { .. }, None) => {
                return Err(unsliced(stage, name));
            }
            (ArtifactBinding::StageOutput { stage: from, output }, _) => ArtifactSource::Collected {
                step: from.clone(),
                output: output.clone(),
                count: upstream.map_or(0, StageSpec::invocations),
            },
        };
        artifacts.insert(name.clone(), source);
    }

    Ok(InvocationManifest {
        key: key.map_or_else(|| stage.name().to_string(), |key| key.step_key().to_string()),
        slice: key.map(SliceKey::params),
        sub_path: key.map(|key| key.sub_path().to_string()),
        parameters,
        artifacts,
    })
}

fn unsliced(stage: &StageSpec, binding: &str) -> FlowError {
    FlowError::ConfigMismatch(format!(
        "stage {} binds {} per slice but is not sliced",
        stage.name(),
        binding
    ))
}
