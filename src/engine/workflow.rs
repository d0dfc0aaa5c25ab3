// src/engine/workflow.rs
use std::collections::BTreeMap;
use serde::Serialize;
use tracing::{info, debug};

use super::task::{
    ArtifactBinding, ParameterBinding, ParameterKind, ParameterValue, TaskTemplate,
    SUMMARY_CONTRACT, TRAIN_CONTRACT,
};
use crate::artifact::ResolvedArtifact;
use crate::config::ExecutorConfig;
use crate::dataset::{DatasetArtifacts, DatasetEntry};
use crate::error::{FlowResult, FlowError};
use crate::slice::{self, SlicePlan};

pub const TRAIN_STAGE: &str = "train";
pub const SUMMARY_STAGE: &str = "summary";

/// Resolved inputs of the training stage that are shared by every slice
#[derive(Debug, Clone)]
pub struct TrainingSetup {
    pub script: ResolvedArtifact,
    pub image: String,
    pub executor: Option<ExecutorConfig>,
    pub command: Vec<String>,
}

/// Summary stage settings
#[derive(Debug, Clone)]
pub struct SummarySetup {
    pub image: String,
    pub executor: Option<ExecutorConfig>,
    pub command: Vec<String>,
}

/// One node of the task graph, either sliced (fan-out) or a single invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSpec {
    name: String,
    template: TaskTemplate,
    image: String,
    executor: Option<ExecutorConfig>,
    slicing: Option<SlicePlan>,
    parameters: BTreeMap<String, ParameterBinding>,
    artifacts: BTreeMap<String, ArtifactBinding>,
}

impl StageSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &TaskTemplate {
        &self.template
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn executor(&self) -> Option<&ExecutorConfig> {
        self.executor.as_ref()
    }

    pub fn slicing(&self) -> Option<&SlicePlan> {
        self.slicing.as_ref()
    }

    pub fn parameters(&self) -> &BTreeMap<String, ParameterBinding> {
        &self.parameters
    }

    pub fn artifacts(&self) -> &BTreeMap<String, ArtifactBinding> {
        &self.artifacts
    }

    /// Number of task invocations the backend will schedule for this stage
    pub fn invocations(&self) -> usize {
        self.slicing.as_ref().map_or(1, SlicePlan::len)
    }

    /// Check every binding against the task contract.
    /// `upstream` is the stage whose outputs may be referenced.
    fn validate(&self, upstream: Option<&StageSpec>) -> FlowResult<()> {
        let contract = self.template.contract;

        for name in self.parameters.keys() {
            if contract.parameter(name).is_none() {
                return Err(mismatch(&self.name, format!("binds unknown parameter {}", name)));
            }
        }
        for slot in contract.parameters {
            let binding = self.parameters.get(slot.name)
                .ok_or_else(|| mismatch(&self.name, format!("leaves parameter {} unbound", slot.name)))?;
            let fits = match binding {
                ParameterBinding::Value { value } => value.kind() == slot.kind,
                ParameterBinding::SliceName => {
                    self.slicing.is_some() && slot.kind == ParameterKind::Text
                }
            };
            if !fits {
                return Err(mismatch(&self.name, format!("binds parameter {} with the wrong kind", slot.name)));
            }
        }

        for name in self.artifacts.keys() {
            if contract.input(name).is_none() {
                return Err(mismatch(&self.name, format!("binds unknown input artifact {}", name)));
            }
        }
        for slot in contract.inputs {
            let binding = self.artifacts.get(slot.name)
                .ok_or_else(|| mismatch(&self.name, format!("leaves input artifact {} unbound", slot.name)))?;
            match binding {
                ArtifactBinding::Resolved { .. } => {}
                ArtifactBinding::Sliced { artifacts } => {
                    let slices = self.slicing.as_ref().map(SlicePlan::len);
                    if slices != Some(artifacts.len()) {
                        return Err(mismatch(
                            &self.name,
                            format!("binds {} artifacts to {} but plans {:?} slices", artifacts.len(), slot.name, slices),
                        ));
                    }
                }
                ArtifactBinding::StageOutput { stage, output } => {
                    let source = upstream
                        .filter(|candidate| candidate.name == *stage)
                        .ok_or_else(|| mismatch(&self.name, format!("reads {} from unknown stage {}", slot.name, stage)))?;
                    let produced = source.template.contract.output(output)
                        .ok_or_else(|| mismatch(
                            &self.name,
                            format!("requests output {} which stage {} does not declare", output, stage),
                        ))?;
                    let delivered = if source.slicing.is_some() {
                        produced.kind.collected()
                    } else {
                        produced.kind
                    };
                    if delivered != slot.kind {
                        return Err(mismatch(&self.name, format!("input {} cannot accept {:?}", slot.name, delivered)));
                    }
                }
            }
        }

        Ok(())
    }
}

fn mismatch(stage: &str, message: String) -> FlowError {
    FlowError::ConfigMismatch(format!("stage {} {}", stage, message))
}

/// Artifact carried across an edge: upstream output -> downstream input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeArtifact {
    pub output: String,
    pub input: String,
}

/// Data dependency between two stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub artifacts: Vec<EdgeArtifact>,
}

/// Training stage, summary stage and the edge between them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskGraph {
    name: String,
    training: StageSpec,
    summary: StageSpec,
    edge: Edge,
}

impl TaskGraph {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn training(&self) -> &StageSpec {
        &self.training
    }

    pub fn summary(&self) -> &StageSpec {
        &self.summary
    }

    pub fn edge(&self) -> &Edge {
        &self.edge
    }

    /// Stages in dependency order
    pub fn stages(&self) -> [&StageSpec; 2] {
        [&self.training, &self.summary]
    }

    /// Structure of the graph without artifact handles, which may differ
    /// between builds when local data is re-uploaded
    pub fn shape(&self) -> GraphShape {
        GraphShape {
            name: self.name.clone(),
            stages: self.stages().iter().map(|stage| StageShape {
                name: stage.name.clone(),
                image: stage.image.clone(),
                invocations: stage.invocations(),
                slice_names: stage.slicing.as_ref().map(SlicePlan::names),
                parameters: stage.parameters.keys().cloned().collect(),
                inputs: stage.artifacts.keys().cloned().collect(),
                outputs: stage.template.contract.output_names(),
            }).collect(),
            edge: self.edge.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageShape {
    pub name: String,
    pub image: String,
    pub invocations: usize,
    pub slice_names: Option<Vec<String>>,
    pub parameters: Vec<String>,
    pub inputs: Vec<String>,
    pub outputs: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphShape {
    pub name: String,
    pub stages: Vec<StageShape>,
    pub edge: Edge,
}

/// Assembles the two-stage training graph
pub struct GraphBuilder {
    name: String,
    /// (summary input, training output) pairs carried across the edge
    collected: Vec<(String, String)>,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collected: vec![
                ("logs".to_string(), "log".to_string()),
                ("lcurves".to_string(), "lcurve".to_string()),
            ],
        }
    }

    /// Replace the training outputs the summary stage collects
    pub fn with_collected_outputs(mut self, pairs: &[(&str, &str)]) -> Self {
        self.collected = pairs
            .iter()
            .map(|(input, output)| (input.to_string(), output.to_string()))
            .collect();
        self
    }

    /// Build the graph. Fails with `ConfigMismatch` when datasets and artifacts
    /// are not index-aligned or the summary reads an undeclared training output.
    pub fn build(
        &self,
        training: &TrainingSetup,
        datasets: &[DatasetEntry],
        artifacts: &[DatasetArtifacts],
        summary: &SummarySetup,
    ) -> FlowResult<TaskGraph> {
        if datasets.len() != artifacts.len() {
            return Err(FlowError::ConfigMismatch(format!(
                "{} datasets but {} resolved artifact pairs",
                datasets.len(),
                artifacts.len()
            )));
        }

        let plan = slice::plan(datasets);
        debug!("Planned {} training slices", plan.len());

        let training_stage = Self::training_stage(training, plan.clone(), artifacts);

        let declared = training_stage.template.contract.output_names();
        for (_, output) in &self.collected {
            if !declared.contains(&output.as_str()) {
                return Err(FlowError::ConfigMismatch(format!(
                    "summary requests training output {} but training declares {:?}",
                    output, declared
                )));
            }
        }

        let summary_stage = self.summary_stage(summary, &plan);

        training_stage.validate(None)?;
        summary_stage.validate(Some(&training_stage))?;

        let edge = Edge {
            from: training_stage.name.clone(),
            to: summary_stage.name.clone(),
            artifacts: self.collected
                .iter()
                .map(|(input, output)| EdgeArtifact { output: output.clone(), input: input.clone() })
                .collect(),
        };

        info!(
            "Built workflow {} with {} training slices feeding {}",
            self.name,
            training_stage.invocations(),
            summary_stage.name
        );

        Ok(TaskGraph {
            name: self.name.clone(),
            training: training_stage,
            summary: summary_stage,
            edge,
        })
    }

    fn training_stage(training: &TrainingSetup, plan: SlicePlan, artifacts: &[DatasetArtifacts]) -> StageSpec {
        let parameters = BTreeMap::from([
            ("dataset_name".to_string(), ParameterBinding::SliceName),
        ]);
        let artifacts = BTreeMap::from([
            ("script".to_string(), ArtifactBinding::Resolved { artifact: training.script.clone() }),
            ("training_data".to_string(), ArtifactBinding::Sliced {
                artifacts: artifacts.iter().map(|pair| pair.training_data.clone()).collect(),
            }),
            ("validation_data".to_string(), ArtifactBinding::Sliced {
                artifacts: artifacts.iter().map(|pair| pair.validation_data.clone()).collect(),
            }),
        ]);

        StageSpec {
            name: TRAIN_STAGE.to_string(),
            template: TaskTemplate::new(&TRAIN_CONTRACT, training.command.clone()),
            image: training.image.clone(),
            executor: training.executor.clone(),
            slicing: Some(plan),
            parameters,
            artifacts,
        }
    }

    fn summary_stage(&self, summary: &SummarySetup, plan: &SlicePlan) -> StageSpec {
        let parameters = BTreeMap::from([
            ("names".to_string(), ParameterBinding::Value { value: ParameterValue::TextList(plan.names()) }),
        ]);
        let artifacts = self.collected
            .iter()
            .map(|(input, output)| {
                (input.clone(), ArtifactBinding::StageOutput {
                    stage: TRAIN_STAGE.to_string(),
                    output: output.clone(),
                })
            })
            .collect();

        StageSpec {
            name: SUMMARY_STAGE.to_string(),
            template: TaskTemplate::new(&SUMMARY_CONTRACT, summary.command.clone()),
            image: summary.image.clone(),
            executor: summary.executor.clone(),
            slicing: None,
            parameters,
            artifacts,
        }
    }
}
