// src/app.rs
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, debug};

use crate::artifact::{
    ArtifactRef, ArtifactResolver, ArtifactStore, FsArtifactStore, HttpArtifactStore,
};
use crate::config::{load_workflow, ExecutorConfig, Settings, WorkflowConfig};
use crate::dataset::{datasets_from_config, DatasetArtifacts};
use crate::engine::{
    DryRunBackend, GraphBuilder, HttpBackend, SummarySetup, TaskGraph, TrainingSetup,
    WorkflowBackend, WorkflowHandle, WorkflowSubmitter,
};
use crate::error::{FlowResult, FlowError};
use crate::tasks::{self, CommandTrainer, StubTrainer, TrainTaskInput, Trainer};

/// Resolve, plan, build and submit one workflow
pub struct Pipeline {
    resolver: ArtifactResolver,
    submitter: WorkflowSubmitter,
    settings: Settings,
}

impl Pipeline {
    pub fn new(store: Arc<dyn ArtifactStore>, backend: Arc<dyn WorkflowBackend>, settings: Settings) -> Self {
        Self {
            resolver: ArtifactResolver::new(store, settings.store.scheme.clone()),
            submitter: WorkflowSubmitter::new(backend),
            settings,
        }
    }

    /// Resolve every artifact and build the task graph. Any failure aborts the
    /// whole run; a partially resolved graph is never produced.
    pub async fn prepare(&self, config: &WorkflowConfig) -> FlowResult<TaskGraph> {
        let datasets = datasets_from_config(&config.train, &self.settings.store.scheme)?;

        let mut artifacts = Vec::with_capacity(datasets.len());
        for entry in &datasets {
            let training_data = self.resolver
                .resolve(&entry.train_source, &format!("Training data of {}", entry.name))
                .await?;
            let validation_data = self.resolver
                .resolve(&entry.valid_source, &format!("Validation data of {}", entry.name))
                .await?;
            artifacts.push(DatasetArtifacts { training_data, validation_data });
        }

        let script_ref = ArtifactRef::Local { paths: vec![config.train.template_script.clone()] };
        let script = self.resolver.resolve(&script_ref, "Template script").await?;

        let training = TrainingSetup {
            script,
            image: config.train.image.clone(),
            executor: present(&config.train.executor),
            command: self.train_command(),
        };
        let summary = SummarySetup {
            image: config.summary.image.clone(),
            executor: present(&config.summary.executor),
            command: self.settings.workflow.summary_command.clone(),
        };

        let name = config.name.clone().unwrap_or_else(|| self.settings.workflow.default_name.clone());
        GraphBuilder::new(name).build(&training, &datasets, &artifacts, &summary)
    }

    /// Build the graph and submit it once
    pub async fn run(&self, config: &WorkflowConfig) -> FlowResult<WorkflowHandle> {
        let graph = self.prepare(config).await?;
        self.submitter.submit(graph).await
    }

    fn train_command(&self) -> Vec<String> {
        let mut command = self.settings.workflow.train_command.clone();
        if let Some(trainer) = &self.settings.workflow.trainer_command {
            command.push("--trainer-command".to_string());
            command.push(trainer.clone());
        }
        command
    }
}

/// An empty executor object means the backend's default target
fn present(executor: &Option<ExecutorConfig>) -> Option<ExecutorConfig> {
    executor.as_ref().filter(|executor| !executor.is_empty()).cloned()
}

/// Commands understood by the application
#[derive(Debug, Clone)]
pub enum Command {
    Submit {
        config: PathBuf,
        dry_run: bool,
        manifest_out: Option<PathBuf>,
        local_store: Option<PathBuf>,
    },
    RunTrain {
        input: TrainTaskInput,
        trainer_command: Option<String>,
    },
    Summary {
        names: Vec<String>,
        logs: Vec<PathBuf>,
        lcurves: Vec<PathBuf>,
    },
    Init {
        force: bool,
    },
}

/// The main application struct
pub struct App {
    settings: Settings,
    settings_path: Option<PathBuf>,
}

impl App {
    /// Create the application with layered settings
    pub fn new(settings_path: Option<PathBuf>) -> FlowResult<Self> {
        let settings = Settings::load(settings_path.as_deref())?;
        Ok(Self { settings, settings_path })
    }

    /// Execute a command
    pub async fn run_command(&self, command: Command) -> FlowResult<()> {
        match command {
            Command::Submit { config, dry_run, manifest_out, local_store } => {
                let workflow = load_workflow(&config)?;

                let store: Arc<dyn ArtifactStore> = match local_store {
                    Some(dir) => {
                        info!("Using local artifact store at {}", dir.display());
                        Arc::new(FsArtifactStore::new(dir))
                    }
                    None => Arc::new(HttpArtifactStore::new(&self.settings.store)?),
                };
                let backend: Arc<dyn WorkflowBackend> = if dry_run {
                    Arc::new(DryRunBackend::new(manifest_out))
                } else {
                    Arc::new(HttpBackend::new(&self.settings.backend)?)
                };

                let pipeline = Pipeline::new(store, backend, self.settings.clone());
                let handle = pipeline.run(&workflow).await?;
                eprintln!("Workflow {} submitted with id {}", handle.name, handle.id);
            }
            Command::RunTrain { input, trainer_command } => {
                let trainer_command = trainer_command.or_else(|| self.settings.workflow.trainer_command.clone());
                let trainer: Box<dyn Trainer> = match trainer_command {
                    Some(cmd) => Box::new(CommandTrainer::new(cmd)),
                    None => Box::new(StubTrainer),
                };

                let outputs = tasks::run_train(&input, trainer.as_ref()).await?;
                let json = serde_json::to_string(&outputs)
                    .map_err(|e| FlowError::SerializationError(e.to_string()))?;
                println!("{}", json);
            }
            Command::Summary { names, logs, lcurves } => {
                debug!("names: {:?}", names);
                debug!("logs: {:?}", logs);
                debug!("lcurves: {:?}", lcurves);

                let summaries = tasks::summarize(&names, &logs, &lcurves)?;
                print!("{}", tasks::render(&summaries));
            }
            Command::Init { force } => {
                let path = Settings::init(self.settings_path.as_deref(), force)?;
                println!("Settings initialized at {}", path.display());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{MockArtifactStore, ResolvedArtifact};
    use crate::config::parse_workflow;
    use crate::engine::{MockWorkflowBackend, ParameterBinding, ParameterValue};

    const SCENARIO: &str = r#"{
        "train": {
            "template_script": "__SCRIPT__",
            "data_dict": {
                "A": {"train": "oss://x/a_train", "valid": "oss://x/a_valid"},
                "B": {"train": ["__LOCAL1__"], "valid": ["__LOCAL2__"]}
            },
            "image": "deepmd:latest",
            "executor": {}
        },
        "summary": {"image": "python:3.10"}
    }"#;

    fn scenario(dir: &std::path::Path) -> WorkflowConfig {
        let script = dir.join("input.json");
        std::fs::write(&script, r#"{"training": {}}"#).unwrap();
        for name in ["local1", "local2"] {
            std::fs::create_dir(dir.join(name)).unwrap();
        }
        let json = SCENARIO
            .replace("__SCRIPT__", &script.display().to_string())
            .replace("__LOCAL1__", &dir.join("local1").display().to_string())
            .replace("__LOCAL2__", &dir.join("local2").display().to_string());
        parse_workflow(&json).unwrap()
    }

    fn store_expecting_uploads(count: usize) -> MockArtifactStore {
        let mut store = MockArtifactStore::new();
        let mut next = 0;
        store.expect_upload()
            .times(count)
            .returning(move |_| {
                next += 1;
                Ok(format!("upload/{}", next))
            });
        store.expect_reference()
            .returning(|locator| ResolvedArtifact::referenced(locator));
        store
    }

    #[tokio::test]
    async fn test_mixed_remote_and_local_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let config = scenario(dir.path());

        // B's two path sets plus the template script
        let store = store_expecting_uploads(3);
        let backend = MockWorkflowBackend::new();
        let pipeline = Pipeline::new(Arc::new(store), Arc::new(backend), Settings::default());

        let graph = pipeline.prepare(&config).await.unwrap();
        assert_eq!(graph.name(), "dpa-test");
        assert_eq!(graph.training().invocations(), 2);
        assert!(graph.training().executor().is_none());
        assert_eq!(
            graph.summary().parameters().get("names"),
            Some(&ParameterBinding::Value {
                value: ParameterValue::TextList(vec!["A".to_string(), "B".to_string()])
            })
        );
    }

    #[tokio::test]
    async fn test_run_submits_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = scenario(dir.path());

        let store = store_expecting_uploads(3);
        let mut backend = MockWorkflowBackend::new();
        backend.expect_submit()
            .withf(|manifest| manifest.step("train").map(|s| s.invocations.len()) == Some(2))
            .times(1)
            .returning(|manifest| Ok(WorkflowHandle {
                id: "uid-1".to_string(),
                name: manifest.name.clone(),
                submitted_at: chrono::Utc::now(),
            }));

        let pipeline = Pipeline::new(Arc::new(store), Arc::new(backend), Settings::default());
        let handle = pipeline.run(&config).await.unwrap();
        assert_eq!(handle.id, "uid-1");
    }

    #[tokio::test]
    async fn test_resolution_failure_prevents_submission() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = scenario(dir.path());
        std::fs::remove_dir(dir.path().join("local2")).unwrap();
        config.name = Some("broken".to_string());

        // Only B's training data is uploaded before the missing path is hit
        let store = store_expecting_uploads(1);
        let mut backend = MockWorkflowBackend::new();
        backend.expect_submit().never();

        let pipeline = Pipeline::new(Arc::new(store), Arc::new(backend), Settings::default());
        let err = pipeline.run(&config).await.unwrap_err();
        assert!(matches!(err, FlowError::ResolutionError { .. }));
    }

    #[tokio::test]
    async fn test_trainer_command_is_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let config = scenario(dir.path());

        let mut settings = Settings::default();
        settings.workflow.trainer_command = Some("dp --pt train input.json".to_string());
        let pipeline = Pipeline::new(
            Arc::new(store_expecting_uploads(3)),
            Arc::new(MockWorkflowBackend::new()),
            settings,
        );

        let graph = pipeline.prepare(&config).await.unwrap();
        assert_eq!(
            graph.training().template().command,
            vec!["dpflow", "run-train", "--trainer-command", "dp --pt train input.json"]
        );
        assert_eq!(graph.summary().template().command, vec!["dpflow", "summary"]);
    }
}
