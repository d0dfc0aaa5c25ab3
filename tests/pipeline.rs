// tests/pipeline.rs
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use async_trait::async_trait;

use dpflow::artifact::{ArtifactStore, FsArtifactStore, ResolvedArtifact};
use dpflow::config::{parse_workflow, Settings};
use dpflow::engine::{
    ArtifactSource, DryRunBackend, ParameterValue, WorkflowBackend, WorkflowHandle, WorkflowManifest,
};
use dpflow::error::{FlowError, FlowResult};
use dpflow::Pipeline;

/// Filesystem store that counts uploads
struct CountingStore {
    inner: FsArtifactStore,
    uploads: AtomicUsize,
}

impl CountingStore {
    fn new(root: &Path) -> Self {
        Self { inner: FsArtifactStore::new(root), uploads: AtomicUsize::new(0) }
    }

    fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactStore for CountingStore {
    async fn upload(&self, paths: &[PathBuf]) -> FlowResult<String> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        self.inner.upload(paths).await
    }

    fn reference(&self, locator: &str) -> ResolvedArtifact {
        self.inner.reference(locator)
    }
}

#[derive(Default)]
struct RecordingBackend {
    submitted: Mutex<Vec<WorkflowManifest>>,
}

#[async_trait]
impl WorkflowBackend for RecordingBackend {
    async fn submit(&self, manifest: &WorkflowManifest) -> FlowResult<WorkflowHandle> {
        self.submitted.lock().unwrap().push(manifest.clone());
        Ok(WorkflowHandle {
            id: "wf-1".to_string(),
            name: manifest.name.clone(),
            submitted_at: chrono::Utc::now(),
        })
    }
}

fn workspace(dir: &Path) -> (PathBuf, PathBuf) {
    let script = dir.join("input.json");
    std::fs::write(&script, r#"{"training": {"numb_steps": 10}}"#).unwrap();

    let data = dir.join("data");
    for sub in ["train/sys0", "valid/sys0"] {
        std::fs::create_dir_all(data.join(sub)).unwrap();
        std::fs::write(data.join(sub).join("box.npy"), b"0").unwrap();
    }
    (script, data)
}

fn config_json(script: &Path, data: &Path) -> String {
    format!(
        r#"{{
            "name": "mixed",
            "train": {{
                "template_script": "{script}",
                "data_dict": {{
                    "A": {{"train": "oss://x/a_train", "valid": "oss://x/a_valid"}},
                    "B": {{"train": ["{train}"], "valid": ["{valid}"]}}
                }},
                "image": "deepmd:latest",
                "executor": {{}}
            }},
            "summary": {{"image": "python:3.10"}}
        }}"#,
        script = script.display(),
        train = data.join("train").display(),
        valid = data.join("valid").display(),
    )
}

#[tokio::test]
async fn test_mixed_datasets_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let (script, data) = workspace(dir.path());
    let config = parse_workflow(&config_json(&script, &data)).unwrap();

    let store = Arc::new(CountingStore::new(&dir.path().join("store")));
    let backend = Arc::new(RecordingBackend::default());
    let pipeline = Pipeline::new(store.clone(), backend.clone(), Settings::default());

    let handle = pipeline.run(&config).await.unwrap();
    assert_eq!(handle.name, "mixed");
    assert_eq!(store.uploads(), 3);

    let submitted = backend.submitted.lock().unwrap();
    assert_eq!(submitted.len(), 1);
    let manifest = &submitted[0];

    let train = manifest.step("train").unwrap();
    assert_eq!(train.invocations.len(), 2);
    assert!(train.executor.is_none());
    assert_eq!(
        train.invocations[0].parameters.get("dataset_name"),
        Some(&ParameterValue::Text("A".to_string()))
    );
    assert_eq!(
        train.invocations[0].artifacts.get("training_data"),
        Some(&ArtifactSource::Stored { locator: "x/a_train".to_string() })
    );
    assert_ne!(train.invocations[0].sub_path, train.invocations[1].sub_path);

    // B's training data was uploaded into the store
    let uploaded = match train.invocations[1].artifacts.get("training_data") {
        Some(ArtifactSource::Stored { locator }) => locator.clone(),
        other => panic!("unexpected source {:?}", other),
    };
    assert!(uploaded.starts_with("upload/"));
    let object = FsArtifactStore::new(dir.path().join("store")).object_path(&uploaded);
    assert!(object.join("0/train/sys0/box.npy").is_file());

    let summary = manifest.step("summary").unwrap();
    assert_eq!(summary.depends_on, vec!["train".to_string()]);
    assert_eq!(summary.invocations.len(), 1);
    let invocation = &summary.invocations[0];
    assert_eq!(
        invocation.parameters.get("names"),
        Some(&ParameterValue::TextList(vec!["A".to_string(), "B".to_string()]))
    );
    assert_eq!(
        invocation.artifacts.get("logs"),
        Some(&ArtifactSource::Collected { step: "train".to_string(), output: "log".to_string(), count: 2 })
    );
    assert_eq!(
        invocation.artifacts.get("lcurves"),
        Some(&ArtifactSource::Collected { step: "train".to_string(), output: "lcurve".to_string(), count: 2 })
    );
}

#[tokio::test]
async fn test_empty_data_dict_still_submits_summary() {
    let dir = tempfile::tempdir().unwrap();
    let (script, _) = workspace(dir.path());
    let json = format!(
        r#"{{
            "train": {{"template_script": "{}", "data_dict": {{}}, "image": "deepmd:latest"}},
            "summary": {{"image": "python:3.10"}}
        }}"#,
        script.display()
    );
    let config = parse_workflow(&json).unwrap();

    let store = Arc::new(CountingStore::new(&dir.path().join("store")));
    let backend = Arc::new(RecordingBackend::default());
    let pipeline = Pipeline::new(store.clone(), backend.clone(), Settings::default());

    let handle = pipeline.run(&config).await.unwrap();
    assert_eq!(handle.name, "dpa-test");
    assert_eq!(store.uploads(), 1);

    let submitted = backend.submitted.lock().unwrap();
    let manifest = &submitted[0];
    assert!(manifest.step("train").unwrap().invocations.is_empty());
    assert_eq!(
        manifest.step("summary").unwrap().invocations[0].parameters.get("names"),
        Some(&ParameterValue::TextList(Vec::new()))
    );
}

#[tokio::test]
async fn test_missing_validation_source_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (script, _) = workspace(dir.path());
    let json = format!(
        r#"{{
            "train": {{
                "template_script": "{}",
                "data_dict": {{"A": {{"train": "oss://x/a_train"}}}},
                "image": "deepmd:latest"
            }},
            "summary": {{"image": "python:3.10"}}
        }}"#,
        script.display()
    );
    let config = parse_workflow(&json).unwrap();

    let backend = Arc::new(RecordingBackend::default());
    let pipeline = Pipeline::new(
        Arc::new(CountingStore::new(&dir.path().join("store"))),
        backend.clone(),
        Settings::default(),
    );

    let err = pipeline.run(&config).await.unwrap_err();
    assert!(matches!(err, FlowError::ConfigMismatch(_)));
    assert!(backend.submitted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_dry_run_writes_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let (script, data) = workspace(dir.path());
    let config = parse_workflow(&config_json(&script, &data)).unwrap();
    let out = dir.path().join("manifest.json");

    let pipeline = Pipeline::new(
        Arc::new(FsArtifactStore::new(dir.path().join("store"))),
        Arc::new(DryRunBackend::new(Some(out.clone()))),
        Settings::default(),
    );

    let handle = pipeline.run(&config).await.unwrap();
    assert!(handle.id.starts_with("dry-run-"));

    let manifest: WorkflowManifest = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(manifest.name, "mixed");
    let keys: Vec<&str> = manifest.step("train").unwrap()
        .invocations
        .iter()
        .map(|invocation| invocation.key.as_str())
        .collect();
    assert_eq!(keys, vec!["train-a", "train-b"]);
}
