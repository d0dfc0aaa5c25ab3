pub mod app;
pub mod artifact;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod slice;
pub mod tasks;
pub mod utils;

// Re-export main types for easier access
pub use app::{App, Command, Pipeline};
pub use artifact::{
    ArtifactRef,
    ArtifactResolver,
    ArtifactStore,
    ResolvedArtifact
};
pub use config::{Settings, WorkflowConfig};
pub use dataset::{DatasetEntry, DatasetArtifacts};
pub use engine::{
    GraphBuilder,
    TaskGraph,
    StageSpec,
    WorkflowBackend,
    WorkflowHandle,
    WorkflowSubmitter
};
pub use error::{FlowError, FlowResult};
pub use slice::{SlicePlan, SliceKey};
