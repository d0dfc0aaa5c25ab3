mod manifest;
mod submit;
mod task;
mod workflow;

pub use manifest::{WorkflowManifest, StepManifest, InvocationManifest, ArtifactSource};
pub use submit::{WorkflowBackend, WorkflowSubmitter, WorkflowHandle, HttpBackend, DryRunBackend};
#[cfg(test)]
pub use submit::MockWorkflowBackend;
pub use task::{
    ArtifactKind, ParameterKind, Slot, ArtifactSlot, ParameterSlot, TaskContract, TaskTemplate,
    ParameterValue, ParameterBinding, ArtifactBinding, TRAIN_CONTRACT, SUMMARY_CONTRACT
};
pub use workflow::{
    StageSpec, TaskGraph, Edge, EdgeArtifact, GraphShape, StageShape, GraphBuilder,
    TrainingSetup, SummarySetup, TRAIN_STAGE, SUMMARY_STAGE
};
