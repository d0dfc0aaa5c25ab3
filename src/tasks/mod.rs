mod summary;
mod train;

pub use summary::{summarize, render, DatasetSummary};
pub use train::{
    run_train, rewrite_config, Trainer, StubTrainer, CommandTrainer,
    TrainTaskInput, TrainOutputs, INPUT_FILE, LOG_FILE, LCURVE_FILE
};
