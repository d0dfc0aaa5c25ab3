use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, debug};

use super::{ArtifactRef, ArtifactStore, ResolvedArtifact};
use crate::error::{FlowResult, FlowError};

/// Turns artifact references into store handles.
///
/// Failures are returned as-is; nothing is retried here.
pub struct ArtifactResolver {
    store: Arc<dyn ArtifactStore>,
    scheme: String,
}

impl ArtifactResolver {
    pub fn new(store: Arc<dyn ArtifactStore>, scheme: impl Into<String>) -> Self {
        Self {
            store,
            scheme: scheme.into(),
        }
    }

    /// Resolve a reference. `label` names the artifact in the upload audit log.
    pub async fn resolve(&self, artifact: &ArtifactRef, label: &str) -> FlowResult<ResolvedArtifact> {
        match artifact {
            ArtifactRef::Remote { locator } => {
                debug!("{} references {}{}", label, self.scheme, locator);
                Ok(self.store.reference(locator))
            }
            ArtifactRef::Local { paths } => {
                check_readable(paths)?;
                let locator = self.store.upload(paths).await?;
                info!("{} has been uploaded to {}{}", label, self.scheme, locator);
                Ok(self.store.reference(&locator).into_uploaded())
            }
        }
    }
}

fn check_readable(paths: &[PathBuf]) -> FlowResult<()> {
    if paths.is_empty() {
        return Err(FlowError::ResolutionError {
            path: PathBuf::new(),
            message: "No local paths given".to_string(),
        });
    }
    for path in paths {
        check_path(path)?;
    }
    Ok(())
}

fn check_path(path: &Path) -> FlowResult<()> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| FlowError::ResolutionError {
            path: path.to_path_buf(),
            message: format!("Path does not exist: {}", e),
        })?;

    let readable = if metadata.is_dir() {
        std::fs::read_dir(path).map(|_| ())
    } else {
        std::fs::File::open(path).map(|_| ())
    };

    readable.map_err(|e| FlowError::ResolutionError {
        path: path.to_path_buf(),
        message: format!("Path is not readable: {}", e),
    })
}
