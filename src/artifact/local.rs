use std::path::{Path, PathBuf};
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::{collect_files, ArtifactStore, ResolvedArtifact};
use crate::error::{FlowResult, FlowError};

/// Artifact store backed by a local directory, for dry runs and tests
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the object behind `locator`
    pub fn object_path(&self, locator: &str) -> PathBuf {
        locator.split('/').fold(self.root.clone(), |path, part| path.join(part))
    }

    async fn copy_file(source: &Path, target: &Path) -> FlowResult<()> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await
                .map_err(|e| FlowError::StoreUnavailable(format!("Failed to create {}: {}", parent.display(), e)))?;
        }
        tokio::fs::copy(source, target).await
            .map_err(|e| FlowError::ResolutionError {
                path: source.to_path_buf(),
                message: format!("Failed to copy into store: {}", e),
            })?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn upload(&self, paths: &[PathBuf]) -> FlowResult<String> {
        let locator = format!("upload/{}", Uuid::new_v4());
        let object = self.object_path(&locator);
        let files = collect_files(paths)?;

        tokio::fs::create_dir_all(&object).await
            .map_err(|e| FlowError::StoreUnavailable(format!("Failed to create {}: {}", object.display(), e)))?;

        for (source, relative) in files {
            Self::copy_file(&source, &object.join(relative)).await?;
        }

        debug!("Copied {} paths into {}", paths.len(), object.display());
        Ok(locator)
    }

    fn reference(&self, locator: &str) -> ResolvedArtifact {
        ResolvedArtifact::referenced(locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_copies_tree() {
        let source = tempfile::tempdir().unwrap();
        let set = source.path().join("local1");
        std::fs::create_dir_all(set.join("set.000")).unwrap();
        std::fs::write(set.join("type.raw"), "0 1").unwrap();
        std::fs::write(set.join("set.000/box.npy"), "box").unwrap();

        let root = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(root.path());
        let locator = store.upload(&[set]).await.unwrap();

        assert!(locator.starts_with("upload/"));
        let object = store.object_path(&locator);
        assert_eq!(std::fs::read_to_string(object.join("0/local1/type.raw")).unwrap(), "0 1");
        assert_eq!(std::fs::read_to_string(object.join("0/local1/set.000/box.npy")).unwrap(), "box");
    }

    #[tokio::test]
    async fn test_same_named_systems_are_both_stored() {
        let source = tempfile::tempdir().unwrap();
        let mut set = Vec::new();
        for (system, coord) in [("water", "WATER"), ("ice", "ICE")] {
            let sys = source.path().join(system).join("sys");
            std::fs::create_dir_all(&sys).unwrap();
            std::fs::write(sys.join("coord.raw"), coord).unwrap();
            set.push(sys);
        }

        let root = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(root.path());
        let object = store.object_path(&store.upload(&set).await.unwrap());

        let entries = std::fs::read_dir(&object).unwrap().count();
        assert_eq!(entries, 2);
        assert_eq!(std::fs::read_to_string(object.join("0/sys/coord.raw")).unwrap(), "WATER");
        assert_eq!(std::fs::read_to_string(object.join("1/sys/coord.raw")).unwrap(), "ICE");
    }

    #[tokio::test]
    async fn test_empty_directory_is_not_stored() {
        let source = tempfile::tempdir().unwrap();
        let empty = source.path().join("local1");
        std::fs::create_dir(&empty).unwrap();

        let root = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(root.path());
        let err = store.upload(&[empty]).await.unwrap_err();
        assert!(matches!(err, FlowError::ResolutionError { .. }));
        assert!(!root.path().join("upload").exists());
    }

    #[tokio::test]
    async fn test_each_upload_gets_a_new_locator() {
        let source = tempfile::tempdir().unwrap();
        let file = source.path().join("input.json");
        std::fs::write(&file, "{}").unwrap();

        let root = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(root.path());
        let first = store.upload(&[file.clone()]).await.unwrap();
        let second = store.upload(&[file]).await.unwrap();
        assert_ne!(first, second);
    }
}
