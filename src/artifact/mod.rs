// src/artifact/mod.rs
mod http;
mod local;
mod resolver;

use std::path::{Path, PathBuf};
use async_trait::async_trait;
use serde::{Serialize, Deserialize};

use crate::error::{FlowResult, FlowError};

pub use http::HttpArtifactStore;
pub use local::FsArtifactStore;
pub use resolver::ArtifactResolver;

/// Reference to dataset files, either already in the store or on local disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactRef {
    /// Already resident in the artifact store
    Remote { locator: String },
    /// Must be uploaded before a task can bind it
    Local { paths: Vec<PathBuf> },
}

/// How a resolved artifact came to exist in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactOrigin {
    Referenced,
    Uploaded,
}

/// Store handle bindable to a task input.
///
/// Two handles are equal when they point at the same locator with the same
/// origin. Uploading the same local files twice produces two different
/// locators, so handles for `Local` references are not stable across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedArtifact {
    locator: String,
    origin: ArtifactOrigin,
}

impl ResolvedArtifact {
    pub fn referenced(locator: impl Into<String>) -> Self {
        Self { locator: locator.into(), origin: ArtifactOrigin::Referenced }
    }

    pub(crate) fn into_uploaded(self) -> Self {
        Self { origin: ArtifactOrigin::Uploaded, ..self }
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn origin(&self) -> ArtifactOrigin {
        self.origin
    }
}

/// Content store that artifacts are uploaded to and referenced from
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Upload a set of paths as one object and return its locator
    async fn upload(&self, paths: &[PathBuf]) -> FlowResult<String>;

    /// Bind a handle to an existing locator without moving data
    fn reference(&self, locator: &str) -> ResolvedArtifact;
}

/// Expand a path set into `(source file, object-relative path)` pairs.
/// Member `i` of the set lands under `<i>/<file name>`, so members sharing a
/// leaf name stay apart. Directories are walked recursively; a member with no
/// files in it is rejected.
pub(crate) fn collect_files(paths: &[PathBuf]) -> FlowResult<Vec<(PathBuf, PathBuf)>> {
    let mut files = Vec::new();
    for (index, path) in paths.iter().enumerate() {
        let name = path.file_name()
            .ok_or_else(|| FlowError::ResolutionError {
                path: path.clone(),
                message: "Path has no file name".to_string(),
            })?;
        let before = files.len();
        walk(path, &PathBuf::from(index.to_string()).join(name), &mut files)?;
        if files.len() == before {
            return Err(FlowError::ResolutionError {
                path: path.clone(),
                message: "Path contains no files".to_string(),
            });
        }
    }
    Ok(files)
}

fn walk(path: &Path, relative: &Path, files: &mut Vec<(PathBuf, PathBuf)>) -> FlowResult<()> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| FlowError::ResolutionError {
            path: path.to_path_buf(),
            message: format!("Failed to stat path: {}", e),
        })?;

    if metadata.is_file() {
        files.push((path.to_path_buf(), relative.to_path_buf()));
        return Ok(());
    }

    let mut entries = std::fs::read_dir(path)
        .map_err(|e| FlowError::ResolutionError {
            path: path.to_path_buf(),
            message: format!("Failed to read directory: {}", e),
        })?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| FlowError::ResolutionError {
            path: path.to_path_buf(),
            message: format!("Failed to read directory entry: {}", e),
        })?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        walk(&entry.path(), &relative.join(entry.file_name()), files)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_files_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        let set = dir.path().join("set.000");
        std::fs::create_dir_all(set.join("nested")).unwrap();
        std::fs::write(set.join("type.raw"), "0\n").unwrap();
        std::fs::write(set.join("nested/coord.npy"), "xyz").unwrap();
        let single = dir.path().join("extra.txt");
        std::fs::write(&single, "x").unwrap();

        let files = collect_files(&[set.clone(), single.clone()]).unwrap();
        let relative: Vec<PathBuf> = files.iter().map(|(_, rel)| rel.clone()).collect();
        assert_eq!(relative, vec![
            PathBuf::from("0/set.000/nested/coord.npy"),
            PathBuf::from("0/set.000/type.raw"),
            PathBuf::from("1/extra.txt"),
        ]);
        assert_eq!(files[2].0, single);
    }

    #[test]
    fn test_collect_files_keeps_same_named_members_apart() {
        let dir = tempfile::tempdir().unwrap();
        for (system, coord) in [("water", "WATER"), ("ice", "ICE")] {
            let sys = dir.path().join(system).join("sys");
            std::fs::create_dir_all(&sys).unwrap();
            std::fs::write(sys.join("coord.raw"), coord).unwrap();
        }

        let files = collect_files(&[dir.path().join("water/sys"), dir.path().join("ice/sys")]).unwrap();
        let relative: Vec<PathBuf> = files.iter().map(|(_, rel)| rel.clone()).collect();
        assert_eq!(relative, vec![PathBuf::from("0/sys/coord.raw"), PathBuf::from("1/sys/coord.raw")]);
        assert_eq!(files[0].0, dir.path().join("water/sys/coord.raw"));
    }

    #[test]
    fn test_collect_files_rejects_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("local1");
        std::fs::create_dir_all(empty.join("nested")).unwrap();

        let err = collect_files(&[empty.clone()]).unwrap_err();
        assert!(matches!(err, FlowError::ResolutionError { path, .. } if path == empty));
    }

    #[test]
    fn test_collect_files_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let err = collect_files(&[missing.clone()]).unwrap_err();
        assert!(matches!(err, FlowError::ResolutionError { path, .. } if path == missing));
    }
}
