use std::path::{Component, Path, PathBuf};
use async_trait::async_trait;
use tracing::{info, debug, warn};
use url::Url;
use uuid::Uuid;

use super::{collect_files, ArtifactStore, ResolvedArtifact};
use crate::config::StoreSettings;
use crate::error::{FlowResult, FlowError};
use crate::utils::http::HttpClient;

/// Object store reached over HTTP. Every upload lands under a fresh
/// `upload/<uuid>` key inside the configured bucket.
pub struct HttpArtifactStore {
    client: HttpClient,
    base: Url,
    bucket: String,
}

impl HttpArtifactStore {
    pub fn new(settings: &StoreSettings) -> FlowResult<Self> {
        let base = Url::parse(&settings.endpoint)
            .map_err(|e| FlowError::ConfigError(format!("Invalid store endpoint {}: {}", settings.endpoint, e)))?;
        if base.cannot_be_a_base() {
            return Err(FlowError::ConfigError(format!("Store endpoint {} cannot be used as a base URL", settings.endpoint)));
        }

        let client = HttpClient::new(settings.timeout_seconds, None)
            .map_err(|e| FlowError::StoreUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            base,
            bucket: settings.bucket.clone(),
        })
    }

    /// URL of one file inside an uploaded object
    fn object_url(&self, key: &str, relative: &Path) -> FlowResult<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut()
                .map_err(|_| FlowError::ConfigError("Store endpoint cannot be used as a base URL".to_string()))?;
            segments.pop_if_empty().push(&self.bucket);
            segments.extend(key.split('/'));
            for component in relative.components() {
                if let Component::Normal(part) = component {
                    segments.push(&part.to_string_lossy());
                }
            }
        }
        Ok(url)
    }
}

/// Names the orphaned object when a set fails midway
fn partial(key: &str, stored: usize) -> String {
    if stored == 0 {
        String::new()
    } else {
        format!(" ({} files already stored under {})", stored, key)
    }
}

#[async_trait]
impl ArtifactStore for HttpArtifactStore {
    async fn upload(&self, paths: &[PathBuf]) -> FlowResult<String> {
        let key = format!("upload/{}", Uuid::new_v4());
        let files = collect_files(paths)?;
        debug!("Uploading {} files to {}", files.len(), key);

        for (stored, (source, relative)) in files.into_iter().enumerate() {
            let body = tokio::fs::read(&source).await
                .map_err(|e| FlowError::ResolutionError {
                    path: source.clone(),
                    message: format!("Failed to read file: {}{}", e, partial(&key, stored)),
                })?;
            let url = self.object_url(&key, &relative)?;

            let response = self.client.put_bytes(url.as_str(), body).await
                .map_err(|e| FlowError::StoreUnavailable(format!(
                    "Upload of {} failed: {:#}{}",
                    source.display(),
                    e,
                    partial(&key, stored)
                )))?;

            if !response.status().is_success() {
                warn!("Store rejected {} after {} files under {}", source.display(), stored, key);
                return Err(FlowError::ResolutionError {
                    path: source,
                    message: format!("Store rejected upload with status {}{}", response.status(), partial(&key, stored)),
                });
            }
        }

        info!("Stored {} objects under {}", paths.len(), key);
        Ok(key)
    }

    fn reference(&self, locator: &str) -> ResolvedArtifact {
        ResolvedArtifact::referenced(locator)
    }
}
