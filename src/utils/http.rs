// src/utils/http.rs
use std::time::Duration;
use anyhow::{Result, Context};
use reqwest::{Client, Response, header};
use serde::Serialize;
use tracing::debug;

/// HTTP client shared by the artifact store and the workflow backend
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    bearer_token: Option<String>,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(timeout_secs: u64, bearer_token: Option<String>) -> Result<Self> {
        let user_agent = format!("dpflow/{}", env!("CARGO_PKG_VERSION"));

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(&user_agent)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, bearer_token })
    }

    /// Make a PUT request with a raw body
    pub async fn put_bytes(&self, url: &str, body: Vec<u8>) -> Result<Response> {
        debug!("PUT {} ({} bytes)", url, body.len());

        self.authorize(self.client.put(url))
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await
            .context(format!("Failed to PUT {}", url))
    }

    /// Make a POST request with JSON body
    pub async fn post_json<T: Serialize>(&self, url: &str, data: &T) -> Result<Response> {
        debug!("POST {}", url);

        self.authorize(self.client.post(url))
            .header(header::CONTENT_TYPE, "application/json")
            .json(data)
            .send()
            .await
            .context(format!("Failed to POST to {}", url))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Whether a request failed because the remote end could not be reached
pub fn is_unreachable(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause
            .downcast_ref::<reqwest::Error>()
            .map_or(false, |e| e.is_connect() || e.is_timeout())
    })
}
