// src/fetch/mod.rs

use reqwest::Client;
use std::future::Future;
use tokio::fs;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

pub mod urls;
pub mod zips;

/// Fetch the body behind a URL. One attempt, no retries.
pub trait Transport {
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// `reqwest` for http(s); `file://` URLs are read from disk.
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get(&self, url: &Url) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::fetch(url, e))?
            .error_for_status()
            .map_err(|e| Error::fetch(url, e))?;
        let bytes = resp.bytes().await.map_err(|e| Error::fetch(url, e))?;
        Ok(bytes.to_vec())
    }

    async fn read_file(&self, url: &Url) -> Result<Vec<u8>> {
        let path = url
            .to_file_path()
            .map_err(|_| Error::fetch(url, "not a local file path"))?;
        fs::read(&path).await.map_err(|e| Error::fetch(url, e))
    }
}

impl Transport for HttpTransport {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        debug!(%url, "fetching");
        let body = match url.scheme() {
            "http" | "https" => self.get(url).await?,
            "file" => self.read_file(url).await?,
            other => return Err(Error::fetch(url, format!("unsupported scheme `{other}`"))),
        };
        if body.is_empty() {
            return Err(Error::fetch(url, "empty response body"));
        }
        debug!(%url, bytes = body.len(), "fetched");
        Ok(body)
    }
}
