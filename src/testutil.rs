//! Shared fixtures for unit tests.

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use url::Url;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use crate::error::{Error, Result};
use crate::fetch::Transport;

pub fn init_test_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,gpscraper=debug")),
        )
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Build an in-memory zip from `(name, contents)` pairs.
pub fn zip_archive(files: &[(&str, &str)]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, contents) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buf
}

/// Serves canned bodies by URL and records what was asked for.
#[derive(Default)]
pub struct MockTransport {
    bodies: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn with(mut self, url: &str, body: impl AsRef<[u8]>) -> Self {
        self.bodies.insert(url.to_string(), body.as_ref().to_vec());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(url.to_string());
        self.bodies
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| Error::fetch(url, "404 Not Found"))
    }
}
