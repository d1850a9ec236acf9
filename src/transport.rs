//! HTTP and filesystem capabilities consumed by the search engine
//!
//! The engine never talks to reqwest or the filesystem directly; it goes
//! through [`Transport`] and [`ArtifactStore`] so that tests can substitute
//! in-memory implementations.

use crate::config::SearchConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::Client;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Minimal HTTP capability
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a HEAD request bounded by `timeout` and return the status code.
    async fn head(&self, url: &str, timeout: Duration) -> Result<u16, TransportError>;

    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;

    /// POST `body` serialized as JSON with `Content-Type: application/json`.
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by a shared reqwest client
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &SearchConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| TransportError::Request {
                url: String::new(),
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }

    fn map_error(url: &str, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(url.to_string())
        } else {
            TransportError::Request {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }

    async fn read(url: &str, response: reqwest::Response) -> Result<HttpResponse, TransportError> {
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| Self::map_error(url, e))?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn head(&self, url: &str, timeout: Duration) -> Result<u16, TransportError> {
        let response = self
            .client
            .head(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Self::map_error(url, e))?;
        Ok(response.status().as_u16())
    }

    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::map_error(url, e))?;
        Self::read(url, response).await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| Self::map_error(url, e))?;
        Self::read(url, response).await
    }
}

/// Where downloaded library binaries end up
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Whether an artifact whose file name ends with `file_name` is present.
    async fn contains(&self, file_name: &str) -> io::Result<bool>;

    async fn write(&self, file_name: &str, content: &[u8]) -> io::Result<PathBuf>;
}

/// [`ArtifactStore`] rooted at a local directory
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ArtifactStore for DirectoryStore {
    async fn contains(&self, file_name: &str) -> io::Result<bool> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };

        // Prefixed copies like `remote_libc6_2.27-3ubuntu1_amd64.so` count too
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().ends_with(file_name) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn write(&self, file_name: &str, content: &[u8]) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.root.join(file_name);
        // Partial files must never satisfy `contains`
        let partial = self.root.join(format!(".{}.part", file_name));
        if let Err(e) = tokio::fs::write(&partial, content).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }
        tokio::fs::rename(&partial, &path).await?;
        Ok(path)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_response_helpers() {
        let ok = HttpResponse::new(200, "puts 5f0a0\n");
        assert!(ok.is_success());
        assert_eq!(ok.text(), "puts 5f0a0\n");

        assert!(HttpResponse::new(204, Vec::new()).is_success());
        assert!(!HttpResponse::new(301, Vec::new()).is_success());
        assert!(!HttpResponse::new(404, Vec::new()).is_success());
    }

    #[test]
    fn test_reqwest_transport_creation() {
        assert!(ReqwestTransport::new(&SearchConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_directory_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path());

        assert!(!store.contains("libc6_2.27-3ubuntu1_amd64.so").await.unwrap());

        let path = store
            .write("libc6_2.27-3ubuntu1_amd64.so", b"\x7fELF")
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("libc6_2.27-3ubuntu1_amd64.so"));
        assert_eq!(std::fs::read(&path).unwrap(), b"\x7fELF");
        assert!(store.contains("libc6_2.27-3ubuntu1_amd64.so").await.unwrap());
    }

    #[tokio::test]
    async fn test_directory_store_matches_suffix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("remote_libc6_2.31-0ubuntu9_amd64.so"), b"").unwrap();
        let store = DirectoryStore::new(dir.path());

        assert!(store.contains("libc6_2.31-0ubuntu9_amd64.so").await.unwrap());
        assert!(!store.contains("libc6_2.31-0ubuntu9_i386.so").await.unwrap());
    }

    #[tokio::test]
    async fn test_directory_store_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path().join("not-yet-created"));
        assert!(!store.contains("libc.so").await.unwrap());

        store.write("libc.so", b"data").await.unwrap();
        assert!(store.contains("libc.so").await.unwrap());
    }

    #[tokio::test]
    async fn test_directory_store_ignores_partial_writes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".libc6_2.27-3ubuntu1_amd64.so.part"), b"\x7fE").unwrap();
        let store = DirectoryStore::new(dir.path());

        assert!(!store.contains("libc6_2.27-3ubuntu1_amd64.so").await.unwrap());

        store
            .write("libc6_2.27-3ubuntu1_amd64.so", b"\x7fELF")
            .await
            .unwrap();
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["libc6_2.27-3ubuntu1_amd64.so"]);
        assert_eq!(
            std::fs::read(dir.path().join("libc6_2.27-3ubuntu1_amd64.so")).unwrap(),
            b"\x7fELF"
        );
    }
}
