//! Key/value blob stores backing the document lead store

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::StatusCode;
use url::Url;

use super::{PersistenceError, PersistenceResult};

/// Flat namespace of named blobs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// `None` when the key does not exist.
    async fn get(&self, key: &str) -> PersistenceResult<Option<Vec<u8>>>;

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> PersistenceResult<()>;

    /// Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> PersistenceResult<()>;

    /// Keys starting with `prefix`.
    async fn list(&self, prefix: &str) -> PersistenceResult<Vec<String>>;

    async fn exists(&self, key: &str) -> PersistenceResult<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

/// Objects as files in one directory.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get(&self, key: &str) -> PersistenceResult<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, body: Vec<u8>, _content_type: &str) -> PersistenceResult<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.path_for(key);
        // write-then-rename so readers never see a half-written object
        let tmp = self.root.join(format!(".{key}.tmp"));
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("Wrote {}", path.display());
        Ok(())
    }

    async fn delete(&self, key: &str) -> PersistenceResult<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> PersistenceResult<Vec<String>> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if let Some(name) = entry.file_name().to_str()
                && name.starts_with(prefix)
            {
                keys.push(name.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> PersistenceResult<bool> {
        Ok(tokio::fs::try_exists(self.path_for(key)).await?)
    }
}

/// Objects behind a plain HTTP bucket endpoint.
///
/// `GET/PUT/DELETE {base}/{key}` address single objects and
/// `GET {base}?prefix=...` returns a JSON array of keys.
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: reqwest::Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl HttpObjectStore {
    pub fn new(base_url: &str, auth_token: Option<String>) -> PersistenceResult<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| PersistenceError::Config(format!("invalid object store URL '{base_url}': {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url,
            auth_token,
        })
    }

    /// `{base}/{key}` with the key percent-encoded as one path segment.
    fn object_url(&self, key: &str) -> PersistenceResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                PersistenceError::Config(format!(
                    "object store URL '{}' cannot carry object keys",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .push(key);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn check(status: StatusCode, key: &str) -> PersistenceResult<()> {
        if status.is_success() {
            Ok(())
        } else {
            Err(PersistenceError::RemoteStatus {
                status: status.as_u16(),
                key: key.to_string(),
            })
        }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn get(&self, key: &str) -> PersistenceResult<Option<Vec<u8>>> {
        let response = self
            .authorize(self.client.get(self.object_url(key)?))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::check(response.status(), key)?;
        Ok(Some(response.bytes().await?.to_vec()))
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> PersistenceResult<()> {
        let response = self
            .authorize(self.client.put(self.object_url(key)?))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;
        Self::check(response.status(), key)
    }

    async fn delete(&self, key: &str) -> PersistenceResult<()> {
        let response = self
            .authorize(self.client.delete(self.object_url(key)?))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check(response.status(), key)
    }

    async fn list(&self, prefix: &str) -> PersistenceResult<Vec<String>> {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().append_pair("prefix", prefix);

        let response = self.authorize(self.client.get(url)).send().await?;
        Self::check(response.status(), prefix)?;
        Ok(response.json::<Vec<String>>().await?)
    }

    async fn exists(&self, key: &str) -> PersistenceResult<bool> {
        let response = self
            .authorize(self.client.head(self.object_url(key)?))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::check(response.status(), key)?;
        Ok(true)
    }
}
