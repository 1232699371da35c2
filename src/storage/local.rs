use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use super::BlobStore;

/// Path the uploads directory is served under.
pub const UPLOADS_MOUNT: &str = "/uploads";

#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
    public_base_url: String,
}

impl LocalStore {
    /// Creates the directory if it does not exist yet.
    pub async fn new(dir: impl AsRef<Path>, public_base_url: &str) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("create upload dir {}", dir.display()))?;
        Ok(Self {
            dir,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    #[cfg(test)]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn generated_name(file_name: &str, content_type: &str) -> String {
        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let ext = extension_of(file_name)
            .or_else(|| ext_from_mime(content_type).map(str::to_string))
            .unwrap_or_else(|| "bin".to_string());
        format!("{}-{}.{}", millis, Uuid::new_v4().simple(), ext)
    }
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn store(
        &self,
        body: Bytes,
        content_type: &str,
        file_name: &str,
    ) -> anyhow::Result<String> {
        let name = Self::generated_name(file_name, content_type);
        let path = self.dir.join(&name);

        if let Err(e) = fs::write(&path, &body).await {
            if fs::remove_file(&path).await.is_ok() {
                warn!(path = %path.display(), "removed partial upload");
            }
            return Err(e).with_context(|| format!("write {}", path.display()));
        }

        debug!(path = %path.display(), bytes = body.len(), "blob written");
        Ok(format!("{}{}/{}", self.public_base_url, UPLOADS_MOUNT, name))
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}

fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}
