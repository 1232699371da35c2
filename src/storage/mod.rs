use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::info;

use crate::config::StorageConfig;

mod bucket;
mod cdn;
mod local;

pub use bucket::BucketStore;
pub use cdn::CdnStore;
pub use local::{LocalStore, UPLOADS_MOUNT};

/// A place uploaded blobs can be persisted to.
///
/// Implementations return a plain URL; nothing backend specific leaks into
/// the records that point at the blob.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn store(&self, body: Bytes, content_type: &str, file_name: &str)
        -> anyhow::Result<String>;

    fn backend(&self) -> &'static str;
}

pub async fn from_config(cfg: &StorageConfig) -> anyhow::Result<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match cfg {
        StorageConfig::Local {
            dir,
            public_base_url,
        } => Arc::new(LocalStore::new(dir, public_base_url).await?),
        StorageConfig::Bucket {
            bucket,
            endpoint,
            region,
            access_key,
            secret_key,
            public_base_url,
        } => Arc::new(
            BucketStore::new(
                endpoint.as_deref(),
                bucket,
                access_key,
                secret_key,
                region,
                public_base_url,
            )
            .await?,
        ),
        StorageConfig::Cdn {
            cloud_name,
            api_key,
            api_secret,
            folder,
            upload_url,
        } => Arc::new(CdnStore::new(upload_url, cloud_name, api_key, api_secret, folder)),
    };
    info!(backend = store.backend(), "blob storage ready");
    Ok(store)
}

/// Keeps only the final path component of a client supplied file name.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default().trim();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_whitespace() || c.is_control() { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "upload".to_string(),
        _ => cleaned,
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_file_name("photo.png"), "photo.png");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\face.jpg"), "face.jpg");
        assert_eq!(sanitize_file_name("my face.jpg"), "my_face.jpg");
        assert_eq!(sanitize_file_name(""), "upload");
        assert_eq!(sanitize_file_name("dir/.."), "upload");
    }

    #[tokio::test]
    async fn local_config_builds_local_store() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = StorageConfig::Local {
            dir: tmp.path().join("uploads"),
            public_base_url: "http://localhost:8080".into(),
        };
        let store = from_config(&cfg).await.unwrap();
        assert_eq!(store.backend(), "local");
        assert!(tmp.path().join("uploads").is_dir());
    }
}
