use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    types::ObjectCannedAcl,
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use tracing::debug;
use uuid::Uuid;

use super::{sanitize_file_name, BlobStore};

const KEY_PREFIX: &str = "employee_images";

/// Object storage bucket reached through the S3 API. Objects are made
/// publicly readable after upload.
#[derive(Clone)]
pub struct BucketStore {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl BucketStore {
    pub async fn new(
        endpoint: Option<&str>,
        bucket: &str,
        access_key: &str,
        secret_key: &str,
        region: &str,
        public_base_url: &str,
    ) -> anyhow::Result<Self> {
        let mut loader = defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(Credentials::new(
                access_key, secret_key, None, None, "static",
            ));
        if let Some(endpoint) = endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        let conf = S3ConfigBuilder::from(&shared)
            .force_path_style(endpoint.is_some())
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: bucket.to_string(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }
}

fn object_key(file_name: &str) -> String {
    format!(
        "{}/{}_{}",
        KEY_PREFIX,
        Uuid::new_v4(),
        sanitize_file_name(file_name)
    )
}

fn public_url(base: &str, bucket: &str, key: &str) -> String {
    format!("{}/{}/{}", base, bucket, key)
}

#[async_trait]
impl BlobStore for BucketStore {
    async fn store(
        &self,
        body: Bytes,
        content_type: &str,
        file_name: &str,
    ) -> anyhow::Result<String> {
        let key = object_key(file_name);
        let len = body.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .with_context(|| format!("s3 put_object {}", key))?;

        self.client
            .put_object_acl()
            .bucket(&self.bucket)
            .key(&key)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .with_context(|| format!("s3 put_object_acl {}", key))?;

        debug!(bucket = %self.bucket, key = %key, bytes = len, "object uploaded");
        Ok(public_url(&self.public_base_url, &self.bucket, &key))
    }

    fn backend(&self) -> &'static str {
        "bucket"
    }
}
