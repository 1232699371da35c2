use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

/// Upper bound for `JWT_TTL_MINUTES`: one year.
pub const MAX_TTL_MINUTES: i64 = 365 * 24 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Where uploaded employee images end up. Picked once at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    Local {
        dir: PathBuf,
        public_base_url: String,
    },
    Bucket {
        bucket: String,
        endpoint: Option<String>,
        region: String,
        access_key: String,
        secret_key: String,
        public_base_url: String,
    },
    Cdn {
        cloud_name: String,
        api_key: String,
        api_secret: String,
        folder: String,
        upload_url: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| get(key).with_context(|| format!("{key} must be set"));
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let host = or("APP_HOST", "0.0.0.0");
        let port = match get("APP_PORT") {
            Some(v) => v.parse::<u16>().with_context(|| format!("invalid APP_PORT {v}"))?,
            None => 8080,
        };

        let database_url = require("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: require("JWT_SECRET")?,
            issuer: or("JWT_ISSUER", "employee-api"),
            audience: or("JWT_AUDIENCE", "employee-api-users"),
            ttl_minutes: match get("JWT_TTL_MINUTES") {
                Some(v) => match v.parse::<i64>() {
                    Ok(m) if (1..=MAX_TTL_MINUTES).contains(&m) => m,
                    _ => anyhow::bail!(
                        "invalid JWT_TTL_MINUTES {v:?}: expected 1..={MAX_TTL_MINUTES}"
                    ),
                },
                None => 60,
            },
        };

        let backend = or("STORAGE_BACKEND", "local").to_lowercase();
        let storage = match backend.as_str() {
            "local" => StorageConfig::Local {
                dir: PathBuf::from(or("UPLOAD_DIR", "uploads")),
                public_base_url: get("PUBLIC_BASE_URL")
                    .unwrap_or_else(|| format!("http://localhost:{port}")),
            },
            "bucket" => StorageConfig::Bucket {
                bucket: require("BUCKET_NAME")?,
                endpoint: get("BUCKET_ENDPOINT"),
                region: or("BUCKET_REGION", "us-east-1"),
                access_key: require("BUCKET_ACCESS_KEY")?,
                secret_key: require("BUCKET_SECRET_KEY")?,
                public_base_url: or("BUCKET_PUBLIC_URL", "https://storage.googleapis.com"),
            },
            "cdn" => StorageConfig::Cdn {
                cloud_name: require("CDN_CLOUD_NAME")?,
                api_key: require("CDN_API_KEY")?,
                api_secret: require("CDN_API_SECRET")?,
                folder: or("CDN_FOLDER", "employees"),
                upload_url: or("CDN_UPLOAD_URL", "https://api.cloudinary.com/v1_1"),
            },
            other => anyhow::bail!("unknown STORAGE_BACKEND {other:?}"),
        };

        Ok(Self {
            host,
            port,
            database_url,
            jwt,
            storage,
        })
    }
}
