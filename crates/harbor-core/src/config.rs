//! Configuration module
//!
//! Configuration is read once at process start from environment variables
//! (optionally seeded from a `.env` file) and passed by reference to every
//! component that needs it. Nothing below the composition root reads the
//! environment on its own.

use std::env;

use crate::storage_types::StorageBackend;

const MAX_OBJECT_SIZE_MB: u64 = 5 * 1024;
const BYTES_PER_MB: u64 = 1024 * 1024;
const MAX_UPLOAD_SIZE_MB: usize = 100;
const STORAGE_RETRY_BACKOFF_MS: u64 = 200;
const THUMBNAIL_SIZE: u32 = 200;
const MEDIUM_MAX_WIDTH: u32 = 1200;
const THUMBNAIL_QUALITY: u8 = 75;
const MEDIUM_QUALITY: u8 = 85;
const VARIANT_BATCH_WORKERS: usize = 3;
const MAX_VARIANT_BATCH_WORKERS: usize = 5;
const VARIANT_URL_EXPIRY_SECS: u64 = 2 * 60 * 60;
const ORIGINAL_URL_EXPIRY_SECS: u64 = 60 * 60;
const DB_MAX_CONNECTIONS: u32 = 10;

/// Longest expiry object stores accept for a presigned URL.
pub const MAX_PRESIGN_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;

const DEFAULT_ALLOWED_EXTENSIONS: &str = "jpg,jpeg,png,webp,tiff,tif,bmp";
const DEV_URL_SIGNING_SECRET: &str = "harbor-development-url-signing-secret";

#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    // Storage
    pub storage_backend: StorageBackend,
    pub local_storage_path: String,
    pub local_storage_base_url: String,
    pub local_url_signing_secret: String,
    pub s3_bucket: Option<String>,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    pub r2_account_id: Option<String>,
    pub max_object_size_bytes: u64,
    pub storage_retry_backoff_ms: u64,
    // Upload intake
    pub max_upload_size_bytes: usize,
    pub allowed_extensions: Vec<String>,
    // Variants
    pub thumbnail_size: u32,
    pub medium_max_width: u32,
    pub thumbnail_quality: u8,
    pub medium_quality: u8,
    pub variant_sharpen: bool,
    pub variant_batch_workers: usize,
    // Serving
    pub variant_url_expiry_secs: u64,
    pub original_url_expiry_secs: u64,
    // Database (CLI only)
    pub database_url: Option<String>,
    pub db_max_connections: u32,
}

impl Config {
    /// Load configuration from the process environment, reading `.env` first.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let storage_backend = match lookup("STORAGE_BACKEND") {
            Some(value) => value.parse::<StorageBackend>()?,
            None => StorageBackend::Local,
        };

        let allowed_extensions = lookup("ALLOWED_EXTENSIONS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_EXTENSIONS.to_string())
            .split(',')
            .map(|s| s.trim().trim_start_matches('.').to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let max_object_size_mb = lookup("MAX_OBJECT_SIZE_MB")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(MAX_OBJECT_SIZE_MB);
        let max_upload_size_mb = lookup("MAX_UPLOAD_SIZE_MB")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(MAX_UPLOAD_SIZE_MB);

        let max_object_size_bytes = max_object_size_mb
            .checked_mul(BYTES_PER_MB)
            .ok_or_else(|| anyhow::anyhow!("MAX_OBJECT_SIZE_MB is too large"))?;
        let max_upload_size_bytes = max_upload_size_mb
            .checked_mul(BYTES_PER_MB as usize)
            .ok_or_else(|| anyhow::anyhow!("MAX_UPLOAD_SIZE_MB is too large"))?;

        let variant_batch_workers = lookup("VARIANT_BATCH_WORKERS")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(VARIANT_BATCH_WORKERS)
            .clamp(1, MAX_VARIANT_BATCH_WORKERS);

        let config = Config {
            storage_backend,
            local_storage_path: lookup("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|| "./storage".to_string()),
            local_storage_base_url: lookup("LOCAL_STORAGE_BASE_URL")
                .unwrap_or_else(|| "http://localhost:3000/files".to_string()),
            local_url_signing_secret: lookup("LOCAL_URL_SIGNING_SECRET")
                .unwrap_or_else(|| DEV_URL_SIGNING_SECRET.to_string()),
            s3_bucket: lookup("S3_BUCKET").filter(|s| !s.trim().is_empty()),
            s3_region: lookup("S3_REGION").unwrap_or_else(|| "auto".to_string()),
            s3_endpoint: lookup("S3_ENDPOINT").filter(|s| !s.trim().is_empty()),
            r2_account_id: lookup("R2_ACCOUNT_ID").filter(|s| !s.trim().is_empty()),
            max_object_size_bytes,
            storage_retry_backoff_ms: lookup("STORAGE_RETRY_BACKOFF_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(STORAGE_RETRY_BACKOFF_MS),
            max_upload_size_bytes,
            allowed_extensions,
            thumbnail_size: lookup("THUMBNAIL_SIZE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(THUMBNAIL_SIZE),
            medium_max_width: lookup("MEDIUM_MAX_WIDTH")
                .and_then(|s| s.parse().ok())
                .unwrap_or(MEDIUM_MAX_WIDTH),
            thumbnail_quality: lookup("THUMBNAIL_QUALITY")
                .and_then(|s| s.parse().ok())
                .unwrap_or(THUMBNAIL_QUALITY),
            medium_quality: lookup("MEDIUM_QUALITY")
                .and_then(|s| s.parse().ok())
                .unwrap_or(MEDIUM_QUALITY),
            variant_sharpen: lookup("VARIANT_SHARPEN")
                .map(|s| s.to_lowercase())
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
            variant_batch_workers,
            variant_url_expiry_secs: lookup("VARIANT_URL_EXPIRY_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(VARIANT_URL_EXPIRY_SECS),
            original_url_expiry_secs: lookup("ORIGINAL_URL_EXPIRY_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(ORIGINAL_URL_EXPIRY_SECS),
            database_url: lookup("DATABASE_URL").filter(|s| !s.trim().is_empty()),
            db_max_connections: lookup("DB_MAX_CONNECTIONS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DB_MAX_CONNECTIONS),
            environment,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    /// Endpoint for the object store: explicit `S3_ENDPOINT` first, then the
    /// Cloudflare R2 endpoint derived from `R2_ACCOUNT_ID`.
    pub fn s3_endpoint(&self) -> Option<String> {
        self.s3_endpoint.clone().or_else(|| {
            self.r2_account_id
                .as_ref()
                .map(|account| format!("https://{}.r2.cloudflarestorage.com", account))
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        match self.storage_backend {
            StorageBackend::ObjectStore => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using the object store backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.trim().is_empty() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.is_production() && self.local_url_signing_secret == DEV_URL_SIGNING_SECRET
                {
                    return Err(anyhow::anyhow!(
                        "LOCAL_URL_SIGNING_SECRET must be set in production"
                    ));
                }
            }
        }

        if self.local_url_signing_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "LOCAL_URL_SIGNING_SECRET must be at least 32 characters long"
            ));
        }

        if self.thumbnail_size == 0 || self.medium_max_width == 0 {
            return Err(anyhow::anyhow!(
                "THUMBNAIL_SIZE and MEDIUM_MAX_WIDTH must be greater than zero"
            ));
        }

        for (name, quality) in [
            ("THUMBNAIL_QUALITY", self.thumbnail_quality),
            ("MEDIUM_QUALITY", self.medium_quality),
        ] {
            if !(1..=100).contains(&quality) {
                return Err(anyhow::anyhow!("{} must be between 1 and 100", name));
            }
        }

        for (name, secs) in [
            ("VARIANT_URL_EXPIRY_SECS", self.variant_url_expiry_secs),
            ("ORIGINAL_URL_EXPIRY_SECS", self.original_url_expiry_secs),
        ] {
            if secs == 0 || secs > MAX_PRESIGN_EXPIRY_SECS {
                return Err(anyhow::anyhow!(
                    "{} must be between 1 and {} seconds",
                    name,
                    MAX_PRESIGN_EXPIRY_SECS
                ));
            }
        }

        if self.max_upload_size_bytes as u64 > self.max_object_size_bytes {
            return Err(anyhow::anyhow!(
                "MAX_UPLOAD_SIZE_MB cannot exceed MAX_OBJECT_SIZE_MB"
            ));
        }

        if self.allowed_extensions.is_empty() {
            return Err(anyhow::anyhow!("ALLOWED_EXTENSIONS cannot be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.storage_backend, StorageBackend::Local);
        assert_eq!(config.thumbnail_size, 200);
        assert_eq!(config.medium_max_width, 1200);
        assert_eq!(config.thumbnail_quality, 75);
        assert_eq!(config.medium_quality, 85);
        assert_eq!(config.variant_batch_workers, 3);
        assert_eq!(config.variant_url_expiry_secs, 7200);
        assert_eq!(config.original_url_expiry_secs, 3600);
        assert_eq!(config.max_object_size_bytes, 5 * 1024 * 1024 * 1024);
        assert!(config.variant_sharpen);
        assert!(config.allowed_extensions.contains(&"tif".to_string()));
    }

    #[test]
    fn test_oversized_limits_are_rejected() {
        let huge = u64::MAX.to_string();
        let result = Config::from_lookup(lookup_from(&[("MAX_OBJECT_SIZE_MB", huge.as_str())]));
        assert!(result.unwrap_err().to_string().contains("MAX_OBJECT_SIZE_MB"));

        let huge = usize::MAX.to_string();
        let result = Config::from_lookup(lookup_from(&[("MAX_UPLOAD_SIZE_MB", huge.as_str())]));
        assert!(result.unwrap_err().to_string().contains("MAX_UPLOAD_SIZE_MB"));

        let config = Config::from_lookup(lookup_from(&[("MAX_UPLOAD_SIZE_MB", "2")])).unwrap();
        assert_eq!(config.max_upload_size_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn test_worker_count_is_clamped() {
        let config = Config::from_lookup(lookup_from(&[("VARIANT_BATCH_WORKERS", "32")])).unwrap();
        assert_eq!(config.variant_batch_workers, 5);
        let config = Config::from_lookup(lookup_from(&[("VARIANT_BATCH_WORKERS", "0")])).unwrap();
        assert_eq!(config.variant_batch_workers, 1);
    }

    #[test]
    fn test_object_store_requires_bucket() {
        let result = Config::from_lookup(lookup_from(&[("STORAGE_BACKEND", "r2")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_r2_endpoint_is_derived_from_account() {
        let config = Config::from_lookup(lookup_from(&[
            ("STORAGE_BACKEND", "r2"),
            ("S3_BUCKET", "harbor"),
            ("R2_ACCOUNT_ID", "abc123"),
        ]))
        .unwrap();
        assert_eq!(config.storage_backend, StorageBackend::ObjectStore);
        assert_eq!(config.s3_region, "auto");
        assert_eq!(
            config.s3_endpoint().as_deref(),
            Some("https://abc123.r2.cloudflarestorage.com")
        );
    }

    #[test]
    fn test_explicit_endpoint_wins() {
        let config = Config::from_lookup(lookup_from(&[
            ("STORAGE_BACKEND", "s3"),
            ("S3_BUCKET", "harbor"),
            ("S3_ENDPOINT", "http://localhost:9000"),
            ("R2_ACCOUNT_ID", "abc123"),
        ]))
        .unwrap();
        assert_eq!(config.s3_endpoint().as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn test_production_requires_signing_secret() {
        let result = Config::from_lookup(lookup_from(&[("ENVIRONMENT", "production")]));
        assert!(result.is_err());

        let config = Config::from_lookup(lookup_from(&[
            ("ENVIRONMENT", "production"),
            (
                "LOCAL_URL_SIGNING_SECRET",
                "0123456789abcdef0123456789abcdef",
            ),
        ]))
        .unwrap();
        assert!(config.is_production());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        assert!(Config::from_lookup(lookup_from(&[("MEDIUM_QUALITY", "0")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("THUMBNAIL_SIZE", "0")])).is_err());
        assert!(
            Config::from_lookup(lookup_from(&[("VARIANT_URL_EXPIRY_SECS", "700000")])).is_err()
        );
    }

    #[test]
    fn test_invalid_backend_is_an_error() {
        assert!(Config::from_lookup(lookup_from(&[("STORAGE_BACKEND", "nfs")])).is_err());
    }
}
