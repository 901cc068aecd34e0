//! Configuration module
//!
//! Environment-driven configuration for the upload service: server, storage backend,
//! upstream record server, local working directories and temp-file reclamation.

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::storage_types::StorageBackend;

const DEFAULT_PORT: u16 = 3000;
const NOTIFY_TIMEOUT_SECS: u64 = 30;
const TEMP_MAX_AGE_HOURS: u64 = 24;
const MAX_FILES_PER_UPLOAD: usize = 4;
const MAX_UPLOAD_SIZE_MB: usize = 100;
const UPLOAD_DIR: &str = "./uploads";
const TEMP_DIR_NAME: &str = "vitrine-upload-temp";

/// How the temp-file reaper gives back working files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReclaimMode {
    /// Relocate on Windows, unlink elsewhere
    Auto,
    Unlink,
    Relocate,
}

impl ReclaimMode {
    /// Resolve `Auto` against the current platform.
    pub fn resolve(self) -> ReclaimMode {
        match self {
            ReclaimMode::Auto if cfg!(windows) => ReclaimMode::Relocate,
            ReclaimMode::Auto => ReclaimMode::Unlink,
            other => other,
        }
    }
}

impl FromStr for ReclaimMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(ReclaimMode::Auto),
            "unlink" => Ok(ReclaimMode::Unlink),
            "relocate" => Ok(ReclaimMode::Relocate),
            _ => Err(anyhow::anyhow!("Invalid temp reclaim mode: {}", s)),
        }
    }
}

impl Display for ReclaimMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ReclaimMode::Auto => write!(f, "auto"),
            ReclaimMode::Unlink => write!(f, "unlink"),
            ReclaimMode::Relocate => write!(f, "relocate"),
        }
    }
}

/// Server-level settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    pub max_upload_size_bytes: usize,
}

/// Upload service configuration
#[derive(Clone, Debug)]
pub struct UploadServiceConfig {
    pub base: BaseConfig,
    // Storage configuration
    pub storage_backend: Option<StorageBackend>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // S3-compatible providers (MinIO, Spaces, ...)
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    // Upstream record server
    pub main_server_url: String,
    pub main_server_token: String,
    pub notify_timeout_secs: u64,
    // Local working files
    pub upload_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub temp_max_age: Duration,
    pub reclaim_mode: ReclaimMode,
    pub max_files_per_upload: usize,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<UploadServiceConfig>);

impl Config {
    fn as_upload(&self) -> &UploadServiceConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_env(&self.as_upload().base.environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = UploadServiceConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_upload().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.as_upload().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.as_upload().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.as_upload().base.environment
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.as_upload().base.max_upload_size_bytes
    }

    pub fn storage_backend(&self) -> Option<StorageBackend> {
        self.as_upload().storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.as_upload().s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.as_upload().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.as_upload().s3_endpoint.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.as_upload().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.as_upload().local_storage_base_url.as_deref()
    }

    pub fn main_server_url(&self) -> &str {
        &self.as_upload().main_server_url
    }

    pub fn main_server_token(&self) -> &str {
        &self.as_upload().main_server_token
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.as_upload().notify_timeout_secs)
    }

    pub fn upload_dir(&self) -> &PathBuf {
        &self.as_upload().upload_dir
    }

    pub fn temp_dir(&self) -> &PathBuf {
        &self.as_upload().temp_dir
    }

    pub fn temp_max_age(&self) -> Duration {
        self.as_upload().temp_max_age
    }

    pub fn reclaim_mode(&self) -> ReclaimMode {
        self.as_upload().reclaim_mode
    }

    pub fn max_files_per_upload(&self) -> usize {
        self.as_upload().max_files_per_upload
    }
}

fn is_production_env(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

impl UploadServiceConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_vars<F>(var: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = var("ENVIRONMENT")
            .or_else(|| var("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let cors_origins_str = var("CORS_ORIGINS").unwrap_or_else(|| "*".to_string());
        if is_production_env(&environment) && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let max_upload_size_mb = var("MAX_UPLOAD_SIZE_MB")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(MAX_UPLOAD_SIZE_MB);

        let base = BaseConfig {
            server_port: var("PORT")
                .unwrap_or_else(|| DEFAULT_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            environment,
            max_upload_size_bytes: max_upload_size_mb * 1024 * 1024,
        };

        let storage_backend = match var("STORAGE_BACKEND") {
            Some(s) => Some(s.parse::<StorageBackend>()?),
            None => None,
        };

        let reclaim_mode = match var("TEMP_RECLAIM_MODE") {
            Some(s) => s.parse::<ReclaimMode>()?,
            None => ReclaimMode::Auto,
        };

        let temp_max_age_hours = var("TEMP_MAX_AGE_HOURS")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(TEMP_MAX_AGE_HOURS);

        let config = UploadServiceConfig {
            base,
            storage_backend,
            s3_bucket: var("S3_BUCKET_NAME").or_else(|| var("S3_BUCKET")),
            s3_region: var("S3_REGION").or_else(|| var("AWS_REGION")),
            s3_endpoint: var("S3_ENDPOINT").filter(|s| !s.is_empty()),
            local_storage_path: var("LOCAL_STORAGE_PATH"),
            local_storage_base_url: var("LOCAL_STORAGE_BASE_URL"),
            main_server_url: var("MAIN_SERVER_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .ok_or_else(|| anyhow::anyhow!("MAIN_SERVER_URL must be set"))?,
            main_server_token: var("MAIN_SERVER_JWT_SECRET")
                .ok_or_else(|| anyhow::anyhow!("MAIN_SERVER_JWT_SECRET must be set"))?,
            notify_timeout_secs: var("NOTIFY_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(NOTIFY_TIMEOUT_SECS),
            upload_dir: var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(UPLOAD_DIR)),
            temp_dir: var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| env::temp_dir().join(TEMP_DIR_NAME)),
            temp_max_age: Duration::from_secs(temp_max_age_hours * 3600),
            reclaim_mode,
            max_files_per_upload: var("MAX_FILES_PER_UPLOAD")
                .and_then(|s| s.parse().ok())
                .unwrap_or(MAX_FILES_PER_UPLOAD),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.main_server_url.is_empty() {
            return Err(anyhow::anyhow!("MAIN_SERVER_URL must not be empty"));
        }

        if !self.main_server_url.starts_with("http://")
            && !self.main_server_url.starts_with("https://")
        {
            return Err(anyhow::anyhow!(
                "MAIN_SERVER_URL must be an http:// or https:// URL"
            ));
        }

        if self.main_server_token.is_empty() {
            return Err(anyhow::anyhow!("MAIN_SERVER_JWT_SECRET must not be empty"));
        }

        if self.max_files_per_upload == 0 {
            return Err(anyhow::anyhow!("MAX_FILES_PER_UPLOAD must be at least 1"));
        }

        let backend = self.storage_backend.unwrap_or(StorageBackend::S3);
        match backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET_NAME must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("MAIN_SERVER_URL", "https://api.example.com/"),
        ("MAIN_SERVER_JWT_SECRET", "token"),
        ("S3_BUCKET_NAME", "menus"),
        ("AWS_REGION", "eu-west-3"),
    ];

    #[test]
    fn test_defaults() {
        let config = UploadServiceConfig::from_vars(vars(&REQUIRED)).unwrap();
        assert_eq!(config.base.server_port, 3000);
        assert_eq!(config.max_files_per_upload, 4);
        assert_eq!(config.base.max_upload_size_bytes, 100 * 1024 * 1024);
        assert_eq!(config.notify_timeout_secs, 30);
        assert_eq!(config.temp_max_age, Duration::from_secs(24 * 3600));
        assert_eq!(config.reclaim_mode, ReclaimMode::Auto);
        assert_eq!(config.upload_dir, PathBuf::from("./uploads"));
        assert!(config.temp_dir.ends_with("vitrine-upload-temp"));
        // Trailing slash is trimmed so paths can be appended
        assert_eq!(config.main_server_url, "https://api.example.com");
        assert_eq!(config.s3_region.as_deref(), Some("eu-west-3"));
    }

    #[test]
    fn test_missing_upstream_settings_rejected() {
        let err = UploadServiceConfig::from_vars(vars(&[
            ("S3_BUCKET_NAME", "menus"),
            ("AWS_REGION", "eu-west-3"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("MAIN_SERVER_URL"));
    }

    #[test]
    fn test_s3_backend_requires_bucket() {
        let err = UploadServiceConfig::from_vars(vars(&[
            ("MAIN_SERVER_URL", "https://api.example.com"),
            ("MAIN_SERVER_JWT_SECRET", "token"),
            ("AWS_REGION", "eu-west-3"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("S3_BUCKET_NAME"));
    }

    #[test]
    fn test_local_backend() {
        let config = UploadServiceConfig::from_vars(vars(&[
            ("MAIN_SERVER_URL", "http://localhost:8080"),
            ("MAIN_SERVER_JWT_SECRET", "token"),
            ("STORAGE_BACKEND", "local"),
            ("LOCAL_STORAGE_PATH", "/var/media"),
            ("LOCAL_STORAGE_BASE_URL", "http://localhost:3000/media"),
            ("TEMP_RECLAIM_MODE", "relocate"),
            ("MAX_FILES_PER_UPLOAD", "6"),
        ]))
        .unwrap();
        let config = Config(Box::new(config));
        assert_eq!(config.storage_backend(), Some(StorageBackend::Local));
        assert_eq!(config.reclaim_mode(), ReclaimMode::Relocate);
        assert_eq!(config.max_files_per_upload(), 6);
        assert!(!config.is_production());
    }

    #[test]
    fn test_wildcard_cors_rejected_in_production() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("ENVIRONMENT", "production"));
        let err = UploadServiceConfig::from_vars(vars(&pairs)).unwrap_err();
        assert!(err.to_string().contains("CORS_ORIGINS"));
    }

    #[test]
    fn test_invalid_reclaim_mode_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("TEMP_RECLAIM_MODE", "shred"));
        assert!(UploadServiceConfig::from_vars(vars(&pairs)).is_err());
    }

    #[test]
    fn test_reclaim_mode_resolve() {
        assert_eq!(ReclaimMode::Unlink.resolve(), ReclaimMode::Unlink);
        assert_eq!(ReclaimMode::Relocate.resolve(), ReclaimMode::Relocate);
        let auto = ReclaimMode::Auto.resolve();
        if cfg!(windows) {
            assert_eq!(auto, ReclaimMode::Relocate);
        } else {
            assert_eq!(auto, ReclaimMode::Unlink);
        }
    }
}
