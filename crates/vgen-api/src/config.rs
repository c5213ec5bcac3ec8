//! API configuration.

use std::path::PathBuf;

/// Where rendered videos are uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactStoreKind {
    /// S3-compatible bucket (R2)
    R2,
    /// Local directory, for development
    Local,
}

impl ArtifactStoreKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "r2" | "s3" => Some(Self::R2),
            "local" | "fs" => Some(Self::Local),
            _ => None,
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Max request body size
    pub max_body_size: usize,
    /// Expose Prometheus metrics at `/metrics`
    pub metrics_enabled: bool,
    /// Artifact storage backend
    pub artifact_store: ArtifactStoreKind,
    /// Root directory for the local artifact store
    pub local_store_dir: PathBuf,
    /// Subscribe to record inserts and submit them
    pub listen_for_inserts: bool,
    /// Environment (development/production)
    pub environment: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_body_size: 1024 * 1024, // 1MB
            metrics_enabled: true,
            artifact_store: ArtifactStoreKind::R2,
            local_store_dir: PathBuf::from("/tmp/vgen-artifacts"),
            listen_for_inserts: true,
            environment: "development".to_string(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            max_body_size: std::env::var("API_MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
            artifact_store: std::env::var("ARTIFACT_STORE")
                .ok()
                .and_then(|s| ArtifactStoreKind::parse(&s))
                .unwrap_or(defaults.artifact_store),
            local_store_dir: std::env::var("LOCAL_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.local_store_dir),
            listen_for_inserts: std::env::var("VGEN_LISTEN_FOR_INSERTS")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(defaults.listen_for_inserts),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
