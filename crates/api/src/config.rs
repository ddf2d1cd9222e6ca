use std::path::PathBuf;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds. Must exceed the engine timeout:
    /// initialize/prompt/propagate block on the engine for seconds.
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds, bounding the post-drain
    /// engine-state cleanup.
    pub shutdown_timeout_secs: u64,
    /// Maximum accepted upload size in megabytes.
    pub max_upload_mb: usize,
    /// Root directory of the videos/frames/masks layout.
    pub storage_root: PathBuf,
    /// Base URL of the predictor sidecar.
    pub engine_url: String,
    /// Timeout applied to each engine request, in seconds.
    pub engine_timeout_secs: u64,
    /// Concurrent engine invocations, sized to the sidecar's compute devices.
    pub engine_workers: usize,
    /// Session map capacity; least-recently-used sessions are evicted
    /// beyond it.
    pub max_sessions: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                  |
    /// |-------------------------|--------------------------|
    /// | `HOST`                  | `0.0.0.0`                |
    /// | `PORT`                  | `3000`                   |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`  |
    /// | `REQUEST_TIMEOUT_SECS`  | `300`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                     |
    /// | `MAX_UPLOAD_MB`         | `512`                    |
    /// | `STORAGE_ROOT`          | `storage`                |
    /// | `ENGINE_URL`            | `http://127.0.0.1:8492`  |
    /// | `ENGINE_TIMEOUT_SECS`   | `120`                    |
    /// | `ENGINE_WORKERS`        | `1`                      |
    /// | `MAX_SESSIONS`          | `32`                     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let max_upload_mb: usize = std::env::var("MAX_UPLOAD_MB")
            .unwrap_or_else(|_| "512".into())
            .parse()
            .expect("MAX_UPLOAD_MB must be a valid usize");

        let storage_root =
            PathBuf::from(std::env::var("STORAGE_ROOT").unwrap_or_else(|_| "storage".into()));

        let engine_url =
            std::env::var("ENGINE_URL").unwrap_or_else(|_| "http://127.0.0.1:8492".into());

        let engine_timeout_secs: u64 = std::env::var("ENGINE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".into())
            .parse()
            .expect("ENGINE_TIMEOUT_SECS must be a valid u64");

        let engine_workers: usize = std::env::var("ENGINE_WORKERS")
            .unwrap_or_else(|_| "1".into())
            .parse()
            .expect("ENGINE_WORKERS must be a valid usize");

        let max_sessions: usize = std::env::var("MAX_SESSIONS")
            .unwrap_or_else(|_| "32".into())
            .parse()
            .expect("MAX_SESSIONS must be a valid usize");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            max_upload_mb,
            storage_root,
            engine_url,
            engine_timeout_secs,
            engine_workers,
            max_sessions,
        }
    }
}
