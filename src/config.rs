use std::path::PathBuf;

pub const DEFAULT_HOST: &str = "127.0.0.1";

/// The session is process-wide and requests carry no credentials, so the
/// server binds to loopback and grants CORS only to listed origins.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Directory for the file store; `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    /// Browser origins allowed to call the API; empty disables CORS.
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let port = match std::env::var("APP_PORT") {
            Ok(v) => v
                .parse::<u16>()
                .map_err(|e| anyhow::anyhow!("APP_PORT {:?}: {}", v, e))?,
            Err(_) => 8080,
        };
        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| DEFAULT_HOST.into()),
            port,
            data_dir: std::env::var("TASKDESK_DATA_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            cors_origins: parse_origins(&std::env::var("APP_CORS_ORIGINS").unwrap_or_default()),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: 0,
            data_dir: None,
            cors_origins: Vec::new(),
        }
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect()
}
