use std::net::SocketAddr;
use std::path::PathBuf;

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str =
    "rewear=debug,rewear_api=debug,rewear_core=debug,rewear_db=info,tower_http=debug";

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("REWEAR_JWT_SECRET is unset or still a placeholder")]
    InsecureSecret,

    #[error("{var} is not valid: {value}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub uploads_dir: PathBuf,
    pub addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup, so tests don't have to touch the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("REWEAR_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            return Err(ConfigError::InsecureSecret);
        }

        let db_path = lookup("REWEAR_DB_PATH").unwrap_or_else(|| "rewear.db".into()).into();
        let uploads_dir = lookup("REWEAR_UPLOADS_DIR").unwrap_or_else(|| "uploads".into()).into();
        let host = lookup("REWEAR_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = lookup("REWEAR_PORT").unwrap_or_else(|| "8000".into());

        let port: u16 = port.parse().map_err(|_| ConfigError::Invalid {
            var: "REWEAR_PORT",
            value: port.clone(),
        })?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .map_err(|_| ConfigError::Invalid {
                var: "REWEAR_HOST",
                value: host.clone(),
            })?;

        Ok(Self {
            jwt_secret,
            db_path,
            uploads_dir,
            addr,
        })
    }
}
