// src/config.rs
use std::net::{IpAddr, SocketAddr};

const DEFAULT_PORT: u16 = 3002;
const DEFAULT_SCYLLA_NODE: &str = "127.0.0.1:9042";
const DEFAULT_KEYSPACE: &str = "investa";
const DEFAULT_CORS_ORIGINS: [&str; 2] = [
    "http://localhost:3000",
    "https://investa-lilac.vercel.app",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Scylla,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub jwt_secret: String,
    pub store_backend: StoreBackend,
    pub scylla_nodes: Vec<String>,
    pub keyspace: String,
    pub cors_origins: Vec<String>,
}

impl Config {
    /// Reads the process environment, after loading `.env` if one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host: IpAddr = match get("HOST") {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "HOST",
                value,
            })?,
            None => IpAddr::from([127, 0, 0, 1]),
        };
        let port: u16 = match get("PORT") {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value,
            })?,
            None => DEFAULT_PORT,
        };

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let store_backend = match get("STORE_BACKEND") {
            None => StoreBackend::Scylla,
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "scylla" => StoreBackend::Scylla,
                "memory" => StoreBackend::Memory,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "STORE_BACKEND",
                        value,
                    })
                }
            },
        };

        let scylla_nodes = get("SCYLLA_NODES")
            .map(|v| split_list(&v))
            .unwrap_or_else(|| vec![DEFAULT_SCYLLA_NODE.to_string()]);

        let keyspace = get("SCYLLA_KEYSPACE").unwrap_or_else(|| DEFAULT_KEYSPACE.to_string());
        // Interpolated into CQL statements, so only plain identifiers.
        if !keyspace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::Invalid {
                name: "SCYLLA_KEYSPACE",
                value: keyspace,
            });
        }

        let cors_origins = get("CORS_ORIGINS")
            .map(|v| split_list(&v))
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect());
        if let Some(bad) = cors_origins.iter().find(|o| !is_origin(o)) {
            return Err(ConfigError::Invalid {
                name: "CORS_ORIGINS",
                value: bad.clone(),
            });
        }

        Ok(Config {
            addr: SocketAddr::new(host, port),
            jwt_secret,
            store_backend,
            scylla_nodes,
            keyspace,
            cors_origins,
        })
    }
}

// scheme://host[:port] with nothing after it
fn is_origin(value: &str) -> bool {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.contains('/'))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
