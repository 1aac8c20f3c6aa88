use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;

use nook_gateway::{DEFAULT_HISTORY_LIMIT, RelayConfig};

const DEV_SECRET: &str = "dev-secret-change-me";

/// Server settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub history_limit: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("NOOK_JWT_SECRET").unwrap_or_else(|| {
            warn!("NOOK_JWT_SECRET not set, using the development secret");
            DEV_SECRET.into()
        });

        let port = match lookup("NOOK_PORT") {
            Some(v) => v.parse().with_context(|| format!("invalid NOOK_PORT '{}'", v))?,
            None => 3000,
        };

        let history_limit = match lookup("NOOK_HISTORY_LIMIT") {
            Some(v) => v
                .parse()
                .with_context(|| format!("invalid NOOK_HISTORY_LIMIT '{}'", v))?,
            None => DEFAULT_HISTORY_LIMIT,
        };

        Ok(Self {
            host: lookup("NOOK_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: PathBuf::from(lookup("NOOK_DB_PATH").unwrap_or_else(|| "nook.db".into())),
            jwt_secret,
            history_limit,
        })
    }

    pub fn relay(&self) -> RelayConfig {
        RelayConfig {
            history_limit: self.history_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_path, PathBuf::from("nook.db"));
        assert_eq!(config.jwt_secret, DEV_SECRET);
        assert_eq!(config.relay().history_limit, DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn values_are_read_from_the_environment() {
        let config = Config::from_lookup(lookup(&[
            ("NOOK_HOST", "127.0.0.1"),
            ("NOOK_PORT", "8080"),
            ("NOOK_DB_PATH", "/var/lib/nook/nook.db"),
            ("NOOK_JWT_SECRET", "s3cret"),
            ("NOOK_HISTORY_LIMIT", "25"),
        ]))
        .unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.relay().history_limit, 25);
    }

    #[test]
    fn malformed_port_is_an_error() {
        let err = Config::from_lookup(lookup(&[("NOOK_PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("NOOK_PORT"));
    }
}
