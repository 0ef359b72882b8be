use std::path::PathBuf;

use anyhow::{Context, Result};

pub const DEV_JWT_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub token_ttl_hours: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = get("CARPOOL_PORT").unwrap_or_else(|| "3001".into());
        let ttl = get("CARPOOL_TOKEN_TTL_HOURS").unwrap_or_else(|| "1".into());

        Ok(Self {
            jwt_secret: get("CARPOOL_JWT_SECRET").unwrap_or_else(|| DEV_JWT_SECRET.into()),
            db_path: PathBuf::from(get("CARPOOL_DB_PATH").unwrap_or_else(|| "carpool.db".into())),
            host: get("CARPOOL_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: port
                .parse()
                .with_context(|| format!("CARPOOL_PORT '{}' is not a port number", port))?,
            token_ttl_hours: ttl
                .parse()
                .ok()
                .filter(|h| *h > 0)
                .with_context(|| format!("CARPOOL_TOKEN_TTL_HOURS '{}' is not a positive number", ttl))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.port, 3001);
        assert_eq!(cfg.token_ttl_hours, 1);
        assert_eq!(cfg.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(cfg.db_path, PathBuf::from("carpool.db"));
    }

    #[test]
    fn overrides() {
        let cfg = config(&[
            ("CARPOOL_PORT", "8080"),
            ("CARPOOL_HOST", "127.0.0.1"),
            ("CARPOOL_TOKEN_TTL_HOURS", "12"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.token_ttl_hours, 12);
    }

    #[test]
    fn malformed_numbers_fail() {
        assert!(config(&[("CARPOOL_PORT", "http")]).is_err());
        assert!(config(&[("CARPOOL_TOKEN_TTL_HOURS", "0")]).is_err());
    }
}
