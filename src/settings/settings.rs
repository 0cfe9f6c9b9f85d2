use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::application_impl::RevocationPolicy;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub credentials: Credentials,
    pub http: Http,
    pub jwt: Jwt,
    pub log: Log,
    pub revocation: Revocation,
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    pub backend: String, // "fake" or "real"
    #[serde(default = "default_min_password_len")]
    pub min_password_len: usize,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub backend: String, // "mysql" or "memory"
    #[serde(default)]
    pub mysql_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    #[serde(default)]
    pub cert_path: Option<String>,
    #[serde(default)]
    pub key_path: Option<String>,
    #[serde(default)]
    pub secure_cookies: bool,
}

#[derive(Deserialize)]
pub struct Jwt {
    pub issuer: String,
    pub audience: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
    #[serde(default)]
    pub leeway_secs: u64,
    #[serde(default)]
    pub secret: Option<String>,
}

impl std::fmt::Debug for Jwt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Jwt")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("leeway_secs", &self.leeway_secs)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

pub const JWT_SECRET_ENV: &str = "JWT_SECRET";

impl Jwt {
    /// `JWT_SECRET` wins over the file value. Blank values count as absent.
    pub fn resolve_secret(&self) -> Option<String> {
        let present = |s: &String| !s.trim().is_empty();
        std::env::var(JWT_SECRET_ENV)
            .ok()
            .filter(present)
            .or_else(|| self.secret.clone().filter(present))
    }
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Revocation {
    pub backend: String, // "redis" or "memory"
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default)]
    pub policy: RevocationPolicy,
    /// Memory backend only: how often expired entries are purged.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_min_password_len() -> usize {
    8
}

fn default_key_prefix() -> String {
    "courtside:auth".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_attempt_timeout_ms() -> u64 {
    250
}

fn default_backoff_ms() -> u64 {
    20
}

fn default_sweep_interval_secs() -> u64 {
    60
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub const ENV_PREFIX: &str = "COURTSIDE";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_settings_parse() {
        let settings = parse_settings(Some("settings/dev.toml")).unwrap();
        assert_eq!(settings.auth.backend, "real");
        assert_eq!(settings.revocation.policy, RevocationPolicy::FailOpen);
        assert!(settings.revocation.max_attempts <= 3);
        assert!(settings.jwt.access_ttl_secs < settings.jwt.refresh_ttl_secs);
    }

    #[test]
    fn release_settings_parse_without_secret() {
        let settings = parse_settings(Some("settings/release.toml")).unwrap();
        assert!(settings.jwt.secret.is_none());
        assert_eq!(settings.credentials.backend, "mysql");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(parse_settings(Some("settings/does-not-exist.toml")).is_err());
    }

    #[test]
    fn debug_hides_secret() {
        let settings = parse_settings(Some("settings/dev.toml")).unwrap();
        let rendered = format!("{:?}", settings.jwt);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("dev-only"));
    }
}
