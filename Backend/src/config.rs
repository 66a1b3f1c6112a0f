// configuration lue depuis l'environnement (.env chargé dans main)

use chrono::Duration;
use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub session_ttl_hours: i64,
    pub signup_ttl_minutes: i64,
    /// Autorise le login en clair pour les comptes sans salt
    pub allow_legacy_passwords: bool,
    pub import_batch_size: usize,
    pub max_upload_bytes: usize,
    pub public_base_url: String,
    pub placeholder_email_domain: String,
    pub bootstrap_admin_email: Option<String>,
    pub bootstrap_admin_password: Option<String>,
    pub session_cookie_secure: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set in .env file")]
    Missing(&'static str),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            session_ttl_hours: 8,
            signup_ttl_minutes: 60,
            allow_legacy_passwords: true,
            import_batch_size: 50,
            max_upload_bytes: 10 * 1024 * 1024,
            public_base_url: "http://127.0.0.1:8080".to_string(),
            placeholder_email_domain: "autumnridge.temp".to_string(),
            bootstrap_admin_email: None,
            bootstrap_admin_password: None,
            session_cookie_secure: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        Ok(Self {
            database_url,
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_or("PORT", defaults.port),
            session_ttl_hours: parse_or("SESSION_TTL_HOURS", defaults.session_ttl_hours),
            signup_ttl_minutes: parse_or("SIGNUP_TTL_MINUTES", defaults.signup_ttl_minutes),
            allow_legacy_passwords: parse_flag("ALLOW_LEGACY_PASSWORDS", defaults.allow_legacy_passwords),
            import_batch_size: parse_or("IMPORT_BATCH_SIZE", defaults.import_batch_size).max(1),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_base_url),
            placeholder_email_domain: env::var("PLACEHOLDER_EMAIL_DOMAIN")
                .unwrap_or(defaults.placeholder_email_domain),
            bootstrap_admin_email: non_empty("BOOTSTRAP_ADMIN_EMAIL"),
            bootstrap_admin_password: non_empty("BOOTSTRAP_ADMIN_PASSWORD"),
            session_cookie_secure: parse_flag("SESSION_COOKIE_SECURE", defaults.session_cookie_secure),
        })
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::hours(self.session_ttl_hours)
    }

    pub fn signup_ttl(&self) -> Duration {
        Duration::minutes(self.signup_ttl_minutes)
    }

    /// Lien envoyé par email pour terminer l'inscription
    pub fn verification_link(&self, token: &str) -> String {
        format!("{}/complete-registration?token={}", self.public_base_url, token)
    }
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("⚠️  {} has an invalid value ({}), using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

fn parse_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                warn!("⚠️  {} has an invalid value ({}), using default", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.session_ttl(), Duration::hours(8));
        assert_eq!(config.signup_ttl(), Duration::minutes(60));
        assert_eq!(config.import_batch_size, 50);
        assert!(config.allow_legacy_passwords);
    }

    #[test]
    fn test_verification_link() {
        let config = AppConfig::default();
        assert_eq!(
            config.verification_link("abc"),
            "http://127.0.0.1:8080/complete-registration?token=abc"
        );
    }
}
