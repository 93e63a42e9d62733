use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use tracing::{info, warn};

/// Runtime configuration.
///
/// Required values fall back to logged defaults; feature credentials are
/// optional and their absence disables only the corresponding feature.
pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub meili_url: String,
    pub meili_key: Option<String>,
    pub smtp_relay: String,
    pub email_user: Option<String>,
    pub email_pass: Option<String>,
    pub gemini_api_key: Option<String>,
    pub auth_secret: Option<String>,
    pub contract_address: Option<String>,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("NIDHI_PORT", "8080"),
            redis_url: try_load("REDIS_URL", "redis://127.0.0.1:6379"),
            meili_url: try_load("MEILI_URL", "http://localhost:7700"),
            meili_key: read_secret_opt("MEILI_ADMIN_KEY"),
            smtp_relay: try_load("SMTP_RELAY", "smtp.gmail.com"),
            email_user: read_secret_opt("EMAIL_USER"),
            email_pass: read_secret_opt("EMAIL_PASS"),
            gemini_api_key: read_secret_opt("GEMINI_API_KEY"),
            auth_secret: read_secret_opt("AUTH_SECRET"),
            contract_address: var("CONTRACT_ADDRESS").ok(),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}

/// Reads a Docker-style secret file, falling back to the same-named
/// environment variable. Missing credentials disable their feature.
fn read_secret_opt(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    if let Ok(contents) = read_to_string(&path) {
        return Some(contents.trim().to_string());
    }

    match env::var(secret_name) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => {
            warn!("Secret {secret_name} not configured, feature disabled");
            None
        }
    }
}
