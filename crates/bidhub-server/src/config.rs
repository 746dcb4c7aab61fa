use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Result, bail};
use tracing::{info, warn};

const DEV_JWT_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Production,
    Development,
    Test,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "production" => Ok(Self::Production),
            "development" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            other => Err(format!("expected production, development or test, got {other:?}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub public_url: String,
    pub upload_dir: PathBuf,
    pub jwt_secret: String,
    pub email_from: String,
    pub resend_api_key: Option<String>,
    pub token_prune_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(&std::env::vars().collect())
    }

    /// Every problem is collected so a misconfigured deployment reports them
    /// all at once.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let mut problems = Vec::new();

        let mode = parse(vars, "BIDHUB_MODE", Mode::Development, &mut problems);
        let host = text(vars, "BIDHUB_HOST", "0.0.0.0");
        let port = parse(vars, "BIDHUB_PORT", 3000u16, &mut problems);
        let db_path = PathBuf::from(text(vars, "BIDHUB_DB_PATH", "bidhub.db"));
        let public_url = text(vars, "BIDHUB_PUBLIC_URL", "http://localhost:3000");
        let upload_dir = PathBuf::from(text(vars, "BIDHUB_UPLOAD_DIR", "./uploads"));
        let email_from = text(vars, "BIDHUB_EMAIL_FROM", "Bidhub <noreply@bidhub.local>");
        let token_prune_secs = parse(vars, "BIDHUB_TOKEN_PRUNE_SECS", 3600u64, &mut problems);
        let resend_api_key = vars.get("RESEND_API_KEY").filter(|v| !v.is_empty()).cloned();
        let jwt_secret = vars.get("BIDHUB_JWT_SECRET").filter(|v| !v.is_empty()).cloned();

        if !(public_url.starts_with("http://") || public_url.starts_with("https://")) {
            problems.push(format!("BIDHUB_PUBLIC_URL: not an http(s) URL: {public_url}"));
        }
        if token_prune_secs == 0 {
            problems.push("BIDHUB_TOKEN_PRUNE_SECS: must be greater than zero".to_string());
        }

        if mode == Mode::Production {
            if jwt_secret.is_none() {
                problems.push("BIDHUB_JWT_SECRET: required in production".to_string());
            }
            if resend_api_key.is_none() {
                problems.push("RESEND_API_KEY: required in production".to_string());
            }
        }

        if !problems.is_empty() {
            bail!("Invalid environment variables:\n  {}", problems.join("\n  "));
        }

        let jwt_secret = jwt_secret.unwrap_or_else(|| {
            warn!("BIDHUB_JWT_SECRET not set, using the development secret");
            DEV_JWT_SECRET.to_string()
        });

        Ok(Self {
            mode,
            host,
            port,
            db_path,
            public_url: public_url.trim_end_matches('/').to_string(),
            upload_dir,
            jwt_secret,
            email_from,
            resend_api_key,
            token_prune_secs,
        })
    }
}

fn text(vars: &HashMap<String, String>, key: &str, default: &str) -> String {
    match vars.get(key).filter(|v| !v.is_empty()) {
        Some(value) => value.clone(),
        None => {
            info!("{key} not set, using default: {default}");
            default.to_string()
        }
    }
}

fn parse<T>(vars: &HashMap<String, String>, key: &str, default: T, problems: &mut Vec<String>) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = vars.get(key).filter(|v| !v.is_empty()) else {
        return default;
    };
    match raw.parse() {
        Ok(value) => value,
        Err(e) => {
            problems.push(format!("{key}: {e}"));
            default
        }
    }
}
