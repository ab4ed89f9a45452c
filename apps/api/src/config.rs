use std::path::PathBuf;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Everything has a default; invalid values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Directory where every export is also kept on disk.
    pub export_dir: PathBuf,
    pub export_timeout_secs: u64,
    /// Chrome/Chromium binary. Auto-detected when unset.
    pub chrome_path: Option<PathBuf>,
    /// Scripts loaded into every preview surface (e.g. a charting runtime).
    pub runtime_scripts: Vec<String>,
    /// Extra origins surfaces may load fonts and stylesheets from.
    pub runtime_origins: Vec<String>,
    /// Base URL of the resume persistence API. Export requires inline content without it.
    pub resume_api_url: Option<String>,
    /// CSS appended to every surface after the shell's own rules.
    pub shell_extra_css: Option<String>,
    /// Previews untouched for this long are unmounted. 0 disables reaping.
    pub session_idle_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            export_dir: PathBuf::from(
                std::env::var("EXPORT_DIR").unwrap_or_else(|_| "./exports".to_string()),
            ),
            export_timeout_secs: std::env::var("EXPORT_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse::<u64>()
                .context("EXPORT_TIMEOUT_SECS must be a whole number of seconds")?,
            chrome_path: optional_env("CHROME_PATH").map(PathBuf::from),
            runtime_scripts: list_env("RUNTIME_SCRIPTS", ""),
            runtime_origins: list_env("RUNTIME_ORIGINS", "https://unpkg.com"),
            resume_api_url: optional_env("RESUME_API_URL"),
            shell_extra_css: optional_env("SHELL_EXTRA_CSS"),
            session_idle_secs: std::env::var("SESSION_IDLE_SECS")
                .unwrap_or_else(|_| "1800".to_string())
                .parse::<u64>()
                .context("SESSION_IDLE_SECS must be a whole number of seconds")?,
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn list_env(key: &str, default: &str) -> Vec<String> {
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    split_list(&raw)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
