use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use focusflow_client::BackendConfig;
use focusflow_core::FlowConfig;

use crate::state::ensure_focusflow_home;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub backend: BackendSection,
    pub flow: FlowSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSection {
    pub base_url: String,
    /// Sent as a bearer token when present.
    pub api_token: Option<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSection {
    /// Watchdog for any single backend call.
    pub step_timeout_secs: u64,
    pub default_session_minutes: i32,
    /// IANA zone used to read `scheduled` in draft files.
    pub timezone: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendSection {
                base_url: "http://localhost:8000/api".to_string(),
                api_token: None,
                request_timeout_secs: 20,
            },
            flow: FlowSection {
                step_timeout_secs: 30,
                default_session_minutes: 25,
                timezone: "America/Chicago".to_string(),
            },
        }
    }
}

impl Config {
    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            base_url: self.backend.base_url.clone(),
            api_token: self.backend.api_token.clone(),
            request_timeout: Duration::from_secs(self.backend.request_timeout_secs.max(1)),
        }
    }

    pub fn flow_config(&self) -> FlowConfig {
        FlowConfig {
            step_timeout: Duration::from_secs(self.flow.step_timeout_secs.max(1)),
            default_session_minutes: self.flow.default_session_minutes,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_focusflow_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).context("parse config.toml")
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}
