use crate::db::is_valid_collection;
use anyhow::{Result, bail};
use clap::Parser;
use serde::Deserialize;
use serde_yaml;
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "recipebook")]
#[command(about = "Runs the recipebook service", long_about = None)]
pub struct Cli {
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<String>,

    /// After the first load, write every stored recipe back in the current schema
    #[arg(long = "rewrite-stored")]
    pub rewrite_stored: bool,
}

pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".recipebook")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}

#[derive(Debug, Deserialize, Clone)]
pub struct App {
    port: u16,
    password: String,
    #[serde(default = "default_reload_interval")]
    pub reload_interval_seconds: u64,
    #[serde(default = "default_unauthorized_delay")]
    pub unauthorized_delay_ms: u64,
}

fn default_reload_interval() -> u64 {
    30
}

fn default_unauthorized_delay() -> u64 {
    1000
}

impl App {
    pub fn get_port(&self) -> u16 {
        self.port
    }

    pub fn get_password(&self) -> &str {
        &self.password
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub database: String,
    pub collection: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default = "default_sync_interval")]
    pub sync_interval_seconds: u64,
}

fn default_sync_interval() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RateLimit {
    pub window_seconds: u64,
    pub delay_after: u32,
    pub delay_ms: u64,
}

impl Default for RateLimit {
    fn default() -> Self {
        RateLimit {
            window_seconds: 15 * 60,
            delay_after: 100,
            delay_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub app: App,
    pub store: StoreConfig,
    #[serde(default)]
    pub rate_limit: RateLimit,
}

impl Config {
    pub fn new(path: &str) -> Result<Self> {
        let yaml_str = fs::read_to_string(path)?;
        Config::from_yaml(&yaml_str)
    }

    pub fn from_yaml(yaml_str: &str) -> Result<Self> {
        let yaml_with_env = Config::substitute_env_vars(yaml_str)?;
        let config: Config = serde_yaml::from_str(&yaml_with_env)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.app.password.is_empty() {
            bail!("app.password must not be empty");
        }
        if !is_valid_collection(&self.store.collection) {
            bail!("store.collection '{}' is not a valid identifier", self.store.collection);
        }
        match (self.store.url.as_deref(), self.store.auth_token.as_deref()) {
            (None, None) => {}
            (Some(url), Some(token)) if !url.is_empty() && !token.is_empty() => {}
            _ => bail!("store.url and store.auth_token must be set together"),
        }
        if self.app.reload_interval_seconds == 0 {
            bail!("app.reload_interval_seconds must be at least 1");
        }
        Ok(())
    }

    fn substitute_env_vars(yaml_str: &str) -> Result<String> {
        let mut result = yaml_str.to_string();
        let mut offset = 0;

        while let Some(start) = result[offset..].find("${") {
            let actual_start = offset + start;
            if let Some(end) = result[actual_start..].find("}") {
                let var_name = &result[actual_start + 2..actual_start + end];

                // ${VAR:-default}
                let env_value = if let Some(default_start) = var_name.find(":-") {
                    let actual_var = &var_name[..default_start];
                    let default_val = &var_name[default_start + 2..];
                    env::var(actual_var).unwrap_or_else(|_| default_val.to_string())
                } else {
                    env::var(var_name).unwrap_or_else(|_| {
                        tracing::warn!("environment variable '{}' not found", var_name);
                        String::new()
                    })
                };

                result.replace_range(actual_start..actual_start + end + 1, &env_value);
                offset = actual_start + env_value.len();
            } else {
                break;
            }
        }

        Ok(result)
    }
}
