use std::env;
use std::fs;
use std::path::PathBuf;

use dirs_next::config_dir;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::info;

const DEFAULT_BASE_URL: &str = "https://api.gaianet.ai/v1";
const DEFAULT_MODEL: &str = "gaia-default";
const DEFAULT_PORT: u16 = 3031;

/// On-disk settings. Every field is optional; resolution order for each
/// value is config file, then environment, then the built-in default. The
/// API key has no default: a request made without one fails with a
/// configuration error at request time, not at startup.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RelayConfig {
    pub gaia_base_url: Option<String>,
    pub gaia_api_key: Option<String>,
    pub gaia_default_model: Option<String>,
    pub relay_port: Option<u16>,
}

static CONFIG: OnceCell<RelayConfig> = OnceCell::new();

pub fn get_config_path() -> PathBuf {
    let mut path = config_dir().unwrap_or_else(|| env::current_dir().unwrap());
    path.push("gaia-relay");
    path.push("config.toml");
    path
}

fn load_config_file() -> RelayConfig {
    let path = get_config_path();
    info!("Loading config from {}", path.display());
    if path.exists() {
        let content = fs::read_to_string(&path).unwrap_or_default();
        toml::from_str(&content).unwrap_or_default()
    } else {
        // Create the directory and file, and write defaults
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let default = RelayConfig::default();
        let toml_str = toml::to_string_pretty(&default).unwrap_or_default();
        let _ = fs::write(&path, toml_str);
        default
    }
}

fn get_config() -> &'static RelayConfig {
    CONFIG.get_or_init(load_config_file)
}

pub fn get_gaia_base_url() -> String {
    get_config()
        .gaia_base_url
        .clone()
        .or_else(|| env::var("GAIA_MODEL_BASE_URL").ok())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

pub fn get_gaia_api_key() -> Option<String> {
    get_config()
        .gaia_api_key
        .clone()
        .or_else(|| env::var("GAIA_API_KEY").ok())
}

pub fn get_gaia_default_model() -> String {
    get_config()
        .gaia_default_model
        .clone()
        .or_else(|| env::var("GAIA_DEFAULT_MODEL").ok())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string())
}

pub fn get_relay_port() -> u16 {
    get_config()
        .relay_port
        .or_else(|| env::var("GAIA_RELAY_PORT").ok().and_then(|v| v.parse().ok()))
        .unwrap_or(DEFAULT_PORT)
}
