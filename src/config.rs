// ⚙️ Configuration - built-in defaults, optional JSON file, environment overrides
//
// Precedence (last wins):
//   1. defaults below
//   2. JSON file named by COSTA_CONFIG (missing keys keep their defaults)
//   3. COSTA_DB_PATH / COSTA_BIND_ADDR

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "COSTA_CONFIG";
pub const DB_PATH_ENV: &str = "COSTA_DB_PATH";
pub const BIND_ADDR_ENV: &str = "COSTA_BIND_ADDR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub db_path: PathBuf,
    /// TUI logs go here so they do not corrupt the terminal
    pub log_file: PathBuf,
    pub bind_addr: String,
    pub currency_label: String,
    pub report_title: String,
    pub admin_username: String,
    pub admin_password: String,
    /// Argon2 PHC string; when set, `admin_password` is ignored
    pub admin_password_hash: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            db_path: PathBuf::from("costa_school.db"),
            log_file: PathBuf::from("costa_school.log"),
            bind_addr: "127.0.0.1:3000".to_string(),
            currency_label: "USh".to_string(),
            report_title: "COSTA School Financial Report".to_string(),
            admin_username: "admin".to_string(),
            admin_password: "costa2026".to_string(),
            admin_password_hash: None,
        }
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn load() -> Result<Self> {
        let vars: HashMap<String, String> = [CONFIG_ENV, DB_PATH_ENV, BIND_ADDR_ENV]
            .iter()
            .filter_map(|k| std::env::var(k).ok().map(|v| (k.to_string(), v)))
            .collect();
        Self::load_from(&vars)
    }

    /// Same as `load`, with the environment passed in.
    pub fn load_from(vars: &HashMap<String, String>) -> Result<Self> {
        let mut config = match vars.get(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(path))?,
            None => AppConfig::default(),
        };

        if let Some(db) = vars.get(DB_PATH_ENV) {
            config.db_path = PathBuf::from(db);
        }
        if let Some(addr) = vars.get(BIND_ADDR_ENV) {
            config.bind_addr = addr.clone();
        }

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}
