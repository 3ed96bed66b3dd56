// Configuration structs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::providers::TemplateMode;

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:3001";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the collection files
    pub data_dir: PathBuf,

    /// HTTP bind address
    pub bind_address: String,

    /// Timeout for provider calls; transport default when unset
    pub request_timeout_secs: Option<u64>,

    /// Handling of unknown template placeholders
    pub template_mode: TemplateMode,

    /// Also write logs to this file
    pub log_file: Option<PathBuf>,

    /// Allow cross-origin requests from any origin
    pub cors_permissive: bool,
}

impl Config {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .map(|home| home.join(".chatrelay/data"))
            .unwrap_or_else(|| PathBuf::from("data"));

        Self {
            data_dir,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            request_timeout_secs: None,
            template_mode: TemplateMode::Strict,
            log_file: None,
            cors_permissive: true,
        }
    }
}
