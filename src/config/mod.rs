// Configuration module
// Public interface for configuration loading

mod loader;
mod settings;

pub use loader::{apply_env_overrides, config_path, load_config, load_config_from, parse_config};
pub use settings::{Config, DEFAULT_BIND_ADDRESS};
