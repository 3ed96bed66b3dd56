// Configuration loader
// Reads ~/.chatrelay/config.toml, then applies environment overrides

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::settings::Config;

/// Default config file location
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".chatrelay/config.toml"))
}

/// Load configuration from the default file (if present) and environment
pub fn load_config() -> Result<Config> {
    let path = config_path();
    load_config_from(path.as_deref())
}

/// Load configuration from `path` (if it exists) and environment
pub fn load_config_from(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) if path.exists() => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            parse_config(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        }
        _ => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

pub fn parse_config(contents: &str) -> Result<Config> {
    toml::from_str(contents).context("Invalid config.toml")
}

/// Apply CHATRELAY_* overrides using `lookup` to read variables
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = lookup("CHATRELAY_DATA_DIR").filter(|v| !v.is_empty()) {
        config.data_dir = PathBuf::from(dir);
    }
    if let Some(bind) = lookup("CHATRELAY_BIND").filter(|v| !v.is_empty()) {
        config.bind_address = bind;
    }
    if let Some(secs) = lookup("CHATRELAY_REQUEST_TIMEOUT_SECS").filter(|v| !v.is_empty()) {
        let secs: u64 = secs
            .trim()
            .parse()
            .with_context(|| format!("CHATRELAY_REQUEST_TIMEOUT_SECS is not a number: {}", secs))?;
        config.request_timeout_secs = Some(secs);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::TemplateMode;
    use std::collections::HashMap;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = parse_config(
            r#"
            data_dir = "/var/lib/chatrelay"
            template_mode = "lenient"
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/chatrelay"));
        assert_eq!(config.template_mode, TemplateMode::Lenient);
        assert_eq!(config.bind_address, "127.0.0.1:3001");
        assert!(config.request_timeout_secs.is_none());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("CHATRELAY_BIND", "0.0.0.0:9000"),
            ("CHATRELAY_REQUEST_TIMEOUT_SECS", "45"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| env.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.bind_address, "0.0.0.0:9000");
        assert_eq!(config.request_timeout_secs, Some(45));
    }

    #[test]
    fn test_bad_timeout_is_rejected() {
        let mut config = Config::default();
        let result = apply_env_overrides(&mut config, |key| {
            (key == "CHATRELAY_REQUEST_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = load_config_from(Some(&dir.path().join("absent.toml"))).unwrap();
        assert!(config.cors_permissive);
    }
}
