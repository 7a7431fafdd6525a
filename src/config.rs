use crate::error::{GroveOpsError, Result};
use crate::logic::RuleSettings;
use dialoguer::Input;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub grove: GroveConfig,
    pub location: LocationConfig,
    #[serde(default)]
    pub rules: RuleSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GroveConfig {
    pub name: String,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
}

impl Config {
    pub fn load(config_override: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_override {
            Some(p) => p,
            None => Self::find_config_path()?,
        };

        if !config_path.exists() {
            return Err(GroveOpsError::Config(format!(
                "Config file not found at {:?}. Run `groveops init` to set up.",
                config_path
            )));
        }

        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| GroveOpsError::Config(format!("Failed to read config: {}", e)))?;

        // Substitute environment variables
        let config_str = Self::substitute_env_vars(&config_str);

        let config: Config = serde_yaml::from_str(&config_str)
            .map_err(|e| GroveOpsError::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Search for config.yaml in standard locations.
    /// Returns the path of the first found config, or the XDG default path if none found.
    fn find_config_path() -> Result<PathBuf> {
        // Try current directory first
        let local_config = PathBuf::from("config/config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        // Try XDG config directory
        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("groveops").join("config.yaml");
            if xdg_config.exists() {
                return Ok(xdg_config);
            }
        }

        // Return XDG path as the default (will trigger "not found" in load)
        let default_path = dirs::config_dir()
            .ok_or_else(|| GroveOpsError::Config("Cannot determine config directory".into()))?
            .join("groveops")
            .join("config.yaml");
        Ok(default_path)
    }

    /// Returns true if a config file can be found in any standard location.
    pub fn exists(config_override: Option<&PathBuf>) -> bool {
        match config_override {
            Some(p) => p.exists(),
            None => Self::find_config_path()
                .map(|p| p.exists())
                .unwrap_or(false),
        }
    }

    /// Default path for writing new config files (~/.config/groveops/config.yaml).
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| GroveOpsError::Config("Cannot determine config directory".into()))?
            .join("groveops");
        Ok(config_dir.join("config.yaml"))
    }

    /// Run interactive setup prompts and write config to disk.
    /// Returns the loaded Config and the path it was written to.
    pub fn setup_interactive() -> Result<(Self, PathBuf)> {
        println!();
        println!("No configuration found. Let's set up GroveOps!");
        println!();

        println!("Grove");
        let grove_name: String = Input::new()
            .with_prompt("  Grove name")
            .default("Main Grove".into())
            .interact_text()
            .map_err(|e| GroveOpsError::Config(format!("Input error: {}", e)))?;

        println!();

        println!("Location (for the Open-Meteo weather forecast)");
        let latitude: f64 = Input::new()
            .with_prompt("  Latitude")
            .default(37.98)
            .interact_text()
            .map_err(|e| GroveOpsError::Config(format!("Input error: {}", e)))?;

        let longitude: f64 = Input::new()
            .with_prompt("  Longitude")
            .default(23.73)
            .interact_text()
            .map_err(|e| GroveOpsError::Config(format!("Input error: {}", e)))?;

        println!();

        let config = Config {
            grove: GroveConfig { name: grove_name },
            location: LocationConfig {
                latitude,
                longitude,
            },
            rules: RuleSettings::default(),
        };

        // Write to default config path
        let config_path = Self::default_config_path()?;
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml::to_string(&config)
            .map_err(|e| GroveOpsError::Config(format!("Failed to serialize config: {}", e)))?;

        // Write with a header comment
        let content = format!(
            "# GroveOps Configuration\n# Generated by `groveops init`\n# Environment variable substitution (${{VAR}}) is supported.\n\n{}",
            yaml
        );
        std::fs::write(&config_path, content)?;

        println!("Configuration saved to {}", config_path.display());
        println!();

        Ok((config, config_path))
    }

    fn substitute_env_vars(content: &str) -> String {
        let mut result = content.to_string();

        // Find all ${VAR_NAME} patterns and substitute
        let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let placeholder = &cap[0];
            if let Ok(value) = std::env::var(var_name) {
                result = result.replace(placeholder, &value);
            }
        }

        result
    }

    pub fn data_dir(data_dir_override: Option<&PathBuf>) -> Result<PathBuf> {
        // CLI override takes priority
        if let Some(dir) = data_dir_override {
            std::fs::create_dir_all(dir)?;
            return Ok(dir.clone());
        }

        // Then check env var
        if let Ok(dir) = std::env::var("GROVEOPS_DATA_DIR") {
            let p = PathBuf::from(dir);
            std::fs::create_dir_all(&p)?;
            return Ok(p);
        }

        // Use XDG data directory
        let data_dir = dirs::data_dir()
            .ok_or_else(|| GroveOpsError::Config("Cannot determine data directory".into()))?
            .join("groveops");

        std::fs::create_dir_all(&data_dir)?;
        Ok(data_dir)
    }

    pub fn db_path(data_dir_override: Option<&PathBuf>) -> Result<PathBuf> {
        Ok(Self::data_dir(data_dir_override)?.join("groveops.db"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grove: GroveConfig {
                name: "Main Grove".into(),
            },
            location: LocationConfig {
                latitude: 37.98,
                longitude: 23.73,
            },
            rules: RuleSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rules_section_is_optional() {
        let yaml = r#"
grove:
  name: Test Grove
location:
  latitude: 37.5
  longitude: 23.1
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.grove.name, "Test Grove");
        assert_eq!(config.rules.max_stale_minutes, 30);
        assert_eq!(config.rules.liters_per_minute, 10.0);
    }

    #[test]
    fn rules_overrides_apply() {
        let yaml = r#"
grove:
  name: Test Grove
location:
  latitude: 37.5
  longitude: 23.1
rules:
  liters_per_minute: 8.0
  rain_threshold_mm: 2.0
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.rules.liters_per_minute, 8.0);
        assert_eq!(config.rules.rain_threshold_mm, 2.0);
        // untouched defaults survive
        assert_eq!(config.rules.critical_moisture_percent, 20.0);
    }
}
