use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// What the chat loop does when a line cannot be read from the terminal.
///
/// End of stream always ends the session with an error, whatever the policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputErrorPolicy {
    #[default]
    Reprompt,
    Exit,
}

/// Settings fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub system_prompt: String,
    pub on_input_error: InputErrorPolicy,
}

impl Config {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            on_input_error: InputErrorPolicy::default(),
        }
    }

    /// Load from `path`, or from `./config.toml` when no path is given.
    ///
    /// A missing default file is tolerated so the key can come from
    /// `OPENAI_API_KEY` alone; an explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_key = std::env::var(API_KEY_ENV).ok();
        let file = match path {
            Some(path) => Some(read_file(path)?),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                match read_file(&default) {
                    Ok(file) => Some(file),
                    Err(ConfigError::Read { source, .. }) if source.kind() == ErrorKind::NotFound => {
                        warn!("No {} in the working directory", DEFAULT_CONFIG_FILE);
                        None
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        Self::from_parts(file.unwrap_or_default(), env_key)
    }

    fn from_parts(file: ConfigFile, env_key: Option<String>) -> Result<Self, ConfigError> {
        let api_key = non_empty(file.api_key)
            .or_else(|| {
                let key = non_empty(env_key);
                if key.is_some() {
                    info!("Using API key from {}", API_KEY_ENV);
                }
                key
            })
            .ok_or(ConfigError::MissingApiKey)?;

        let temperature = file.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        if !temperature.is_finite() || !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidTemperature(temperature));
        }

        let mut config = Self::new(api_key);
        config.temperature = temperature;
        if let Some(endpoint) = file.endpoint {
            config.endpoint = endpoint;
        }
        if let Some(model) = file.model {
            config.model = model;
        }
        if let Some(system_prompt) = file.system_prompt {
            config.system_prompt = system_prompt;
        }
        if let Some(policy) = file.on_input_error {
            config.on_input_error = policy;
        }
        debug!(
            "Config: endpoint={} model={} temperature={} on_input_error={:?}",
            config.endpoint, config.model, config.temperature, config.on_input_error
        );
        Ok(config)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    api_key: Option<String>,
    endpoint: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    system_prompt: Option<String>,
    on_input_error: Option<InputErrorPolicy>,
}

fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Using config file: {}", path.display());
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(text: &str) -> ConfigFile {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn defaults_fill_everything_but_the_key() {
        let config = Config::from_parts(parse(r#"api_key = "sk-test""#), None).unwrap();
        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(config.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(config.on_input_error, InputErrorPolicy::Reprompt);
    }

    #[test]
    fn file_overrides_defaults() {
        let file = parse(
            r#"
            api_key = "sk-test"
            endpoint = "http://localhost:8081/v1/chat/completions"
            model = "local-model"
            temperature = 0.2
            on_input_error = "exit"
            "#,
        );
        let config = Config::from_parts(file, None).unwrap();
        assert_eq!(config.endpoint, "http://localhost:8081/v1/chat/completions");
        assert_eq!(config.model, "local-model");
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.on_input_error, InputErrorPolicy::Exit);
    }

    #[test]
    fn missing_or_blank_key_is_rejected() {
        assert!(matches!(
            Config::from_parts(ConfigFile::default(), None),
            Err(ConfigError::MissingApiKey)
        ));
        assert!(matches!(
            Config::from_parts(parse(r#"api_key = "   ""#), Some(String::new())),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    fn environment_key_is_a_fallback() {
        let config = Config::from_parts(parse(r#"api_key = """#), Some("sk-env".into())).unwrap();
        assert_eq!(config.api_key, "sk-env");

        let config = Config::from_parts(parse(r#"api_key = "sk-file""#), Some("sk-env".into())).unwrap();
        assert_eq!(config.api_key, "sk-file");
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let file = parse("api_key = \"sk\"\ntemperature = 3.5");
        assert!(matches!(
            Config::from_parts(file, None),
            Err(ConfigError::InvalidTemperature(t)) if t == 3.5
        ));
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            Config::load(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api_key = ").unwrap();
        assert!(matches!(
            Config::load(Some(file.path())),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn loads_key_from_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api_key = \"sk-from-file\"").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.api_key, "sk-from-file");
    }
}
