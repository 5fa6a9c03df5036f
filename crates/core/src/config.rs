use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub gateway: GatewayConfig,
    pub server: ServerConfig,
    pub restaurant: RestaurantConfig,
    pub logging: LoggingConfig,
}

/// Chat-completion provider settings. The api key is optional at load time:
/// a missing key surfaces as a model-invocation failure on first use, never
/// as a startup crash.
#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

/// Voice gateway (telephony provider) settings. Same lazy-failure policy as
/// the LLM key.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub from_number: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL of this service; the relay websocket
    /// address handed to the gateway is derived from it. Required only when
    /// initiating outbound calls.
    pub public_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct RestaurantConfig {
    pub name: String,
    pub phone: String,
    pub max_party_size: u32,
    pub opening_hour: u32,
    pub closing_hour: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub gateway_api_key: Option<String>,
    pub server_port: Option<u16>,
    pub public_url: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                api_key: None,
                base_url: "https://openrouter.ai/api/v1".to_string(),
                model: "openai/gpt-4-turbo-preview".to_string(),
                temperature: 0.7,
                timeout_secs: 30,
            },
            gateway: GatewayConfig {
                api_key: None,
                base_url: "https://api.retellai.com".to_string(),
                from_number: "+1234567890".to_string(),
            },
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                public_url: None,
            },
            restaurant: RestaurantConfig {
                name: "Pizza Palace".to_string(),
                phone: "+1234567890".to_string(),
                max_party_size: 8,
                opening_hour: 11,
                closing_hour: 22,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("tably.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(gateway) = patch.gateway {
            if let Some(gateway_api_key_value) = gateway.api_key {
                self.gateway.api_key = Some(secret_value(gateway_api_key_value));
            }
            if let Some(base_url) = gateway.base_url {
                self.gateway.base_url = base_url;
            }
            if let Some(from_number) = gateway.from_number {
                self.gateway.from_number = from_number;
            }
        }

        if let Some(server) = patch.server {
            if let Some(host) = server.host {
                self.server.host = host;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(public_url) = server.public_url {
                self.server.public_url = Some(public_url);
            }
        }

        if let Some(restaurant) = patch.restaurant {
            if let Some(name) = restaurant.name {
                self.restaurant.name = name;
            }
            if let Some(phone) = restaurant.phone {
                self.restaurant.phone = phone;
            }
            if let Some(max_party_size) = restaurant.max_party_size {
                self.restaurant.max_party_size = max_party_size;
            }
            if let Some(opening_hour) = restaurant.opening_hour {
                self.restaurant.opening_hour = opening_hour;
            }
            if let Some(closing_hour) = restaurant.closing_hour {
                self.restaurant.closing_hour = closing_hour;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("TABLY_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("TABLY_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("TABLY_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("TABLY_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("TABLY_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("TABLY_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("TABLY_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TABLY_GATEWAY_API_KEY") {
            self.gateway.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("TABLY_GATEWAY_BASE_URL") {
            self.gateway.base_url = value;
        }
        if let Some(value) = read_env("TABLY_GATEWAY_FROM_NUMBER") {
            self.gateway.from_number = value;
        }

        if let Some(value) = read_env("TABLY_SERVER_HOST") {
            self.server.host = value;
        }
        if let Some(value) = read_env("TABLY_SERVER_PORT") {
            self.server.port = parse_u16("TABLY_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("TABLY_SERVER_PUBLIC_URL") {
            self.server.public_url = Some(value);
        }

        if let Some(value) = read_env("TABLY_RESTAURANT_NAME") {
            self.restaurant.name = value;
        }
        if let Some(value) = read_env("TABLY_RESTAURANT_PHONE") {
            self.restaurant.phone = value;
        }
        if let Some(value) = read_env("TABLY_RESTAURANT_MAX_PARTY_SIZE") {
            self.restaurant.max_party_size =
                parse_u32("TABLY_RESTAURANT_MAX_PARTY_SIZE", &value)?;
        }
        if let Some(value) = read_env("TABLY_RESTAURANT_OPENING_HOUR") {
            self.restaurant.opening_hour = parse_u32("TABLY_RESTAURANT_OPENING_HOUR", &value)?;
        }
        if let Some(value) = read_env("TABLY_RESTAURANT_CLOSING_HOUR") {
            self.restaurant.closing_hour = parse_u32("TABLY_RESTAURANT_CLOSING_HOUR", &value)?;
        }

        let log_level = read_env("TABLY_LOGGING_LEVEL").or_else(|| read_env("TABLY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("TABLY_LOGGING_FORMAT").or_else(|| read_env("TABLY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(gateway_api_key) = overrides.gateway_api_key {
            self.gateway.api_key = Some(secret_value(gateway_api_key));
        }
        if let Some(server_port) = overrides.server_port {
            self.server.port = server_port;
        }
        if let Some(public_url) = overrides.public_url {
            self.server.public_url = Some(public_url);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    /// Structural validation only. Missing API keys pass: key-dependent
    /// failures surface at first use of the dependent external call.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_restaurant(&self.restaurant)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("tably.toml"), PathBuf::from("config/tably.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !llm.temperature.is_finite() || llm.temperature < 0.0 || llm.temperature > 2.0 {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    if llm.base_url.trim().is_empty() {
        return Err(ConfigError::Validation("llm.base_url must not be empty".to_string()));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if let Some(public_url) = &server.public_url {
        let valid_scheme = ["http://", "https://", "ws://", "wss://"]
            .iter()
            .any(|scheme| public_url.starts_with(scheme));
        if !valid_scheme {
            return Err(ConfigError::Validation(
                "server.public_url must start with http(s):// or ws(s)://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_restaurant(restaurant: &RestaurantConfig) -> Result<(), ConfigError> {
    if restaurant.max_party_size == 0 {
        return Err(ConfigError::Validation(
            "restaurant.max_party_size must be greater than zero".to_string(),
        ));
    }

    if restaurant.closing_hour > 24 || restaurant.opening_hour >= restaurant.closing_hour {
        return Err(ConfigError::Validation(
            "restaurant hours must satisfy opening_hour < closing_hour <= 24".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    gateway: Option<GatewayPatch>,
    server: Option<ServerPatch>,
    restaurant: Option<RestaurantPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct GatewayPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    from_number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    host: Option<String>,
    port: Option<u16>,
    public_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RestaurantPatch {
    name: Option<String>,
    phone: Option<String>,
    max_party_size: Option<u32>,
    opening_hour: Option<u32>,
    closing_hour: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_load_without_any_keys() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.llm.api_key.is_none(), "llm key should default to absent")?;
        ensure(config.gateway.api_key.is_none(), "gateway key should default to absent")?;
        ensure(config.server.port == 8000, "default port should be 8000")?;
        ensure(config.restaurant.max_party_size == 8, "default max party size should be 8")?;
        Ok(())
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_TABLY_LLM_KEY", "sk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("tably.toml");
            fs::write(
                &path,
                r#"
[llm]
api_key = "${TEST_TABLY_LLM_KEY}"

[restaurant]
name = "Trattoria Uno"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            let api_key = config.llm.api_key.as_ref().ok_or("llm key should be set")?;
            ensure(
                api_key.expose_secret() == "sk-from-env",
                "llm key should be loaded from environment",
            )?;
            ensure(config.restaurant.name == "Trattoria Uno", "restaurant name should load")?;
            Ok(())
        })();

        clear_vars(&["TEST_TABLY_LLM_KEY"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TABLY_LLM_MODEL", "model-from-env");
        env::set_var("TABLY_SERVER_PORT", "9001");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("tably.toml");
            fs::write(
                &path,
                r#"
[llm]
model = "model-from-file"

[server]
port = 9000

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.llm.model == "model-from-env", "env model should win over file")?;
            ensure(config.server.port == 9001, "env port should win over file")?;
            ensure(config.logging.level == "debug", "programmatic override should win")?;
            Ok(())
        })();

        clear_vars(&["TABLY_LLM_MODEL", "TABLY_SERVER_PORT"]);
        result
    }

    #[test]
    fn malformed_env_values_are_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TABLY_SERVER_PORT", "not-a-port");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected load failure for malformed port".to_string()),
                Err(error) => error,
            };
            let invalid_override = matches!(
                error,
                ConfigError::InvalidEnvOverride { ref key, .. } if key == "TABLY_SERVER_PORT"
            );
            ensure(invalid_override, "failure should name the offending variable")
        })();

        clear_vars(&["TABLY_SERVER_PORT"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TABLY_LOG_LEVEL", "warn");
        env::set_var("TABLY_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warn level should come from env alias")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty format should come from env alias",
            )?;
            Ok(())
        })();

        clear_vars(&["TABLY_LOG_LEVEL", "TABLY_LOG_FORMAT"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TABLY_LLM_API_KEY", "sk-secret-value");
        env::set_var("TABLY_GATEWAY_API_KEY", "key-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sk-secret-value"), "debug output should not leak llm key")?;
            ensure(
                !debug.contains("key-secret-value"),
                "debug output should not leak gateway key",
            )?;
            Ok(())
        })();

        clear_vars(&["TABLY_LLM_API_KEY", "TABLY_GATEWAY_API_KEY"]);
        result
    }

    #[test]
    fn invalid_restaurant_hours_fail_validation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TABLY_RESTAURANT_OPENING_HOUR", "23");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected validation failure for hours".to_string()),
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("opening_hour")
            );
            ensure(has_message, "validation failure should mention restaurant hours")
        })();

        clear_vars(&["TABLY_RESTAURANT_OPENING_HOUR"]);
        result
    }
}
