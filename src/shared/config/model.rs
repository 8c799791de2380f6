use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingConfig,
    pub transform: TransformConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub stdout_level: String,
    pub file_level: String,
    pub log_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            stdout_level: "info".to_string(),
            file_level: "debug".to_string(),
            log_dir: "logs".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Upper bound on a single engine round-trip; enforced at the protocol
    /// boundary, not by the scheduler.
    pub request_timeout_ms: u64,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
        }
    }
}

pub fn load_settings() -> Result<Settings, config::ConfigError> {
    let config_path = env::var("COLUMNFLOW_CONFIG").unwrap_or_else(|_| "config".to_string());

    let settings: Settings = config::Config::builder()
        .add_source(config::File::with_name(&config_path).required(false))
        .build()?
        .try_deserialize()?;

    Ok(settings)
}
