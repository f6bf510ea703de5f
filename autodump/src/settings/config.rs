use autodump_core::settings::dump::DumpSettings;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
#[readonly::make]
pub struct Settings {
    pub debug: bool,
    /// Comma separated list, `metrics` enables the OpenTelemetry exporter
    pub telemetry: Option<String>,
    pub dump: DumpSettings,
}

impl Settings {
    pub fn get_environment() -> Environment {
        Environment::default()
            .prefix("AUTODUMP")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
    }

    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("AUTODUMP_RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Self::get_environment());

        Self::from_config(builder.build()?)
    }

    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let mut settings: Settings = config.try_deserialize()?;

        // Special strings allow disabling telemetry via environment
        // variables, even if set in the default config
        settings.telemetry = settings.check_if_optional(&settings.telemetry);
        settings
            .dump
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(settings)
    }

    pub fn metrics_enabled(&self) -> bool {
        self.telemetry
            .as_ref()
            .map(|t| t.to_lowercase().split(',').any(|s| s.trim() == "metrics"))
            .unwrap_or(false)
    }

    fn check_if_optional(&self, s: &Option<String>) -> Option<String> {
        match s {
            None => None,
            Some(s) => match s.to_lowercase().as_str() {
                "no" | "false" | "0" | "" => None,
                _ => Some(s.to_string()),
            },
        }
    }
}
