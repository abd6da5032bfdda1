use crate::error::AppError;
use crate::processor::{DEFAULT_QUALITY, MAX_QUALITY, MIN_QUALITY};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_LOG_FILE_NAME: &str = "imgcomp.log";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub default_quality: u8,
    pub log_file: Option<PathBuf>,
    pub log_level: String,
}

impl AppConfig {
    /// Layers built-in defaults, the `config/` directory, `IMGCOMP_*`
    /// environment variables and finally `explicit`, if given.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let env = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            .set_default("default_quality", i64::from(DEFAULT_QUALITY))?
            .set_default("log_level", "info")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("IMGCOMP"));

        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !(MIN_QUALITY..=MAX_QUALITY).contains(&self.default_quality) {
            return Err(AppError::Validation(format!(
                "default_quality must be between {} and {}, got {}",
                MIN_QUALITY, MAX_QUALITY, self.default_quality
            )));
        }
        Ok(())
    }

    /// The configured log file, or `imgcomp.log` beside the running executable.
    pub fn resolved_log_file(&self) -> PathBuf {
        if let Some(path) = &self.log_file {
            return path.clone();
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_LOG_FILE_NAME)))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE_NAME))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_quality: DEFAULT_QUALITY,
            log_file: None,
            log_level: "info".into(),
        }
    }
}
