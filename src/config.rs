//! Configuration management for the migration tooling

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TemplatesConfig {
    /// Directory holding one CSV per template, header row only
    pub dir: PathBuf,
    /// Rows per output spreadsheet unless overridden per template
    pub row_limit: usize,
    /// Per-template row limits, keyed by lowercase template name
    pub row_limits: HashMap<String, usize>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AssetsConfig {
    /// Root of the digitised holdings share (`<root>/<pre>/<mid>/<suf>`)
    pub share_root: Option<PathBuf>,
    /// Bounding box for generated JPEG derivatives, in pixels
    pub derivative_dimension: u32,
    /// Parallel derivative jobs
    pub derivative_workers: usize,
    /// Multimedia images whose longest side is below this are replaced
    pub replace_min_dimension: u32,
    /// ImageMagick executable
    pub magick_program: String,
    /// qpdf executable used to concatenate PDFs
    pub pdf_program: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub templates: TemplatesConfig,
    pub assets: AssetsConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load(extra: Option<&Path>) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false));

        if let Some(path) = extra {
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            // Environment variables with prefix EMU_MIGRATE__ (double underscore separates sections)
            .add_source(
                Environment::with_prefix("EMU_MIGRATE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option(
                "assets.share_root",
                env::var("DIGITISED_HOLDINGS").ok(),
            )?
            .build()?;

        config.try_deserialize()
    }
}

impl TemplatesConfig {
    /// Row limit for a template, falling back to the default limit
    pub fn row_limit_for(&self, template: &str) -> usize {
        self.row_limits
            .get(&template.to_lowercase())
            .copied()
            .unwrap_or(self.row_limit)
    }
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("templates"),
            row_limit: 3000,
            row_limits: HashMap::new(),
        }
    }
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            share_root: None,
            derivative_dimension: 2048,
            derivative_workers: 4,
            replace_min_dimension: 2000,
            magick_program: "magick".to_string(),
            pdf_program: "qpdf".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_limit_override() {
        let mut config = TemplatesConfig::default();
        config.row_limits.insert("image".to_string(), 500);

        assert_eq!(config.row_limit_for("Image"), 500);
        assert_eq!(config.row_limit_for("item"), 3000);
    }
}
