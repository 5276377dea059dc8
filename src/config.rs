// File: src/config.rs
//
// Runtime configuration. Values come from a TOML file (explicit `--config`
// path, or `macrocalc.toml` in the working directory) and are then
// overridden by command-line flags.
//
// ```toml
// [output]
// precision = 6
//
// [diagnostics]
// color = "auto"      # auto | always | never
// show_source = true
// ```

use crate::errors::{CalcError, CalcResult};
use crate::interpreter::DEFAULT_PRECISION;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "macrocalc.toml";

/// Largest precision that still distinguishes every f64
pub const MAX_PRECISION: usize = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    /// Applies the choice to all `colored` output of this process.
    pub fn apply(self) {
        match self {
            ColorChoice::Always => colored::control::set_override(true),
            ColorChoice::Never => colored::control::set_override(false),
            ColorChoice::Auto => colored::control::unset_override(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Significant digits used when printing numbers
    pub precision: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig { precision: DEFAULT_PRECISION }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiagnosticsConfig {
    pub color: ColorChoice,
    /// Show the offending source line under error messages
    pub show_source: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        DiagnosticsConfig { color: ColorChoice::Auto, show_source: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub output: OutputConfig,
    pub diagnostics: DiagnosticsConfig,
}

impl Config {
    pub fn from_toml_str(text: &str) -> CalcResult<Config> {
        let config: Config =
            toml::from_str(text).map_err(|e| CalcError::config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given (it must exist), else from `macrocalc.toml`
    /// in the working directory if present, else defaults.
    pub fn load(path: Option<&Path>) -> CalcResult<Config> {
        let path = match path {
            Some(path) => path,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if !default_path.exists() {
                    tracing::debug!("no config file, using defaults");
                    return Ok(Config::default());
                }
                default_path
            }
        };

        let text = fs::read_to_string(path)
            .map_err(|e| CalcError::config(format!("Failed to read {}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Self::from_toml_str(&text)
            .map_err(|e| e.with_note(format!("while reading {}", path.display())))
    }

    pub fn with_precision(mut self, precision: Option<usize>) -> CalcResult<Config> {
        if let Some(precision) = precision {
            self.output.precision = precision;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn with_color(mut self, color: Option<ColorChoice>) -> Config {
        if let Some(color) = color {
            self.diagnostics.color = color;
        }
        self
    }

    fn validate(&self) -> CalcResult<()> {
        if self.output.precision == 0 || self.output.precision > MAX_PRECISION {
            return Err(CalcError::config(format!(
                "output.precision must be between 1 and {}, got {}",
                MAX_PRECISION, self.output.precision
            )));
        }
        Ok(())
    }
}
