//! Compiler configuration, loaded from TOML.
//!
//! ```toml
//! strict = true
//! default_atr_period = 20
//!
//! [indicator_defaults.rsi]
//! period = 10
//!
//! [codegen]
//! class_name = "MyStrategy"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::indicators::{check_param, IndicatorKind};

/// Errors loading or checking a `CompilerConfig`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown indicator in indicator_defaults: {0}")]
    UnknownIndicator(String),
    #[error("indicator_defaults.{indicator}.{param}: {reason}")]
    InvalidDefault {
        indicator: String,
        param: String,
        reason: String,
    },
    #[error("default_atr_period must be >= 1")]
    InvalidAtrPeriod,
    #[error("codegen.class_name `{0}` is not a valid identifier")]
    InvalidClassName(String),
}

/// Options for the Python back-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenConfig {
    /// Name of the generated `Strategy` subclass.
    pub class_name: String,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            class_name: "WickStrategy".into(),
        }
    }
}

impl CodegenConfig {
    /// The class name is pasted into generated source, so it must be a plain
    /// ASCII identifier.
    pub fn check(&self) -> Result<(), ConfigError> {
        let mut chars = self.class_name.chars();
        let valid = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid {
            Ok(())
        } else {
            Err(ConfigError::InvalidClassName(self.class_name.clone()))
        }
    }
}

/// Compiler options. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Promote every compile warning to an error.
    pub strict: bool,
    /// Per-indicator overrides of the documented parameter defaults.
    pub indicator_defaults: BTreeMap<String, BTreeMap<String, f64>>,
    /// ATR period for AtrMultiple exits that omit one.
    pub default_atr_period: usize,
    pub codegen: CodegenConfig,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            strict: false,
            indicator_defaults: BTreeMap::new(),
            default_atr_period: 14,
            codegen: CodegenConfig::default(),
        }
    }
}

impl CompilerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.check()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Configured default overrides for one indicator, if any.
    pub fn defaults_for(&self, indicator: IndicatorKind) -> Option<&BTreeMap<String, f64>> {
        self.indicator_defaults.get(indicator.name())
    }

    /// Reject overrides that name unknown indicators or carry invalid values.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.default_atr_period == 0 {
            return Err(ConfigError::InvalidAtrPeriod);
        }
        self.codegen.check()?;
        for (name, params) in &self.indicator_defaults {
            let kind = IndicatorKind::from_name(name)
                .ok_or_else(|| ConfigError::UnknownIndicator(name.clone()))?;
            for (param, &value) in params {
                let def = kind
                    .params()
                    .iter()
                    .find(|d| d.name == param.as_str())
                    .ok_or_else(|| ConfigError::InvalidDefault {
                        indicator: name.clone(),
                        param: param.clone(),
                        reason: "unknown parameter".into(),
                    })?;
                check_param(def, value).map_err(|e| ConfigError::InvalidDefault {
                    indicator: name.clone(),
                    param: param.clone(),
                    reason: e.reason.into(),
                })?;
            }
        }
        Ok(())
    }
}
