use crate::error::{Error, Result};
use crate::params::transform::TransformOptions;
use crate::params::validation::ValidatorOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::env;
#[cfg(feature = "config")]
use std::fs;
#[cfg(feature = "config")]
use std::path::Path;

/// Environment type for configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Get environment from string
    pub fn parse(env: &str) -> Self {
        match env.to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "dev",
            Environment::Production => "prod",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Global validation switch: `false`, `true` or a set of validator options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValidationSetting {
    Enabled(bool),
    Options(ValidatorOptions),
}

impl Default for ValidationSetting {
    fn default() -> Self {
        Self::Enabled(false)
    }
}

impl ValidationSetting {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Enabled(false))
    }

    /// Options to validate with when some level turns validation on
    pub fn options(&self) -> ValidatorOptions {
        match self {
            Self::Options(options) => options.clone(),
            Self::Enabled(_) => ValidatorOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamDefaults {
    /// If set, every parameter without its own `required` flag uses it
    #[serde(default)]
    pub required: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultDefaults {
    /// Status used for `null` results when the action declares no `on_null`
    #[serde(default)]
    pub null_result_code: Option<u16>,

    /// Status used for `undefined` results when the action declares no `on_undefined`
    #[serde(default)]
    pub undefined_result_code: Option<u16>,

    #[serde(default)]
    pub param_options: ParamDefaults,
}

/// Options recognized by the controller pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllersConfig {
    #[serde(default)]
    pub environment: Environment,

    /// Explicit development switch; derived from `environment` when absent
    #[serde(default)]
    pub development: Option<bool>,

    /// Prefix prepended to every literal route, e.g. `/api`
    #[serde(default)]
    pub route_prefix: Option<String>,

    /// Whether parameters are turned into typed instances and responses back
    #[serde(default = "default_true")]
    pub class_transformer: bool,

    #[serde(default)]
    pub validation: ValidationSetting,

    #[serde(default)]
    pub plain_to_class_transform_options: Option<TransformOptions>,

    #[serde(default)]
    pub class_to_plain_transform_options: Option<TransformOptions>,

    #[serde(default)]
    pub defaults: ResultDefaults,

    /// Error name => JSON object merged into that error's response body
    #[serde(default)]
    pub error_overriding_map: HashMap<String, Value>,
}

fn default_true() -> bool {
    true
}

impl Default for ControllersConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            development: None,
            route_prefix: None,
            class_transformer: true,
            validation: ValidationSetting::default(),
            plain_to_class_transform_options: None,
            class_to_plain_transform_options: None,
            defaults: ResultDefaults::default(),
            error_overriding_map: HashMap::new(),
        }
    }
}

impl ControllersConfig {
    /// Load configuration from a TOML file
    #[cfg(feature = "config")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let content = fs::read_to_string(path_ref).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {}",
                path_ref.display(),
                e
            ))
        })?;

        let config = Self::from_toml_str(&content).map_err(|e| {
            Error::config(format!(
                "Failed to parse config file '{}': {}",
                path_ref.display(),
                e
            ))
        })?;

        log::debug!(
            "Successfully loaded controllers configuration from: {}",
            path_ref.display()
        );
        Ok(config)
    }

    #[cfg(feature = "config")]
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: ControllersConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment variable overrides applied
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Detect current environment from environment variables
    pub fn detect_environment() -> Environment {
        if let Ok(env) = env::var("RUSTF_ENV") {
            return Environment::parse(&env);
        }
        Environment::Development
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.environment = Self::detect_environment();

        if let Ok(prefix) = env::var("RUSTF_ROUTE_PREFIX") {
            self.route_prefix = Some(prefix);
        }

        if let Ok(flag) = env::var("RUSTF_DEVELOPMENT") {
            let parsed = flag.parse::<bool>().map_err(|_| {
                Error::config(format!("RUSTF_DEVELOPMENT must be true or false, got '{}'", flag))
            })?;
            self.development = Some(parsed);
        }

        self.validate()
    }

    /// Check values serde cannot check
    pub fn validate(&self) -> Result<()> {
        let codes = [
            ("defaults.null_result_code", self.defaults.null_result_code),
            (
                "defaults.undefined_result_code",
                self.defaults.undefined_result_code,
            ),
        ];
        for (key, code) in codes {
            if let Some(code) = code {
                if !(100..=599).contains(&code) {
                    return Err(Error::config(format!(
                        "{} must be a valid HTTP status, got {}",
                        key, code
                    )));
                }
            }
        }

        for (name, shape) in &self.error_overriding_map {
            if !shape.is_object() {
                return Err(Error::config(format!(
                    "error_overriding_map.{} must be a table",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Whether error details are exposed to clients
    pub fn is_development(&self) -> bool {
        self.development
            .unwrap_or(!self.environment.is_production())
    }

    pub fn with_route_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.route_prefix = Some(prefix.into());
        self
    }

    pub fn with_validation(mut self, validation: ValidationSetting) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_development(mut self, development: bool) -> Self {
        self.development = Some(development);
        self
    }
}
