//! Logic for loading configuration in to an object model

use std::str::FromStr;

use displaydoc::Display;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::arguments::ArgumentsConfig;
use crate::rules::TransformRuleset;
use crate::tree::builder::DEFAULT_RECURSION_LIMIT;

mod schema;

pub use schema::generate_config_schema;

/// Configuration error.
#[derive(Debug, Error, Display)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// could not deserialize configuration: {0}
    DeserializeConfigError(#[from] serde_yaml::Error),
    /// {message}: {error}
    InvalidConfiguration {
        message: &'static str,
        error: String,
    },
}

/// The configuration of the reshaper.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Configuration {
    /// Transform rules, keyed by root field name.
    #[schemars(with = "serde_json::Map<String, serde_json::Value>")]
    pub rules: TransformRuleset,

    /// Argument transforms.
    pub arguments: ArgumentsConfig,

    /// Parser and tree builder limits.
    pub limits: Limits,
}

#[buildstructor::buildstructor]
impl Configuration {
    #[builder]
    pub fn new(
        rules: Option<TransformRuleset>,
        arguments: Option<ArgumentsConfig>,
        limits: Option<Limits>,
    ) -> Self {
        Self {
            rules: rules.unwrap_or_default(),
            arguments: arguments.unwrap_or_default(),
            limits: limits.unwrap_or_default(),
        }
    }

    fn validate(self) -> Result<Self, ConfigurationError> {
        if self.limits.recursion_limit == 0 {
            return Err(ConfigurationError::InvalidConfiguration {
                message: "invalid limits",
                error: "recursion_limit must be greater than 0".to_string(),
            });
        }
        Ok(self)
    }
}

impl FromStr for Configuration {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_yaml::from_str::<Configuration>(s)?.validate()
    }
}

/// Limits applied while reading requests.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Limits {
    /// Maximum nesting of selection sets, fragments included.
    pub recursion_limit: usize,
}

#[buildstructor::buildstructor]
impl Limits {
    #[builder]
    pub fn new(recursion_limit: Option<usize>) -> Self {
        Self {
            recursion_limit: recursion_limit.unwrap_or(DEFAULT_RECURSION_LIMIT),
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Limits::builder().build()
    }
}
