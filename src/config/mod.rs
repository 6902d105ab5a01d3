//! Feature flags and platform constants
//!
//! Validation behavior depends on a small set of flags that the surrounding
//! controller keeps in a config map. They are carried as an immutable
//! [`FeatureFlags`] value passed into every validation call.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{ErrorCode, TaskVarsError};

pub mod loader;

pub use loader::ConfigLoader;

/// Config-map key selecting the API tier
pub const ENABLE_API_FIELDS_KEY: &str = "enable-api-fields";
/// Config-map key allowing `enum` on parameter declarations
pub const ENABLE_PARAM_ENUM_KEY: &str = "enable-param-enum";
/// Config-map key allowing CEL in step `when` expressions
pub const ENABLE_CEL_IN_WHEN_KEY: &str = "enable-cel-in-whenexpression";

/// API stability tier, ordered from most permissive to strictest
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ApiFields {
    Alpha,
    #[default]
    Beta,
    Stable,
}

impl ApiFields {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiFields::Alpha => "alpha",
            ApiFields::Beta => "beta",
            ApiFields::Stable => "stable",
        }
    }

    /// Whether a construct that needs `required` may be used at this tier
    pub fn permits(&self, required: ApiFields) -> bool {
        *self <= required
    }
}

impl fmt::Display for ApiFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiFields {
    type Err = TaskVarsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "alpha" => Ok(ApiFields::Alpha),
            "beta" => Ok(ApiFields::Beta),
            "stable" => Ok(ApiFields::Stable),
            other => Err(TaskVarsError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                format!(
                    "invalid value for {}: {:?} (expected alpha, beta or stable)",
                    ENABLE_API_FIELDS_KEY, other
                ),
            )),
        }
    }
}

/// Feature flags that change what validation accepts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FeatureFlags {
    #[serde(default)]
    pub enable_api_fields: ApiFields,
    #[serde(default)]
    pub enable_param_enum: bool,
    #[serde(default, rename = "enable-cel-in-whenexpression")]
    pub enable_cel_in_when_expression: bool,
}

impl FeatureFlags {
    pub fn alpha() -> Self {
        Self::default().with_api_fields(ApiFields::Alpha)
    }

    pub fn beta() -> Self {
        Self::default().with_api_fields(ApiFields::Beta)
    }

    pub fn stable() -> Self {
        Self::default().with_api_fields(ApiFields::Stable)
    }

    pub fn with_api_fields(mut self, api_fields: ApiFields) -> Self {
        self.enable_api_fields = api_fields;
        self
    }

    pub fn with_param_enum(mut self, enabled: bool) -> Self {
        self.enable_param_enum = enabled;
        self
    }

    pub fn with_cel_in_when_expression(mut self, enabled: bool) -> Self {
        self.enable_cel_in_when_expression = enabled;
        self
    }

    /// Build flags from config-map style string data.
    ///
    /// Unknown keys are ignored; known keys with unparsable values are errors.
    pub fn from_config_map(data: &BTreeMap<String, String>) -> Result<Self, TaskVarsError> {
        let mut flags = Self::default();
        flags.apply_config_map(data)?;
        Ok(flags)
    }

    /// Overlay config-map style string data onto these flags
    pub fn apply_config_map(&mut self, data: &BTreeMap<String, String>) -> Result<(), TaskVarsError> {
        if let Some(value) = data.get(ENABLE_API_FIELDS_KEY) {
            self.enable_api_fields = value.parse()?;
        }
        if let Some(value) = data.get(ENABLE_PARAM_ENUM_KEY) {
            self.enable_param_enum = parse_bool(ENABLE_PARAM_ENUM_KEY, value)?;
        }
        if let Some(value) = data.get(ENABLE_CEL_IN_WHEN_KEY) {
            self.enable_cel_in_when_expression = parse_bool(ENABLE_CEL_IN_WHEN_KEY, value)?;
        }
        Ok(())
    }
}

pub(crate) fn parse_bool(key: &str, value: &str) -> Result<bool, TaskVarsError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(TaskVarsError::config_with_code(
            ErrorCode::CONFIG_INVALID_VALUE,
            format!("invalid value for {}: {:?} (expected true or false)", key, other),
        )),
    }
}

/// Filesystem locations that path-valued references resolve to at run time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformPaths {
    #[serde(default = "default_results_dir")]
    pub results_dir: String,
    #[serde(default = "default_steps_dir")]
    pub steps_dir: String,
    #[serde(default = "default_credentials_path")]
    pub credentials_path: String,
    #[serde(default = "default_workspace_root")]
    pub workspace_root: String,
}

fn default_results_dir() -> String {
    "/tekton/results".to_string()
}

fn default_steps_dir() -> String {
    "/tekton/steps".to_string()
}

fn default_credentials_path() -> String {
    "/tekton/creds".to_string()
}

fn default_workspace_root() -> String {
    "/workspace".to_string()
}

impl Default for PlatformPaths {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            steps_dir: default_steps_dir(),
            credentials_path: default_credentials_path(),
            workspace_root: default_workspace_root(),
        }
    }
}

impl PlatformPaths {
    /// Path a task result named `name` is written to
    pub fn result_path(&self, name: &str) -> String {
        format!("{}/{}", self.results_dir, name)
    }

    /// Path a step result is written to, scoped to the owning step
    pub fn step_result_path(&self, step_name: &str, name: &str) -> String {
        format!("{}/step-{}/results/{}", self.steps_dir, step_name, name)
    }

    /// Mount path a workspace gets when it declares none
    pub fn default_workspace_path(&self, workspace: &str) -> String {
        format!("{}/{}", self.workspace_root, workspace)
    }
}
