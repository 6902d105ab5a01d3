use super::{parse_bool, FeatureFlags, ENABLE_CEL_IN_WHEN_KEY, ENABLE_PARAM_ENUM_KEY};
use crate::error::{ErrorCode, TaskVarsError};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Environment variable overriding `enable-api-fields`
pub const ENV_API_FIELDS: &str = "TASKVARS_ENABLE_API_FIELDS";
/// Environment variable overriding `enable-param-enum`
pub const ENV_PARAM_ENUM: &str = "TASKVARS_ENABLE_PARAM_ENUM";
/// Environment variable overriding `enable-cel-in-whenexpression`
pub const ENV_CEL_IN_WHEN: &str = "TASKVARS_ENABLE_CEL_IN_WHENEXPRESSION";

/// Loads [`FeatureFlags`] from a YAML file and the environment.
///
/// Precedence, lowest first: built-in defaults, the file, environment
/// variables. The file may be a bare key map or a config-map document whose
/// flags live under `data:`.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Load using the process environment
    pub fn load(&self) -> Result<FeatureFlags, TaskVarsError> {
        self.load_with_env(|key| std::env::var(key).ok())
    }

    /// Load using a custom environment lookup (for tests)
    pub fn load_with_env<F>(&self, env: F) -> Result<FeatureFlags, TaskVarsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut flags = FeatureFlags::default();

        if let Some(path) = &self.path {
            if path.exists() {
                let data = read_config_map(path)?;
                flags.apply_config_map(&data)?;
                debug!("Loaded feature flags from {}", path.display());
            } else {
                debug!(
                    "Feature flag file {} not found, using defaults",
                    path.display()
                );
            }
        }

        merge_env_vars(&mut flags, env)?;
        trace!("Effective feature flags: {:?}", flags);
        Ok(flags)
    }
}

fn merge_env_vars<F>(flags: &mut FeatureFlags, env: F) -> Result<(), TaskVarsError>
where
    F: Fn(&str) -> Option<String>,
{
    let env_error = |err: TaskVarsError, var: &str| {
        TaskVarsError::config_with_code(
            ErrorCode::CONFIG_INVALID_ENV,
            format!("{} is invalid: {}", var, err),
        )
    };

    if let Some(value) = env(ENV_API_FIELDS) {
        flags.enable_api_fields = value.parse().map_err(|e| env_error(e, ENV_API_FIELDS))?;
    }
    if let Some(value) = env(ENV_PARAM_ENUM) {
        flags.enable_param_enum =
            parse_bool(ENABLE_PARAM_ENUM_KEY, &value).map_err(|e| env_error(e, ENV_PARAM_ENUM))?;
    }
    if let Some(value) = env(ENV_CEL_IN_WHEN) {
        flags.enable_cel_in_when_expression = parse_bool(ENABLE_CEL_IN_WHEN_KEY, &value)
            .map_err(|e| env_error(e, ENV_CEL_IN_WHEN))?;
    }
    Ok(())
}

fn read_config_map(path: &Path) -> Result<BTreeMap<String, String>, TaskVarsError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        TaskVarsError::config_with_code(
            ErrorCode::CONFIG_NOT_FOUND,
            format!("Cannot read feature flag file {}", path.display()),
        )
        .with_source(e)
    })?;
    parse_config_map(&content).map_err(|e| match e {
        TaskVarsError::Config { .. } => e,
        other => TaskVarsError::config_with_code(
            ErrorCode::CONFIG_INVALID_YAML,
            format!("Invalid feature flag file {}", path.display()),
        )
        .with_source(other),
    })
}

/// Parse feature flag YAML into flat string data
pub(crate) fn parse_config_map(content: &str) -> Result<BTreeMap<String, String>, TaskVarsError> {
    let document: Value = serde_yaml::from_str(content)?;
    let table = match &document {
        Value::Mapping(map) => match map.get("data") {
            Some(Value::Mapping(data)) => data,
            _ => map,
        },
        Value::Null => return Ok(BTreeMap::new()),
        _ => {
            return Err(TaskVarsError::config_with_code(
                ErrorCode::CONFIG_INVALID_YAML,
                "feature flag document must be a mapping",
            ))
        }
    };

    let mut data = BTreeMap::new();
    for (key, value) in table {
        let Some(key) = key.as_str() else { continue };
        let rendered = match value {
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            _ => continue,
        };
        data.insert(key.to_string(), rendered);
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiFields;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let loader = ConfigLoader::new().with_file("/definitely/not/here.yaml");
        let flags = loader.load_with_env(no_env).unwrap();
        assert_eq!(flags, FeatureFlags::default());
    }

    #[test]
    fn test_loads_config_map_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("feature-flags.yaml");
        std::fs::write(
            &path,
            r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: feature-flags
data:
  enable-api-fields: "alpha"
  enable-param-enum: "true"
"#,
        )
        .unwrap();

        let flags = ConfigLoader::new()
            .with_file(&path)
            .load_with_env(no_env)
            .unwrap();
        assert_eq!(flags.enable_api_fields, ApiFields::Alpha);
        assert!(flags.enable_param_enum);
        assert!(!flags.enable_cel_in_when_expression);
    }

    #[test]
    fn test_loads_bare_map_with_yaml_bools() {
        let data = parse_config_map("enable-cel-in-whenexpression: true\nenable-api-fields: stable\n")
            .unwrap();
        let flags = FeatureFlags::from_config_map(&data).unwrap();
        assert_eq!(flags.enable_api_fields, ApiFields::Stable);
        assert!(flags.enable_cel_in_when_expression);
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flags.yaml");
        std::fs::write(&path, "enable-api-fields: alpha\n").unwrap();

        let env: HashMap<&str, &str> = [(ENV_API_FIELDS, "stable"), (ENV_PARAM_ENUM, "true")]
            .into_iter()
            .collect();
        let flags = ConfigLoader::new()
            .with_file(&path)
            .load_with_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(flags.enable_api_fields, ApiFields::Stable);
        assert!(flags.enable_param_enum);
    }

    #[test]
    fn test_invalid_env_value_is_config_error() {
        let err = ConfigLoader::new()
            .load_with_env(|key| (key == ENV_CEL_IN_WHEN).then(|| "maybe".to_string()))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_INVALID_ENV);
        assert!(err.to_string().contains(ENV_CEL_IN_WHEN));
    }

    #[test]
    fn test_non_mapping_document_rejected() {
        let err = parse_config_map("- a\n- b\n").unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_INVALID_YAML);
    }
}
