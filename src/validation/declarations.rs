//! Checks on declared parameters, results, workspaces and volumes,
//! independent of where they are referenced

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::field_error::{ErrorKind, FieldError, FieldErrors, FieldPath};
use crate::config::{
    ApiFields, FeatureFlags, PlatformPaths, ENABLE_API_FIELDS_KEY, ENABLE_PARAM_ENUM_KEY,
};
use crate::spec::{
    clean_path, ParamSpec, ParamType, ParamValue, ResultSpec, Step, StepTemplate, Volume,
    WorkspaceDeclaration,
};

/// String and array parameter names
static STRING_ARRAY_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[_a-zA-Z][_a-zA-Z0-9.-]*$").expect("Valid regex pattern"));

/// Object parameter names and their keys: no dots
static OBJECT_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[_a-zA-Z][_a-zA-Z0-9-]*$").expect("Valid regex pattern"));

const RESULT_NAME_PATTERN: &str = "^([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9]$";

static RESULT_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(RESULT_NAME_PATTERN).expect("Valid regex pattern"));

const STRING_ARRAY_NAME_DETAILS: &str = "String/Array Names: \nMust only contain alphanumeric characters, hyphens (-), underscores (_), and dots (.)\nMust begin with a letter or an underscore (_)";

const OBJECT_NAME_DETAILS: &str = "Object Names: \nMust only contain alphanumeric characters, hyphens (-), underscores (_) \nMust begin with a letter or an underscore (_)";

/// Go-style rendering of a string list: `[a b c]`
fn bracketed(items: &[&str]) -> String {
    format!("[{}]", items.join(" "))
}

/// Run every parameter declaration check
pub fn validate_param_declarations(params: &[ParamSpec], flags: &FeatureFlags) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.also(validate_no_duplicate_names(params));
    errors.also(validate_param_names(params));
    errors.also(validate_param_types(params));
    errors.also(validate_param_enums(params, flags));
    errors
}

pub fn validate_no_duplicate_names(params: &[ParamSpec]) -> FieldErrors {
    let mut seen = HashSet::new();
    params
        .iter()
        .filter(|param| !seen.insert(param.name.as_str()))
        .map(|param| {
            FieldError::new(
                ErrorKind::Duplicate,
                "parameter appears more than once",
                FieldPath::field("params").at_key(param.name.as_str()),
            )
        })
        .collect()
}

/// Name format checks. String and array names may contain dots; object
/// names and object keys may not.
pub fn validate_param_names(params: &[ParamSpec]) -> FieldErrors {
    let mut errors = FieldErrors::new();
    let mut invalid_names: BTreeSet<&str> = BTreeSet::new();
    let mut invalid_objects: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for param in params {
        if param.effective_type() != ParamType::Object {
            if !STRING_ARRAY_NAME_REGEX.is_match(&param.name) {
                invalid_names.insert(&param.name);
            }
            continue;
        }

        if !OBJECT_NAME_REGEX.is_match(&param.name) {
            invalid_objects.entry(&param.name).or_default();
        }
        for key in param.properties.iter().flat_map(|p| p.keys()) {
            if !OBJECT_NAME_REGEX.is_match(key) {
                invalid_objects.entry(&param.name).or_default().push(key);
            }
        }
    }

    if !invalid_names.is_empty() {
        let names: Vec<&str> = invalid_names.into_iter().collect();
        errors.push(
            FieldError::new(
                ErrorKind::NamingFormat,
                format!(
                    "The format of following array and string variable names is invalid: {}",
                    bracketed(&names)
                ),
                FieldPath::field("params"),
            )
            .with_details(STRING_ARRAY_NAME_DETAILS),
        );
    }

    if !invalid_objects.is_empty() {
        let rendered: Vec<String> = invalid_objects
            .iter()
            .map(|(name, keys)| format!("{}:{}", name, bracketed(keys)))
            .collect();
        errors.push(
            FieldError::new(
                ErrorKind::NamingFormat,
                format!(
                    "Object param name and key name format is invalid: map[{}]",
                    rendered.join(" ")
                ),
                FieldPath::field("params"),
            )
            .with_details(OBJECT_NAME_DETAILS),
        );
    }

    errors
}

/// Declared types must be known, agree with the default's shape, and
/// object properties must be strings
pub fn validate_param_types(params: &[ParamSpec]) -> FieldErrors {
    let mut errors = FieldErrors::new();

    for param in params {
        let base = FieldPath::field("params").at_field(param.name.as_str());

        let Some(declared) = &param.param_type else {
            continue;
        };
        if !declared.is_known() {
            errors.push(FieldError::invalid_value(declared, base.at_field("type")));
            continue;
        }

        if let Some(default) = &param.default {
            let default_type = default.param_type();
            if &default_type != declared {
                errors.push(
                    FieldError::new(
                        ErrorKind::DefaultTypeMismatch,
                        format!(
                            "{:?} type does not match default value's type: {:?}",
                            declared.as_str(),
                            default_type.as_str()
                        ),
                        base.at_field("type"),
                    )
                    .with_path(base.at_field("default").at_field("type")),
                );
            }
        }

        if *declared == ParamType::Object {
            let invalid_keys: Vec<&str> = param
                .properties
                .iter()
                .flatten()
                .filter(|(_, property)| {
                    property
                        .property_type
                        .as_ref()
                        .is_some_and(|t| *t != ParamType::String)
                })
                .map(|(key, _)| key.as_str())
                .collect();
            if !invalid_keys.is_empty() {
                errors.push(FieldError::new(
                    ErrorKind::InvalidValue,
                    format!(
                        "The value type specified for these keys {} is invalid",
                        bracketed(&invalid_keys)
                    ),
                    base.at_field("properties"),
                ));
            }
        }
    }

    errors
}

/// Enum legality. With the enum flag off, any enum is a single flag error
/// per parameter and the remaining enum checks are skipped for it.
pub fn validate_param_enums(params: &[ParamSpec], flags: &FeatureFlags) -> FieldErrors {
    let mut errors = FieldErrors::new();

    for param in params.iter().filter(|p| !p.enum_values.is_empty()) {
        let path = FieldPath::field("params").at_key(param.name.as_str());
        let enum_error = |message: String| FieldError::new(ErrorKind::Enum, message, path.clone());

        if !flags.enable_param_enum {
            errors.push(enum_error(format!(
                "feature flag `{}` should be set to true to use Enum",
                ENABLE_PARAM_ENUM_KEY
            )));
            continue;
        }

        if param.effective_type() != ParamType::String {
            errors.push(enum_error(
                "enum can only be set with string type param".to_string(),
            ));
        }

        if param.enum_values.iter().any(String::is_empty) {
            errors.push(enum_error(
                "empty string is not allowed in param enum".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for value in &param.enum_values {
            if !seen.insert(value.as_str()) {
                errors.push(enum_error(format!(
                    "parameter enum value {} appears more than once",
                    value
                )));
            }
        }

        if let Some(ParamValue::String(default)) = &param.default {
            if !default.is_empty() && !param.enum_values.contains(default) {
                errors.push(enum_error(format!(
                    "param default value {} not in the enum list",
                    default
                )));
            }
        }
    }

    errors
}

/// Object parameters need a property map for key references to resolve
pub fn validate_object_params_have_properties(params: &[ParamSpec]) -> FieldErrors {
    params
        .iter()
        .filter(|p| p.effective_type() == ParamType::Object && p.properties.is_none())
        .map(|p| FieldError::missing_field(format!("{}.properties", p.name)))
        .collect()
}

/// Check one result declaration; paths are relative to the result
pub fn validate_result(result: &ResultSpec) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if !RESULT_NAME_REGEX.is_match(&result.name) {
        errors.push(
            FieldError::new(
                ErrorKind::NamingFormat,
                format!("invalid key name {:?}", result.name),
                FieldPath::field("name"),
            )
            .with_details(format!(
                "Name must consist of alphanumeric characters, '-', '_', and must start and end with an alphanumeric character (e.g. 'MyName',  or 'my-name',  or 'my_name', regex used for validation is '{}')",
                RESULT_NAME_PATTERN
            )),
        );
    }

    match &result.result_type {
        Some(ParamType::Unknown(other)) => errors.push(
            FieldError::invalid_value(other, FieldPath::field("type"))
                .with_details("type must be string"),
        ),
        Some(ParamType::Object) if result.properties.is_none() => {
            errors.push(FieldError::missing_field("properties"))
        }
        _ => {}
    }

    errors
}

/// Check a list of result declarations, attributing errors to `results[i]`
pub fn validate_results(results: &[ResultSpec]) -> FieldErrors {
    let mut errors = FieldErrors::new();
    for (i, result) in results.iter().enumerate() {
        errors.also(validate_result(result).via_field_index("results", i));
    }
    errors
}

/// Workspace names must be unique, and so must their mount paths, both
/// among themselves and against every volume mount of the steps and the
/// step template. Paths are compared after cleaning.
pub fn validate_workspaces(
    workspaces: &[WorkspaceDeclaration],
    steps: &[Step],
    step_template: Option<&StepTemplate>,
    paths: &PlatformPaths,
) -> FieldErrors {
    let mut errors = FieldErrors::new();

    let mut mount_paths: HashSet<String> = steps
        .iter()
        .flat_map(|step| step.volume_mounts.iter())
        .chain(step_template.into_iter().flat_map(|t| t.volume_mounts.iter()))
        .map(|mount| clean_path(&mount.mount_path))
        .collect();
    let mut names = HashSet::new();

    for (i, workspace) in workspaces.iter().enumerate() {
        let base = FieldPath::field("workspaces").at_index(i);

        if !names.insert(workspace.name.as_str()) {
            errors.push(FieldError::new(
                ErrorKind::Duplicate,
                format!("workspace name {:?} must be unique", workspace.name),
                base.at_field("name"),
            ));
        }

        let mount_path = clean_path(&workspace.resolved_mount_path(paths));
        if mount_paths.contains(&mount_path) {
            errors.push(FieldError::new(
                ErrorKind::Duplicate,
                format!("workspace mount path {:?} must be unique", mount_path),
                base.at_field("mountpath"),
            ));
        }
        mount_paths.insert(mount_path);
    }

    errors
}

pub fn validate_volumes(volumes: &[Volume]) -> FieldErrors {
    let mut seen = HashSet::new();
    volumes
        .iter()
        .enumerate()
        .filter(|(_, volume)| !seen.insert(volume.name.as_str()))
        .map(|(i, volume)| {
            FieldError::new(
                ErrorKind::Duplicate,
                format!("multiple volumes with same name {:?}", volume.name),
                FieldPath::field("volumes").at_index(i).at_field("name"),
            )
        })
        .collect()
}

/// Error for a construct that needs at least the `required` API tier, or
/// `None` when the current tier allows it
pub fn require_api_fields(
    what: &str,
    required: ApiFields,
    flags: &FeatureFlags,
    path: FieldPath,
) -> Option<FieldError> {
    if flags.enable_api_fields.permits(required) {
        return None;
    }
    let allowed = match required {
        ApiFields::Alpha => "\"alpha\"".to_string(),
        ApiFields::Beta => "\"alpha\" or \"beta\"".to_string(),
        ApiFields::Stable => "\"alpha\", \"beta\" or \"stable\"".to_string(),
    };
    Some(FieldError::new(
        ErrorKind::FeatureGate,
        format!(
            "{} requires {:?} feature gate to be {} but it is {:?}",
            what,
            ENABLE_API_FIELDS_KEY,
            allowed,
            flags.enable_api_fields.as_str()
        ),
        path,
    ))
}

#[cfg(test)]
#[path = "declarations_tests.rs"]
mod declarations_tests;
