//! Whole-document validation for tasks and step actions

use std::collections::HashSet;
use tracing::debug;

use super::declarations::{
    require_api_fields, validate_no_duplicate_names, validate_object_params_have_properties,
    validate_param_declarations, validate_param_enums, validate_param_names, validate_result,
    validate_results, validate_volumes, validate_workspaces,
};
use super::field_error::{ErrorKind, FieldError, FieldErrors, FieldPath};
use crate::config::{ApiFields, FeatureFlags, PlatformPaths, ENABLE_CEL_IN_WHEN_KEY};
use crate::spec::{ParamSpec, Step, StepAction, StepActionSpec, Task, TaskSpec, WorkspaceUsage};
use crate::vars::{check_usage, check_usage_indexed, contains_reference, Declarations, Namespace};

const ON_ERROR_VALUES: &[&str] = &["continue", "stopAndFail"];

impl TaskSpec {
    /// Validate a defaulted task spec, collecting every problem.
    ///
    /// Call [`TaskSpec::set_defaults`] first; [`TaskSpec::validated`] does both.
    pub fn validate(&self, flags: &FeatureFlags) -> Result<(), FieldErrors> {
        self.validate_with_paths(flags, &PlatformPaths::default())
    }

    pub fn validate_with_paths(
        &self,
        flags: &FeatureFlags,
        paths: &PlatformPaths,
    ) -> Result<(), FieldErrors> {
        debug!(
            steps = self.steps.len(),
            params = self.params.len(),
            api_fields = %flags.enable_api_fields,
            "Validating task spec"
        );
        let mut errors = FieldErrors::new();

        errors.also(validate_workspaces(
            &self.workspaces,
            &self.steps,
            self.step_template.as_ref(),
            paths,
        ));
        errors.also(validate_volumes(&self.volumes));
        errors.also(validate_steps(&self.steps, flags));
        errors.also(validate_workspace_usages(self, flags));
        errors.also(validate_param_declarations(&self.params, flags));
        errors.also(validate_results(&self.results));
        errors.also(validate_variable_usage(self));

        if !errors.is_empty() {
            debug!("Task spec rejected with {} error(s)", errors.len());
        }
        errors.into_result()
    }

    /// Apply defaults to a copy and validate it
    pub fn validated(mut self, flags: &FeatureFlags) -> Result<TaskSpec, FieldErrors> {
        self.set_defaults();
        self.validate(flags)?;
        Ok(self)
    }
}

impl Task {
    /// Validate the document; paths are reported under `spec`
    pub fn validate(&self, flags: &FeatureFlags) -> Result<(), FieldErrors> {
        self.spec.validate(flags).map_err(|e| e.via_field("spec"))
    }
}

impl StepActionSpec {
    pub fn validate(&self, flags: &FeatureFlags) -> Result<(), FieldErrors> {
        debug!(params = self.params.len(), "Validating step action spec");
        let mut errors = FieldErrors::new();

        if self.image.is_empty() {
            errors.push(FieldError::missing_field("image"));
        }
        errors.also(validate_param_declarations(&self.params, flags));
        errors.also(validate_results(&self.results));

        // workspaces and task results come from the task that uses the action
        let declarations = Declarations::new(&self.params)
            .with_step_results(&self.results)
            .only(&[
                Namespace::Params,
                Namespace::StepResults,
                Namespace::ContextTask,
                Namespace::ContextTaskRun,
                Namespace::Context,
                Namespace::Credentials,
            ]);
        errors.also(check_usage(self, FieldPath::root(), &declarations));

        errors.into_result()
    }
}

impl StepAction {
    pub fn validate(&self, flags: &FeatureFlags) -> Result<(), FieldErrors> {
        self.spec.validate(flags).map_err(|e| e.via_field("spec"))
    }
}

/// Check that steps only reference declared parameters with the right types.
///
/// Only the `params` namespace is examined. Object parameters must carry a
/// property map.
pub fn validate_usage_of_declared_parameters(
    steps: &[Step],
    params: &[ParamSpec],
) -> Result<(), FieldErrors> {
    let mut errors = param_usage(steps, params);
    errors.also(validate_object_params_have_properties(params));
    errors.into_result()
}

/// Parameter name, uniqueness and enum checks plus parameter usage in steps
pub fn validate_parameter_variables(
    steps: &[Step],
    params: &[ParamSpec],
    flags: &FeatureFlags,
) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    errors.also(validate_no_duplicate_names(params));
    errors.also(validate_param_names(params));
    errors.also(validate_param_enums(params, flags));
    errors.also(param_usage(steps, params));
    errors.into_result()
}

fn param_usage(steps: &[Step], params: &[ParamSpec]) -> FieldErrors {
    let declarations = Declarations::new(params).only(&[Namespace::Params]);
    check_usage_indexed(steps, "steps", &declarations)
}

fn validate_steps(steps: &[Step], flags: &FeatureFlags) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if steps.is_empty() {
        errors.push(FieldError::missing_field("steps"));
        return errors;
    }

    let mut names = HashSet::new();
    for (i, step) in steps.iter().enumerate() {
        let base = FieldPath::field("steps").at_index(i);

        if !step.name.is_empty() && !names.insert(step.name.as_str()) {
            errors.push(FieldError::multiple_one_of(base.at_field("name")));
        }

        if !step.on_error.is_empty()
            && !ON_ERROR_VALUES.contains(&step.on_error.as_str())
            && !contains_reference(&step.on_error)
        {
            errors.push(
                FieldError::invalid_value(&step.on_error, base.at_field("onError")).with_details(
                    "Task step onError must be either \"continue\" or \"stopAndFail\"",
                ),
            );
        }

        if step.step_ref.is_some() {
            errors.also(validate_step_ref(step, &base));
        }

        for (j, result) in step.results.iter().enumerate() {
            errors.also(
                validate_result(result)
                    .via_field_index("results", j)
                    .via_field_index("steps", i),
            );
        }

        for (j, when) in step.when.iter().enumerate() {
            if !when.cel.is_empty() && !flags.enable_cel_in_when_expression {
                errors.push(FieldError::new(
                    ErrorKind::FeatureGate,
                    format!(
                        "feature flag {} should be set to true to use CEL: {} in WhenExpression",
                        ENABLE_CEL_IN_WHEN_KEY, when.cel
                    ),
                    base.at_field("when").at_index(j),
                ));
            }
        }
    }
    errors
}

/// A step that references a step action takes its container fields from it
fn validate_step_ref(step: &Step, base: &FieldPath) -> FieldErrors {
    let conflicting = [
        ("image", !step.image.is_empty()),
        ("command", !step.command.is_empty()),
        ("args", !step.args.is_empty()),
        ("script", !step.script.is_empty()),
        ("env", !step.env.is_empty()),
        ("volumeMounts", !step.volume_mounts.is_empty()),
    ];
    conflicting
        .into_iter()
        .filter(|(_, set)| *set)
        .map(|(field, _)| {
            FieldError::new(
                ErrorKind::InvalidValue,
                format!("{} cannot be used with Ref", field),
                base.at_field(field),
            )
        })
        .collect()
}

/// Step and sidecar workspace usages must name a declared workspace and
/// need the beta API tier
fn validate_workspace_usages(spec: &TaskSpec, flags: &FeatureFlags) -> FieldErrors {
    let declared: HashSet<&str> = spec.workspaces.iter().map(|w| w.name.as_str()).collect();
    let mut errors = FieldErrors::new();

    let mut check = |kind: &str, what: &str, index: usize, usages: &[WorkspaceUsage]| {
        if usages.is_empty() {
            return;
        }
        let base = FieldPath::field(kind).at_index(index).at_field("workspaces");
        if let Some(error) = require_api_fields(what, ApiFields::Beta, flags, base.clone()) {
            errors.push(error);
        }
        for (j, usage) in usages.iter().enumerate() {
            if !declared.contains(usage.name.as_str()) {
                errors.push(FieldError::new(
                    ErrorKind::Existence,
                    format!("undefined workspace {:?}", usage.name),
                    base.at_index(j).at_field("name"),
                ));
            }
        }
    };

    for (i, step) in spec.steps.iter().enumerate() {
        check("steps", "step workspaces", i, &step.workspaces);
    }
    for (i, sidecar) in spec.sidecars.iter().enumerate() {
        check("sidecars", "sidecar workspaces", i, &sidecar.workspaces);
    }
    errors
}

/// Every reference in the spec, each part checked against the
/// declarations visible to it. Step results are only visible inside the
/// step that declares them.
fn validate_variable_usage(spec: &TaskSpec) -> FieldErrors {
    let task_scope = Declarations::new(&spec.params)
        .with_results(&spec.results)
        .with_workspaces(&spec.workspaces);
    let mut errors = FieldErrors::new();

    for (i, step) in spec.steps.iter().enumerate() {
        let step_scope = task_scope.clone().with_step_results(&step.results);
        errors.also(check_usage(
            step,
            FieldPath::field("steps").at_index(i),
            &step_scope,
        ));
    }
    if let Some(template) = &spec.step_template {
        errors.also(check_usage(
            template,
            FieldPath::field("stepTemplate"),
            &task_scope,
        ));
    }
    errors.also(check_usage_indexed(&spec.sidecars, "sidecars", &task_scope));
    errors.also(check_usage_indexed(&spec.volumes, "volumes", &task_scope));
    errors.also(check_usage_indexed(&spec.workspaces, "workspaces", &task_scope));
    for param in &spec.params {
        errors.also(check_usage(
            param,
            FieldPath::field("params").at_key(param.name.as_str()),
            &task_scope,
        ));
    }
    errors.also(check_usage_indexed(&spec.results, "results", &task_scope));
    errors
}
