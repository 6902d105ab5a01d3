//! Values bound to references at run time
//!
//! [`Bindings`] is built once per run from the supplied parameter values
//! and the run context, after checking those values against the
//! declarations. Lookups never fail for a reference that passed
//! validation and whose bindings were accepted.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::config::PlatformPaths;
use crate::spec::{
    Param, ParamSpec, ParamType, ParamValue, ResultSpec, StepActionSpec, TaskSpec,
    WorkspaceDeclaration,
};
use crate::validation::{ErrorKind, FieldError, FieldErrors, FieldPath};
use crate::vars::{leaves, scan, ArrayIndex, Namespace, VariableReference, Walk};

/// A workspace the run actually provides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundWorkspace {
    /// Persistent volume claim backing the workspace, if any
    #[serde(default)]
    pub claim: String,
    /// Name of the volume the workspace is mounted from
    #[serde(default)]
    pub volume: String,
}

/// Facts about the run that references may read
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunContext {
    #[serde(default)]
    pub task_name: String,
    #[serde(default)]
    pub task_run_name: String,
    #[serde(default)]
    pub task_run_uid: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub workspaces: BTreeMap<String, BoundWorkspace>,
}

/// What `$(workspaces.<name>.<attribute>)` expands to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceBinding {
    pub path: String,
    pub bound: bool,
    pub claim: String,
    pub volume: String,
}

impl WorkspaceBinding {
    fn attribute(&self, attribute: &str) -> Option<Cow<'_, str>> {
        match attribute {
            "path" => Some(Cow::Borrowed(&self.path)),
            "bound" => Some(Cow::Borrowed(if self.bound { "true" } else { "false" })),
            "claim" => Some(Cow::Borrowed(&self.claim)),
            "volume" => Some(Cow::Borrowed(&self.volume)),
            _ => None,
        }
    }
}

/// A looked-up value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bound<'a> {
    String(Cow<'a, str>),
    Array(&'a [String]),
    /// A whole object; only its keys can be substituted
    Object,
}

/// Why a lookup produced nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Unbound,
    IndexOutOfRange { index: usize, len: usize },
}

/// Every value references may resolve to during one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    params: BTreeMap<String, ParamValue>,
    results: BTreeMap<String, String>,
    step_results: BTreeMap<String, String>,
    context: BTreeMap<String, String>,
    workspaces: BTreeMap<String, WorkspaceBinding>,
    credentials_path: String,
    paths: PlatformPaths,
}

impl Bindings {
    pub fn new(paths: PlatformPaths) -> Self {
        Self {
            credentials_path: paths.credentials_path.clone(),
            paths,
            ..Default::default()
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_result(mut self, name: &str) -> Self {
        let path = self.paths.result_path(name);
        self.results.insert(name.to_string(), path);
        self
    }

    /// Bind a context value by its dotted key, e.g. `task.name`
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_workspace(mut self, name: impl Into<String>, binding: WorkspaceBinding) -> Self {
        self.workspaces.insert(name.into(), binding);
        self
    }

    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    /// Bind a task's declarations to the supplied values.
    ///
    /// Fails with every problem found: parameters with neither a value nor
    /// a default, values whose shape disagrees with the declared type,
    /// object values missing declared keys, and literal indexes past the
    /// end of the bound arrays.
    pub fn for_task(
        spec: &TaskSpec,
        provided: &[Param],
        run: &RunContext,
        paths: &PlatformPaths,
    ) -> Result<Self, FieldErrors> {
        debug!(
            task = %run.task_name,
            provided = provided.len(),
            "Binding task run values"
        );
        let mut errors = FieldErrors::new();
        let mut bindings = Self::new(paths.clone());

        bindings.params = bind_params(&spec.params, provided, &mut errors);
        for result in &spec.results {
            bindings = bindings.with_result(&result.name);
        }
        bindings.bind_context(run);
        bindings.bind_workspaces(&spec.workspaces, run);

        errors.also(bindings.check_indexes(spec));
        errors.into_result()?;
        Ok(bindings)
    }

    /// Bind a step action's declarations for the step `step_name`
    pub fn for_step_action(
        spec: &StepActionSpec,
        step_name: &str,
        provided: &[Param],
        run: &RunContext,
        paths: &PlatformPaths,
    ) -> Result<Self, FieldErrors> {
        debug!(step = step_name, "Binding step action values");
        let mut errors = FieldErrors::new();
        let mut bindings = Self::new(paths.clone());

        bindings.params = bind_params(&spec.params, provided, &mut errors);
        bindings.bind_context(run);
        let bindings = bindings.for_step(step_name, &spec.results);

        errors.also(bindings.check_indexes(spec));
        errors.into_result()?;
        Ok(bindings)
    }

    /// A copy that also binds the results of one step
    pub fn for_step(&self, step_name: &str, results: &[ResultSpec]) -> Self {
        let mut scoped = self.clone();
        scoped.step_results = results
            .iter()
            .map(|r| (r.name.clone(), self.paths.step_result_path(step_name, &r.name)))
            .collect();
        scoped
    }

    fn bind_context(&mut self, run: &RunContext) {
        let entries = [
            ("task.name", run.task_name.clone()),
            ("task.retry-count", run.retry_count.to_string()),
            ("taskRun.name", run.task_run_name.clone()),
            ("taskRun.uid", run.task_run_uid.clone()),
            ("taskRun.namespace", run.namespace.clone()),
        ];
        for (key, value) in entries {
            self.context.insert(key.to_string(), value);
        }
    }

    fn bind_workspaces(&mut self, declared: &[WorkspaceDeclaration], run: &RunContext) {
        for workspace in declared {
            let bound = run.workspaces.get(&workspace.name);
            if bound.is_none() && !workspace.optional {
                warn!(workspace = %workspace.name, "Required workspace is not bound");
            }
            // an unbound optional workspace has no path
            let path = if bound.is_some() || !workspace.optional {
                workspace.resolved_mount_path(&self.paths)
            } else {
                String::new()
            };
            let binding = WorkspaceBinding {
                path,
                bound: bound.is_some(),
                claim: bound.map(|b| b.claim.clone()).unwrap_or_default(),
                volume: bound.map(|b| b.volume.clone()).unwrap_or_default(),
            };
            self.workspaces.insert(workspace.name.clone(), binding);
        }
    }

    /// Literal indexes must fall inside the arrays actually bound
    fn check_indexes(&self, root: &dyn Walk) -> FieldErrors {
        let mut errors = FieldErrors::new();
        for leaf in leaves(root) {
            for reference in scan(leaf.value) {
                let Some(ArrayIndex::Literal(_)) = reference.index else {
                    continue;
                };
                if let Err(Missing::IndexOutOfRange { index, len }) = self.lookup(&reference) {
                    errors.push(
                        FieldError::non_existent(leaf.value, leaf.path.clone()).with_details(
                            format!(
                                "index {} is out of range for {} with {} value(s)",
                                index, reference.text, len
                            ),
                        ),
                    );
                }
            }
        }
        errors
    }

    /// The value `reference` stands for
    pub fn lookup(&self, reference: &VariableReference<'_>) -> Result<Bound<'_>, Missing> {
        let path = reference.path.as_slice();
        match reference.namespace {
            Namespace::Params => self.lookup_param(reference),
            Namespace::Results => lookup_path(&self.results, reference),
            Namespace::StepResults => lookup_path(&self.step_results, reference),
            Namespace::ContextTask => self.lookup_context("task", reference),
            Namespace::ContextTaskRun => self.lookup_context("taskRun", reference),
            Namespace::Context => Err(Missing::Unbound),
            Namespace::Credentials => match (path, reference.index) {
                ([attribute], None) if attribute == "path" => {
                    Ok(Bound::String(Cow::Borrowed(&self.credentials_path)))
                }
                _ => Err(Missing::Unbound),
            },
            Namespace::Workspaces => match (path, reference.index) {
                ([name, attribute], None) => self
                    .workspaces
                    .get(name)
                    .and_then(|w| w.attribute(attribute))
                    .map(Bound::String)
                    .ok_or(Missing::Unbound),
                _ => Err(Missing::Unbound),
            },
        }
    }

    fn lookup_param(&self, reference: &VariableReference<'_>) -> Result<Bound<'_>, Missing> {
        let (name, rest) = reference
            .split_param_name(|name| self.params.contains_key(name))
            .ok_or(Missing::Unbound)?;
        let value = self.params.get(&name).ok_or(Missing::Unbound)?;

        match (rest, reference.index, value) {
            ([], None, ParamValue::String(s)) => Ok(Bound::String(Cow::Borrowed(s))),
            ([], None | Some(ArrayIndex::Star), ParamValue::Array(items)) => Ok(Bound::Array(items)),
            ([], None | Some(ArrayIndex::Star), ParamValue::Object(_)) => Ok(Bound::Object),
            ([], Some(ArrayIndex::Literal(index)), ParamValue::Array(items)) => items
                .get(index)
                .map(|item| Bound::String(Cow::Borrowed(item)))
                .ok_or(Missing::IndexOutOfRange {
                    index,
                    len: items.len(),
                }),
            ([key], None, ParamValue::Object(map)) => map
                .get(key)
                .map(|v| Bound::String(Cow::Borrowed(v)))
                .ok_or(Missing::Unbound),
            _ => Err(Missing::Unbound),
        }
    }

    fn lookup_context(
        &self,
        scope: &str,
        reference: &VariableReference<'_>,
    ) -> Result<Bound<'_>, Missing> {
        match (reference.path.as_slice(), reference.index) {
            ([key], None) => self
                .context
                .get(&format!("{}.{}", scope, key))
                .map(|v| Bound::String(Cow::Borrowed(v)))
                .ok_or(Missing::Unbound),
            _ => Err(Missing::Unbound),
        }
    }
}

fn lookup_path<'a>(
    paths: &'a BTreeMap<String, String>,
    reference: &VariableReference<'_>,
) -> Result<Bound<'a>, Missing> {
    reference
        .result_name()
        .and_then(|name| paths.get(&name))
        .map(|p| Bound::String(Cow::Borrowed(p)))
        .ok_or(Missing::Unbound)
}

/// Resolve the value of every declared parameter: the provided value,
/// merged with an object default, or the default alone
fn bind_params(
    declared: &[ParamSpec],
    provided: &[Param],
    errors: &mut FieldErrors,
) -> BTreeMap<String, ParamValue> {
    let supplied: BTreeMap<&str, &ParamValue> =
        provided.iter().map(|p| (p.name.as_str(), &p.value)).collect();
    let declared_names: BTreeSet<&str> = declared.iter().map(|p| p.name.as_str()).collect();
    for extra in supplied.keys().filter(|name| !declared_names.contains(*name)) {
        debug!(param = %extra, "Ignoring value for undeclared parameter");
    }

    let mut bound = BTreeMap::new();
    for spec in declared {
        let path = FieldPath::field("params").at_key(spec.name.as_str());
        let expected = spec.effective_type();

        let value = match (supplied.get(spec.name.as_str()), &spec.default) {
            (Some(value), _) if expected.is_known() && value.param_type() != expected => {
                errors.push(FieldError::new(
                    ErrorKind::TypeMismatch,
                    format!(
                        "parameter {:?} is declared as {} but was given a value of type {}",
                        spec.name,
                        expected,
                        value.param_type()
                    ),
                    path,
                ));
                continue;
            }
            (Some(ParamValue::Object(given)), Some(ParamValue::Object(default))) => {
                let mut merged = default.clone();
                merged.extend(given.iter().map(|(k, v)| (k.clone(), v.clone())));
                ParamValue::Object(merged)
            }
            (Some(value), _) => (*value).clone(),
            (None, Some(default)) => default.clone(),
            (None, None) => {
                errors.push(FieldError::new(
                    ErrorKind::MissingField,
                    format!("missing value for parameter {:?}", spec.name),
                    path,
                ));
                continue;
            }
        };

        if let (ParamValue::Object(map), Some(properties)) = (&value, &spec.properties) {
            let missing: Vec<&str> = properties
                .keys()
                .filter(|key| !map.contains_key(*key))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                errors.push(FieldError::new(
                    ErrorKind::MissingField,
                    format!(
                        "missing keys for object parameter {:?}: [{}]",
                        spec.name,
                        missing.join(" ")
                    ),
                    path,
                ));
                continue;
            }
        }

        if expected == ParamType::Object && !matches!(value, ParamValue::Object(_)) {
            continue;
        }
        bound.insert(spec.name.clone(), value);
    }
    bound
}
