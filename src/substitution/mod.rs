//! Replacing references with their bound values
//!
//! Substitution runs on specs that already passed validation, with
//! [`Bindings`] that already passed their run-time checks. A reference that
//! still cannot be replaced is a defect and surfaces as
//! [`TaskVarsError::Invariant`], never as a field error.

pub mod bindings;

pub use bindings::{Bindings, Bound, BoundWorkspace, Missing, RunContext, WorkspaceBinding};

use tracing::{debug, trace};

use crate::error::{ErrorCode, Result, TaskVarsError};
use crate::spec::{StepActionSpec, TaskSpec};
use crate::validation::FieldPath;
use crate::vars::{rewrite, rewrite_at, scan, Namespace, Rewrite, VariableReference, Walk};

/// Namespaces a step action resolves itself; the rest belong to the task
/// that uses it and are left in place
const STEP_ACTION_NAMESPACES: &[Namespace] = &[
    Namespace::Params,
    Namespace::StepResults,
    Namespace::ContextTask,
    Namespace::ContextTaskRun,
    Namespace::Context,
    Namespace::Credentials,
];

/// Rewrites string leaves in place from a set of bindings
struct Substituter<'a> {
    bindings: &'a Bindings,
    namespaces: Option<&'a [Namespace]>,
    replaced: usize,
}

impl<'a> Substituter<'a> {
    fn new(bindings: &'a Bindings) -> Self {
        Self {
            bindings,
            namespaces: None,
            replaced: 0,
        }
    }

    fn only(mut self, namespaces: &'a [Namespace]) -> Self {
        self.namespaces = Some(namespaces);
        self
    }

    fn handles(&self, reference: &VariableReference<'_>) -> bool {
        self.namespaces
            .map_or(true, |namespaces| namespaces.contains(&reference.namespace))
    }

    /// The whole-array value of a leaf that is exactly one array reference
    fn expansion(&self, leaf: &str) -> Option<Vec<String>> {
        let references = scan(leaf);
        match references.as_slice() {
            [only] if only.is_whole(leaf) && self.handles(only) => {
                match self.bindings.lookup(only) {
                    Ok(Bound::Array(items)) => Some(items.to_vec()),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// `leaf` with every handled reference replaced by its string value.
    /// Replacement text is not scanned again.
    fn replace(&mut self, leaf: &str, path: &FieldPath) -> Result<Option<String>> {
        let references: Vec<_> = scan(leaf)
            .into_iter()
            .filter(|r| self.handles(r))
            .collect();
        if references.is_empty() {
            return Ok(None);
        }

        let mut out = String::with_capacity(leaf.len());
        let mut last = 0;
        for reference in &references {
            out.push_str(&leaf[last..reference.start]);
            match self.bindings.lookup(reference) {
                Ok(Bound::String(value)) => out.push_str(&value),
                Ok(Bound::Array(_)) => {
                    return Err(TaskVarsError::invariant(
                        ErrorCode::SUBSTITUTION_ARRAY_IN_SCALAR,
                        "array value cannot be expanded outside a list element of its own",
                        reference.text,
                        path,
                    ))
                }
                Ok(Bound::Object) => {
                    return Err(TaskVarsError::invariant(
                        ErrorCode::SUBSTITUTION_UNRESOLVED,
                        "object value can only be substituted by key",
                        reference.text,
                        path,
                    ))
                }
                Err(Missing::IndexOutOfRange { index, len }) => {
                    return Err(TaskVarsError::invariant(
                        ErrorCode::SUBSTITUTION_INDEX_OUT_OF_RANGE,
                        format!("index {} is out of range for {} value(s)", index, len),
                        reference.text,
                        path,
                    ))
                }
                Err(Missing::Unbound) => {
                    return Err(TaskVarsError::invariant(
                        ErrorCode::SUBSTITUTION_UNRESOLVED,
                        "no value is bound",
                        reference.text,
                        path,
                    ))
                }
            }
            trace!(reference = reference.text, %path, "Substituted reference");
            last = reference.end;
        }
        out.push_str(&leaf[last..]);
        self.replaced += references.len();
        Ok(Some(out))
    }
}

impl Rewrite for Substituter<'_> {
    type Error = TaskVarsError;

    fn scalar(&mut self, value: &mut String, path: &FieldPath) -> Result<()> {
        if let Some(replaced) = self.replace(value, path)? {
            *value = replaced;
        }
        Ok(())
    }

    fn list(&mut self, values: &mut Vec<String>, path: &FieldPath) -> Result<()> {
        let mut out = Vec::with_capacity(values.len());
        for (i, value) in values.iter().enumerate() {
            if let Some(items) = self.expansion(value) {
                trace!(%path, count = items.len(), "Expanded array reference");
                self.replaced += 1;
                out.extend(items);
                continue;
            }
            let replaced = self.replace(value, &path.at_index(i))?;
            out.push(replaced.unwrap_or_else(|| value.clone()));
        }
        *values = out;
        Ok(())
    }
}

/// A copy of `spec` with every reference replaced.
///
/// Each step sees its own step results; every other part sees the task
/// level bindings. Parameter declarations are left untouched.
pub fn substitute_task(spec: &TaskSpec, bindings: &Bindings) -> Result<TaskSpec> {
    debug!(steps = spec.steps.len(), "Substituting task spec");
    let mut out = spec.clone();
    let mut replaced = 0;

    for (i, step) in out.steps.iter_mut().enumerate() {
        let scoped = bindings.for_step(&step.name, &step.results);
        let mut substituter = Substituter::new(&scoped);
        rewrite_at(step, &FieldPath::field("steps").at_index(i), &mut substituter)?;
        replaced += substituter.replaced;
    }

    let mut substituter = Substituter::new(bindings);
    if let Some(template) = out.step_template.as_mut() {
        rewrite_at(template, &FieldPath::field("stepTemplate"), &mut substituter)?;
    }
    rewrite_items(&mut out.sidecars, "sidecars", &mut substituter)?;
    rewrite_items(&mut out.volumes, "volumes", &mut substituter)?;
    rewrite_items(&mut out.workspaces, "workspaces", &mut substituter)?;
    rewrite_items(&mut out.results, "results", &mut substituter)?;
    replaced += substituter.replaced;

    debug!(replaced, "Task spec substituted");
    Ok(out)
}

/// A copy of `spec` with its own references replaced; workspace and task
/// result references are left for the task that uses the action
pub fn substitute_step_action(spec: &StepActionSpec, bindings: &Bindings) -> Result<StepActionSpec> {
    let mut out = spec.clone();
    let params = std::mem::take(&mut out.params);

    let mut substituter = Substituter::new(bindings).only(STEP_ACTION_NAMESPACES);
    rewrite(&mut out, &mut substituter)?;
    out.params = params;

    debug!(replaced = substituter.replaced, "Step action substituted");
    Ok(out)
}

fn rewrite_items<T: Walk>(
    items: &mut [T],
    name: &str,
    substituter: &mut Substituter<'_>,
) -> Result<()> {
    for (i, item) in items.iter_mut().enumerate() {
        rewrite_at(item, &FieldPath::field(name).at_index(i), substituter)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlatformPaths;
    use crate::spec::{ParamSpec, ParamValue, ResultSpec, Step};
    use crate::vars::{contains_reference, leaves};
    use proptest::prelude::*;

    fn bindings() -> Bindings {
        Bindings::new(PlatformPaths::default())
            .with_param("flags", ParamValue::array(["-a", "-b"]))
            .with_param("name", "world")
            .with_param("repo", ParamValue::object([("url", "https://x")]))
            .with_context("task.name", "greet")
    }

    #[test]
    fn test_replaces_strings_in_place() {
        let spec = TaskSpec {
            steps: vec![Step::new("s", "img")
                .with_script("echo hello $(params.name) from $(context.task.name) $(date)")],
            ..Default::default()
        };
        let out = substitute_task(&spec, &bindings()).unwrap();
        assert_eq!(out.steps[0].script, "echo hello world from greet $(date)");
    }

    #[test]
    fn test_isolated_array_expands_into_siblings() {
        let spec = TaskSpec {
            steps: vec![Step::new("s", "img").with_args([
                "first",
                "$(params.flags)",
                "$(params.flags[*])",
                "$(params.flags[1])",
                "$(params.repo.url)",
            ])],
            ..Default::default()
        };
        let out = substitute_task(&spec, &bindings()).unwrap();
        assert_eq!(
            out.steps[0].args,
            vec!["first", "-a", "-b", "-a", "-b", "-b", "https://x"]
        );
    }

    #[test]
    fn test_array_in_scalar_is_an_invariant_violation() {
        let spec = TaskSpec {
            steps: vec![Step::new("s", "img").with_script("run $(params.flags)")],
            ..Default::default()
        };
        let error = substitute_task(&spec, &bindings()).unwrap_err();
        assert!(error.is_invariant());
        assert_eq!(error.code(), ErrorCode::SUBSTITUTION_ARRAY_IN_SCALAR);
        assert!(error.to_string().contains("steps[0].script"));
    }

    #[test]
    fn test_unbound_reference_is_an_invariant_violation() {
        let spec = TaskSpec {
            steps: vec![Step::new("s", "img").with_args(["$(params.missing)"])],
            ..Default::default()
        };
        let error = substitute_task(&spec, &bindings()).unwrap_err();
        assert_eq!(error.code(), ErrorCode::SUBSTITUTION_UNRESOLVED);
        assert!(error.to_string().contains("steps[0].args[0]"));
    }

    #[test]
    fn test_step_results_resolve_per_step() {
        let mut step = Step::new("build", "img").with_script("echo > $(step.results.out.path)");
        step.results.push(ResultSpec::new("out"));
        let spec = TaskSpec {
            steps: vec![step],
            ..Default::default()
        };
        let out = substitute_task(&spec, &bindings()).unwrap();
        assert_eq!(
            out.steps[0].script,
            "echo > /tekton/steps/step-build/results/out"
        );
    }

    #[test]
    fn test_dotted_result_names_resolve() {
        let mut step = Step::new("build", "img")
            .with_script("echo > $(results.my.result.path) $(step.results.my.out.path)");
        step.results.push(ResultSpec::new("my.out"));
        let spec = TaskSpec {
            results: vec![ResultSpec::new("my.result")],
            steps: vec![step],
            ..Default::default()
        };
        let bindings = bindings().with_result("my.result");
        let out = substitute_task(&spec, &bindings).unwrap();
        assert_eq!(
            out.steps[0].script,
            "echo > /tekton/results/my.result /tekton/steps/step-build/results/my.out"
        );
    }

    #[test]
    fn test_step_action_leaves_task_references() {
        let action = StepActionSpec {
            image: "alpine".to_string(),
            params: vec![ParamSpec::new("name").with_default(ParamValue::string("$(x)"))],
            args: vec![
                "$(params.name)".to_string(),
                "$(workspaces.src.path)".to_string(),
            ],
            ..Default::default()
        };
        let out = substitute_step_action(&action, &bindings()).unwrap();
        assert_eq!(out.args, vec!["world", "$(workspaces.src.path)"]);
        assert_eq!(out.params, action.params);
    }

    proptest! {
        #[test]
        fn prop_no_references_remain(
            words in prop::collection::vec("[a-z]{1,8}", 0..4),
            picks in prop::collection::vec(0usize..4, 1..6),
        ) {
            let references = [
                "$(params.name)",
                "$(params.flags[0])",
                "$(params.repo.url)",
                "$(context.task.name)",
            ];
            let script: Vec<String> = picks
                .iter()
                .enumerate()
                .map(|(i, pick)| {
                    let word = words.get(i).map(String::as_str).unwrap_or("");
                    format!("{}{}", word, references[*pick])
                })
                .collect();
            let spec = TaskSpec {
                steps: vec![Step::new("s", "img")
                    .with_script(script.join(" "))
                    .with_args(["$(params.flags)"])],
                ..Default::default()
            };

            let out = substitute_task(&spec, &bindings()).unwrap();
            for leaf in leaves(&out) {
                prop_assert!(!contains_reference(leaf.value), "left {:?}", leaf.value);
            }
        }
    }
}
