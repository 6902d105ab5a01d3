//! Static typing of references against a set of declarations

use std::collections::{HashMap, HashSet};

use super::reference::{ArrayIndex, Namespace, VariableReference};
use crate::spec::{ParamSpec, ParamType, ParamValue, ResultSpec, WorkspaceDeclaration};

/// Context keys available under `context.task`
pub const CONTEXT_TASK_KEYS: &[&str] = &["name", "retry-count"];
/// Context keys available under `context.taskRun`
pub const CONTEXT_TASK_RUN_KEYS: &[&str] = &["name", "uid", "namespace"];
/// Attributes available under `workspaces.<name>`
pub const WORKSPACE_ATTRIBUTES: &[&str] = &["path", "bound", "claim", "volume"];

/// What a reference evaluates to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedType {
    /// A single string; usable anywhere
    String,
    /// A whole array; only as the entire element of a list field
    Array,
    /// A whole object; never usable without a key
    Object,
}

/// Why a reference does not resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unresolved {
    /// Names something that is not declared
    NotDeclared,
    /// Indexing or key access that the target's type does not support
    TypeInvalid,
    /// A literal index past the end of the parameter's array default
    IndexOutOfRange { index: usize, len: usize },
}

/// The declarations a group of fields may refer to
#[derive(Debug, Clone, Default)]
pub struct Declarations<'a> {
    params: HashMap<&'a str, &'a ParamSpec>,
    results: HashSet<&'a str>,
    step_results: HashSet<&'a str>,
    workspaces: HashSet<&'a str>,
    checked: Option<Vec<Namespace>>,
}

impl<'a> Declarations<'a> {
    pub fn new(params: &'a [ParamSpec]) -> Self {
        let mut by_name = HashMap::with_capacity(params.len());
        for param in params {
            by_name.entry(param.name.as_str()).or_insert(param);
        }
        Self {
            params: by_name,
            ..Default::default()
        }
    }

    pub fn with_results(mut self, results: &'a [ResultSpec]) -> Self {
        self.results = results.iter().map(|r| r.name.as_str()).collect();
        self
    }

    pub fn with_step_results(mut self, results: &'a [ResultSpec]) -> Self {
        self.step_results = results.iter().map(|r| r.name.as_str()).collect();
        self
    }

    pub fn with_workspaces(mut self, workspaces: &'a [WorkspaceDeclaration]) -> Self {
        self.workspaces = workspaces.iter().map(|w| w.name.as_str()).collect();
        self
    }

    /// Only check references in these namespaces; others are accepted
    /// unexamined
    pub fn only(mut self, namespaces: &[Namespace]) -> Self {
        self.checked = Some(namespaces.to_vec());
        self
    }

    /// Whether references in `namespace` are checked at all
    pub fn checks(&self, namespace: Namespace) -> bool {
        self.checked
            .as_ref()
            .map_or(true, |namespaces| namespaces.contains(&namespace))
    }

    pub fn param(&self, name: &str) -> Option<&'a ParamSpec> {
        self.params.get(name).copied()
    }

    pub fn resolve(&self, reference: &VariableReference<'_>) -> Result<ResolvedType, Unresolved> {
        match reference.namespace {
            Namespace::Params => self.resolve_param(reference),
            Namespace::Results => resolve_path(&self.results, reference),
            Namespace::StepResults => resolve_path(&self.step_results, reference),
            Namespace::ContextTask => resolve_fixed(CONTEXT_TASK_KEYS, reference),
            Namespace::ContextTaskRun => resolve_fixed(CONTEXT_TASK_RUN_KEYS, reference),
            Namespace::Context => Err(Unresolved::NotDeclared),
            Namespace::Credentials => resolve_fixed(&["path"], reference),
            Namespace::Workspaces => match (reference.path.as_slice(), reference.index) {
                ([name, attribute], None)
                    if self.workspaces.contains(name.as_str())
                        && WORKSPACE_ATTRIBUTES.contains(&attribute.as_str()) =>
                {
                    Ok(ResolvedType::String)
                }
                _ => Err(Unresolved::NotDeclared),
            },
        }
    }

    fn resolve_param(&self, reference: &VariableReference<'_>) -> Result<ResolvedType, Unresolved> {
        let (name, rest) = reference
            .split_param_name(|name| self.params.contains_key(name))
            .ok_or(Unresolved::NotDeclared)?;
        let spec = self.params[name.as_str()];
        let param_type = spec.effective_type();

        match (rest, reference.index) {
            ([], None) => Ok(match param_type {
                ParamType::Array => ResolvedType::Array,
                ParamType::Object => ResolvedType::Object,
                // unknown types are reported by the declaration checks
                ParamType::String | ParamType::Unknown(_) => ResolvedType::String,
            }),
            ([], Some(ArrayIndex::Star)) => match param_type {
                ParamType::Array => Ok(ResolvedType::Array),
                ParamType::Object => Ok(ResolvedType::Object),
                _ => Err(Unresolved::TypeInvalid),
            },
            ([], Some(ArrayIndex::Literal(index))) => match param_type {
                ParamType::Array => match &spec.default {
                    Some(ParamValue::Array(values)) if index >= values.len() => {
                        Err(Unresolved::IndexOutOfRange {
                            index,
                            len: values.len(),
                        })
                    }
                    _ => Ok(ResolvedType::String),
                },
                _ => Err(Unresolved::TypeInvalid),
            },
            ([key], None) => match param_type {
                ParamType::Object if has_property(spec, key) => Ok(ResolvedType::String),
                ParamType::Object => Err(Unresolved::NotDeclared),
                _ => Err(Unresolved::TypeInvalid),
            },
            ([_], Some(_)) => Err(Unresolved::TypeInvalid),
            _ => Err(Unresolved::NotDeclared),
        }
    }
}

fn has_property(spec: &ParamSpec, key: &str) -> bool {
    spec.properties
        .as_ref()
        .is_some_and(|properties| properties.contains_key(key))
}

fn resolve_path(
    declared: &HashSet<&str>,
    reference: &VariableReference<'_>,
) -> Result<ResolvedType, Unresolved> {
    match reference.result_name() {
        Some(name) if declared.contains(name.as_str()) => Ok(ResolvedType::String),
        _ => Err(Unresolved::NotDeclared),
    }
}

fn resolve_fixed(
    keys: &[&str],
    reference: &VariableReference<'_>,
) -> Result<ResolvedType, Unresolved> {
    match (reference.path.as_slice(), reference.index) {
        ([key], None) if keys.contains(&key.as_str()) => Ok(ResolvedType::String),
        _ => Err(Unresolved::NotDeclared),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::scan;

    fn params() -> Vec<ParamSpec> {
        vec![
            ParamSpec::new("str").with_type("string"),
            ParamSpec::new("arr")
                .with_type("array")
                .with_default(ParamValue::array(["a", "b"])),
            ParamSpec::new("nodefault").with_type("array"),
            ParamSpec::new("obj").with_type("object").with_properties(["url"]),
            ParamSpec::new("dotted.name"),
        ]
    }

    fn resolve(decls: &Declarations<'_>, text: &str) -> Result<ResolvedType, Unresolved> {
        let refs = scan(text);
        assert_eq!(refs.len(), 1, "expected one reference in {text}");
        decls.resolve(&refs[0])
    }

    #[test]
    fn test_param_types() {
        let params = params();
        let decls = Declarations::new(&params);
        assert_eq!(resolve(&decls, "$(params.str)"), Ok(ResolvedType::String));
        assert_eq!(resolve(&decls, "$(params.arr)"), Ok(ResolvedType::Array));
        assert_eq!(resolve(&decls, "$(params.arr[*])"), Ok(ResolvedType::Array));
        assert_eq!(resolve(&decls, "$(params.arr[1])"), Ok(ResolvedType::String));
        assert_eq!(resolve(&decls, "$(params.obj)"), Ok(ResolvedType::Object));
        assert_eq!(resolve(&decls, "$(params.obj[*])"), Ok(ResolvedType::Object));
        assert_eq!(resolve(&decls, "$(params.obj.url)"), Ok(ResolvedType::String));
        assert_eq!(resolve(&decls, "$(params.dotted.name)"), Ok(ResolvedType::String));
        assert_eq!(resolve(&decls, r#"$(params["dotted.name"])"#), Ok(ResolvedType::String));
    }

    #[test]
    fn test_param_failures() {
        let params = params();
        let decls = Declarations::new(&params);
        assert_eq!(resolve(&decls, "$(params.missing)"), Err(Unresolved::NotDeclared));
        assert_eq!(resolve(&decls, "$(params.obj.nokey)"), Err(Unresolved::NotDeclared));
        assert_eq!(resolve(&decls, "$(params.str[*])"), Err(Unresolved::TypeInvalid));
        assert_eq!(resolve(&decls, "$(params.str[0])"), Err(Unresolved::TypeInvalid));
        assert_eq!(resolve(&decls, "$(params.str.key)"), Err(Unresolved::TypeInvalid));
        assert_eq!(
            resolve(&decls, "$(params.arr[2])"),
            Err(Unresolved::IndexOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(resolve(&decls, "$(params.nodefault[99])"), Ok(ResolvedType::String));
    }

    #[test]
    fn test_fixed_namespaces() {
        let decls = Declarations::default();
        assert_eq!(resolve(&decls, "$(context.task.name)"), Ok(ResolvedType::String));
        assert_eq!(resolve(&decls, "$(context.task.retry-count)"), Ok(ResolvedType::String));
        assert_eq!(resolve(&decls, "$(context.taskRun.namespace)"), Ok(ResolvedType::String));
        assert_eq!(resolve(&decls, "$(context.task.missing)"), Err(Unresolved::NotDeclared));
        assert_eq!(resolve(&decls, "$(context.pipeline.name)"), Err(Unresolved::NotDeclared));
        assert_eq!(resolve(&decls, "$(credentials.path)"), Ok(ResolvedType::String));
        assert_eq!(resolve(&decls, "$(credentials.other)"), Err(Unresolved::NotDeclared));
    }

    #[test]
    fn test_results_and_workspaces() {
        let results = vec![ResultSpec::new("digest")];
        let workspaces = vec![WorkspaceDeclaration::new("src")];
        let decls = Declarations::default()
            .with_results(&results)
            .with_step_results(&results)
            .with_workspaces(&workspaces);
        assert_eq!(resolve(&decls, "$(results.digest.path)"), Ok(ResolvedType::String));
        assert_eq!(resolve(&decls, "$(results.digest)"), Err(Unresolved::NotDeclared));
        assert_eq!(resolve(&decls, "$(step.results.digest.path)"), Ok(ResolvedType::String));
        assert_eq!(resolve(&decls, "$(workspaces.src.path)"), Ok(ResolvedType::String));
        assert_eq!(resolve(&decls, "$(workspaces.src.claim)"), Ok(ResolvedType::String));
        assert_eq!(resolve(&decls, "$(workspaces.src.size)"), Err(Unresolved::NotDeclared));
        assert_eq!(resolve(&decls, "$(workspaces.other.path)"), Err(Unresolved::NotDeclared));
    }

    #[test]
    fn test_dotted_result_names() {
        let results = vec![ResultSpec::new("my.result")];
        let decls = Declarations::default()
            .with_results(&results)
            .with_step_results(&results);
        assert_eq!(resolve(&decls, "$(results.my.result.path)"), Ok(ResolvedType::String));
        assert_eq!(resolve(&decls, "$(step.results.my.result.path)"), Ok(ResolvedType::String));
        assert_eq!(resolve(&decls, "$(results.my.path)"), Err(Unresolved::NotDeclared));
        assert_eq!(resolve(&decls, "$(results.path)"), Err(Unresolved::NotDeclared));
    }

    #[test]
    fn test_object_keys_come_from_properties_only() {
        let params = vec![ParamSpec::new("repo")
            .with_type("object")
            .with_properties(["url"])
            .with_default(ParamValue::object([("url", "u"), ("extra", "e")]))];
        let decls = Declarations::new(&params);
        assert_eq!(resolve(&decls, "$(params.repo.url)"), Ok(ResolvedType::String));
        assert_eq!(resolve(&decls, "$(params.repo.extra)"), Err(Unresolved::NotDeclared));
    }

    #[test]
    fn test_only_restricts_checked_namespaces() {
        let decls = Declarations::default().only(&[Namespace::Params]);
        assert!(decls.checks(Namespace::Params));
        assert!(!decls.checks(Namespace::Results));
        assert!(Declarations::default().checks(Namespace::Workspaces));
    }
}
