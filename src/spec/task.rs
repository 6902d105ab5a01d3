use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::container::{Sidecar, Step, StepTemplate, Volume};
use super::param::{ParamSpec, ParamType};
use super::result::TaskResult;
use super::workspace::WorkspaceDeclaration;
use crate::vars::{self, ArrayIndex, Namespace, Walk};

/// The templated body of a task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ParamSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_template: Option<StepTemplate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sidecars: Vec<Sidecar>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workspaces: Vec<WorkspaceDeclaration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<TaskResult>,
}

impl TaskSpec {
    /// Fill in implied types: parameter types from their defaults or
    /// properties, string for untyped results, and property maps for
    /// object parameters
    pub fn set_defaults(&mut self) {
        for param in &mut self.params {
            param.set_defaults();
        }
        for result in &mut self.results {
            result.set_defaults();
        }
        for step in &mut self.steps {
            for result in &mut step.results {
                result.set_defaults();
            }
        }
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Every literal-index reference to an array parameter, such as
    /// `$(params.images[1])`, exactly as written in the steps, step
    /// template, sidecars, volumes and workspaces
    pub fn indexing_references_to_array_params(&self) -> BTreeSet<String> {
        let declared: BTreeSet<&str> = self.params.iter().map(|p| p.name.as_str()).collect();
        let array_params: BTreeSet<&str> = self
            .params
            .iter()
            .filter(|p| p.effective_type() == ParamType::Array)
            .map(|p| p.name.as_str())
            .collect();

        let mut roots: Vec<&dyn Walk> = Vec::new();
        roots.extend(self.steps.iter().map(|s| s as &dyn Walk));
        roots.extend(self.step_template.iter().map(|t| t as &dyn Walk));
        roots.extend(self.sidecars.iter().map(|s| s as &dyn Walk));
        roots.extend(self.volumes.iter().map(|v| v as &dyn Walk));
        roots.extend(self.workspaces.iter().map(|w| w as &dyn Walk));

        let mut found = BTreeSet::new();
        for leaf in roots.into_iter().flat_map(vars::leaves) {
            for reference in vars::scan(leaf.value) {
                if reference.namespace != Namespace::Params
                    || !matches!(reference.index, Some(ArrayIndex::Literal(_)))
                {
                    continue;
                }
                let Some((name, rest)) = reference.split_param_name(|n| declared.contains(n)) else {
                    continue;
                };
                if rest.is_empty() && array_params.contains(name.as_str()) {
                    found.insert(reference.text.to_string());
                }
            }
        }
        found
    }
}
