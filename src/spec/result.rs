use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::param::{ParamType, PropertySpec};

/// A declared result, emitted either by the task or by a single step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSpec {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub result_type: Option<ParamType>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, PropertySpec>>,
}

/// A result written by the task as a whole
pub type TaskResult = ResultSpec;

/// A result written by one step, visible only to that step
pub type StepResult = ResultSpec;

impl ResultSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, result_type: impl Into<ParamType>) -> Self {
        self.result_type = Some(result_type.into());
        self
    }

    pub fn with_properties<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.properties = Some(
            keys.into_iter()
                .map(|k| (k.into(), PropertySpec::string()))
                .collect(),
        );
        self
    }

    /// Results without a declared type are strings
    pub fn effective_type(&self) -> ParamType {
        self.result_type.clone().unwrap_or(ParamType::String)
    }

    pub fn set_defaults(&mut self) {
        if self.result_type.is_none() {
            self.result_type = Some(ParamType::String);
        }
    }
}
