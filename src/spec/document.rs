//! Top-level resource documents as read from disk

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::Path;
use tracing::debug;

use super::step_action::StepActionSpec;
use super::task::TaskSpec;
use crate::error::{ErrorCode, Result, TaskVarsError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub spec: TaskSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepAction {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub spec: StepActionSpec,
}

/// A document of any supported kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Document {
    Task(Task),
    StepAction(StepAction),
}

impl Document {
    /// Parse a YAML (or JSON) document, dispatching on its `kind`
    pub fn from_yaml(content: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(content)?;
        let kind = value
            .get("kind")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match kind.as_str() {
            "Task" | "ClusterTask" => Ok(Document::Task(serde_yaml::from_value(value)?)),
            "StepAction" => Ok(Document::StepAction(serde_yaml::from_value(value)?)),
            "" => Err(TaskVarsError::load_with_code(
                ErrorCode::LOAD_UNKNOWN_KIND,
                "document has no kind",
                None,
            )),
            other => Err(TaskVarsError::load_with_code(
                ErrorCode::LOAD_UNKNOWN_KIND,
                format!("unsupported kind {:?} (expected Task or StepAction)", other),
                None,
            )),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TaskVarsError::load_with_code(
                ErrorCode::LOAD_IO_ERROR,
                format!("Cannot read {}", path.display()),
                Some(path.to_path_buf()),
            )
            .with_source(e)
        })?;
        let document = Self::from_yaml(&content).map_err(|e| match e {
            TaskVarsError::Load {
                code,
                message,
                source,
                ..
            } => TaskVarsError::Load {
                code,
                message: format!("{}: {}", path.display(), message),
                path: Some(path.to_path_buf()),
                source,
            },
            other => other,
        })?;
        debug!("Loaded {} from {}", document.kind(), path.display());
        Ok(document)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Document::Task(_) => "Task",
            Document::StepAction(_) => "StepAction",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Document::Task(task) => &task.metadata.name,
            Document::StepAction(action) => &action.metadata.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatches_on_kind() {
        let doc = Document::from_yaml(
            r#"
apiVersion: tekton.dev/v1
kind: Task
metadata:
  name: build
spec:
  steps:
    - name: compile
      image: golang
"#,
        )
        .unwrap();
        assert_eq!(doc.kind(), "Task");
        assert_eq!(doc.name(), "build");

        let doc = Document::from_yaml("kind: StepAction\nspec:\n  image: alpine\n").unwrap();
        let Document::StepAction(action) = doc else {
            panic!("expected a step action");
        };
        assert_eq!(action.spec.image, "alpine");
    }

    #[test]
    fn test_unknown_kind_is_load_error() {
        let err = Document::from_yaml("kind: Pipeline\n").unwrap_err();
        assert_eq!(err.code(), ErrorCode::LOAD_UNKNOWN_KIND);
        assert!(err.to_string().contains("Pipeline"));

        let err = Document::from_yaml("spec: {}\n").unwrap_err();
        assert_eq!(err.code(), ErrorCode::LOAD_UNKNOWN_KIND);
    }

    #[test]
    fn test_accepts_json() {
        let doc = Document::from_yaml(r#"{"kind": "Task", "spec": {"steps": [{"image": "x"}]}}"#)
            .unwrap();
        assert!(matches!(doc, Document::Task(task) if task.spec.steps.len() == 1));
    }
}
