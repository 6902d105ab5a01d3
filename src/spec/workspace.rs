use serde::{Deserialize, Serialize};

use crate::config::PlatformPaths;

/// A workspace the task expects to be bound at run time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceDeclaration {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mount_path: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

impl WorkspaceDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_mount_path(mut self, mount_path: impl Into<String>) -> Self {
        self.mount_path = mount_path.into();
        self
    }

    /// Where the workspace is mounted: the declared path (relative paths
    /// land under the workspace root), or `<root>/<name>` when unset
    pub fn resolved_mount_path(&self, paths: &PlatformPaths) -> String {
        if self.mount_path.is_empty() {
            return paths.default_workspace_path(&self.name);
        }
        if self.mount_path.starts_with('/') {
            self.mount_path.clone()
        } else {
            format!("{}/{}", paths.workspace_root, self.mount_path)
        }
    }
}

/// A step or sidecar's use of a declared workspace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceUsage {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mount_path: String,
}

impl WorkspaceUsage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mount_path: String::new(),
        }
    }
}

/// Lexically normalize a slash-separated path: collapse repeated and
/// trailing separators and resolve `.` and `..`
pub fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}
