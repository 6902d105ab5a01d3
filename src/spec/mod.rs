//! Data model for tasks and step actions
//!
//! Every type deserializes from the camelCase YAML/JSON form users write.
//! Declarations are immutable once loaded; validation and substitution only
//! ever borrow them.

pub mod container;
pub mod document;
pub mod param;
pub mod result;
pub mod step_action;
pub mod task;
pub mod workspace;

pub use container::{
    ConfigMapVolumeSource, CsiVolumeSource, EmptyDirVolumeSource, EnvFromSource, EnvVar,
    EnvVarSource, KeySelector, KeyToPath, LocalObjectReference, PersistentVolumeClaimVolumeSource,
    ProjectedVolumeSource, Ref, SecretVolumeSource, SecurityContext, ServiceAccountTokenProjection,
    Sidecar, Step, StepTemplate, Volume, VolumeMount, VolumeProjection, WhenExpression,
};
pub use document::{Document, Metadata, StepAction, Task};
pub use param::{Param, ParamSpec, ParamType, ParamValue, PropertySpec};
pub use result::{ResultSpec, StepResult, TaskResult};
pub use step_action::StepActionSpec;
pub use task::TaskSpec;
pub use workspace::{clean_path, WorkspaceDeclaration, WorkspaceUsage};
