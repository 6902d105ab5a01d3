//! Static validation of task and step action specs
//!
//! Validation never stops at the first problem: every check appends to a
//! [`FieldErrors`] so users see all findings at once, each attributed to
//! the field path it was found at.

pub mod declarations;
pub mod field_error;
pub mod task;

pub use declarations::{
    require_api_fields, validate_no_duplicate_names, validate_object_params_have_properties,
    validate_param_declarations, validate_param_enums, validate_param_names,
    validate_param_types, validate_result, validate_results, validate_volumes,
    validate_workspaces,
};
pub use field_error::{ErrorKind, FieldError, FieldErrors, FieldPath, Segment};
pub use task::{validate_parameter_variables, validate_usage_of_declared_parameters};
