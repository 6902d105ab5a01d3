//! # taskvars
//!
//! Static validation and run-time substitution of `$(...)` variable
//! references in CI/CD task templates.
//!
//! ## Usage
//!
//! ```bash
//! taskvars validate task.yaml [--config flags.yaml] [--api-fields beta]
//! taskvars substitute task.yaml --param image=golang [--context run.yaml]
//! ```
//!
//! ## Modules
//!
//! - `spec` - Data model for tasks and step actions
//! - `vars` - Walking spec fields, scanning and typing references
//! - `validation` - Field error aggregation and all static checks
//! - `substitution` - Binding run-time values and replacing references
//! - `config` - Feature flags and platform paths
//! - `error` - Crate-level error type and error code registry
pub mod config;
pub mod error;
pub mod spec;
pub mod substitution;
pub mod validation;
pub mod vars;

pub use error::{Result, TaskVarsError};
