//! Variable references: finding, typing and checking `$(...)` expressions
//!
//! The [`walker`] yields every string leaf of a spec with its path, the
//! [`scanner`] extracts references from a leaf, the [`resolver`] types them
//! against the declarations in scope, and [`usage`] applies the placement
//! rules. Substitution reuses the walker and scanner.

mod nodes;
pub mod reference;
pub mod resolver;
pub mod scanner;
pub mod usage;
pub mod walker;

pub use reference::{ArrayIndex, Namespace, VariableReference};
pub use resolver::{Declarations, ResolvedType, Unresolved};
pub use scanner::{contains_reference, scan};
pub use usage::{check_leaf, check_usage, check_usage_indexed};
pub use walker::{leaves, leaves_at, rewrite, rewrite_at, Leaf, Position, Rewrite, Walk};
