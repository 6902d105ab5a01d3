//! Checks that every reference is declared and used where its type allows

use tracing::trace;

use super::resolver::{Declarations, ResolvedType, Unresolved};
use super::scanner::scan;
use super::walker::{leaves_at, Leaf, Position, Walk};
use crate::validation::{FieldError, FieldErrors, FieldPath};

/// Check every reference in one leaf, recording problems in `errors`.
///
/// Existence and isolation errors quote the whole leaf; type errors quote
/// the offending reference.
pub fn check_leaf(leaf: &Leaf<'_>, declarations: &Declarations<'_>, errors: &mut FieldErrors) {
    let references = scan(leaf.value);
    if references.is_empty() {
        return;
    }
    trace!(path = %leaf.path, count = references.len(), "Checking references");

    for reference in &references {
        if !declarations.checks(reference.namespace) {
            continue;
        }
        let path = leaf.path.clone();
        match declarations.resolve(reference) {
            Ok(ResolvedType::String) => {}
            Ok(ResolvedType::Array) => match leaf.position {
                Position::Scalar => errors.push(FieldError::type_invalid(reference.text, path)),
                Position::ListElement if !reference.is_whole(leaf.value) => {
                    errors.push(FieldError::not_isolated(leaf.value, path))
                }
                Position::ListElement => {}
            },
            Ok(ResolvedType::Object) | Err(Unresolved::TypeInvalid) => {
                errors.push(FieldError::type_invalid(reference.text, path))
            }
            Err(Unresolved::NotDeclared) => {
                errors.push(FieldError::non_existent(leaf.value, path))
            }
            Err(Unresolved::IndexOutOfRange { index, len }) => errors.push(
                FieldError::non_existent(leaf.value, path).with_details(format!(
                    "index {} is out of range for {} with {} default value(s)",
                    index, reference.text, len
                )),
            ),
        }
    }
}

/// Check every leaf under `root`, attributing errors below `base`
pub fn check_usage(root: &dyn Walk, base: FieldPath, declarations: &Declarations<'_>) -> FieldErrors {
    let mut errors = FieldErrors::new();
    for leaf in leaves_at(root, base) {
        check_leaf(&leaf, declarations, &mut errors);
    }
    errors
}

/// Check a list of structures, attributing errors to `name[i]`
pub fn check_usage_indexed<T: Walk>(
    items: &[T],
    name: &str,
    declarations: &Declarations<'_>,
) -> FieldErrors {
    let mut errors = FieldErrors::new();
    for (i, item) in items.iter().enumerate() {
        errors.also(check_usage(
            item,
            FieldPath::field(name).at_index(i),
            declarations,
        ));
    }
    errors
}
