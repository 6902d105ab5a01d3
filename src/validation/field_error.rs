//! Aggregated, path-attributed validation errors
//!
//! Every validator in this crate reports into a [`FieldErrors`] accumulator
//! instead of returning early, so one pass over a spec surfaces every
//! problem. Errors carry one or more [`FieldPath`]s rendered in the
//! `steps[0].args[1]` / `steps[0].env[NAME]` form, and optional details used
//! for format hints.

use serde::Serialize;
use std::fmt;

/// One element of a structural path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Segment {
    /// A named field (`args`). May itself contain dots (`params.foo.type`).
    Field(String),
    /// A positional index (`[2]`)
    Index(usize),
    /// A keyed element (`[URL]`, `[param1]`)
    Key(String),
}

/// A structural path identifying the field or element that produced an error
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn field(name: impl Into<String>) -> Self {
        Self::root().child(Segment::Field(name.into()))
    }

    /// Extend the path with one more segment
    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    pub fn at_field(&self, name: impl Into<String>) -> Self {
        self.child(Segment::Field(name.into()))
    }

    pub fn at_index(&self, index: usize) -> Self {
        self.child(Segment::Index(index))
    }

    pub fn at_key(&self, key: impl Into<String>) -> Self {
        self.child(Segment::Key(key.into()))
    }

    /// Prepend a segment, used when an error bubbles up through a parent
    pub fn prefixed(mut self, segment: Segment) -> Self {
        self.segments.insert(0, segment);
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Field(name) if i == 0 => write!(f, "{}", name)?,
                Segment::Field(name) => write!(f, ".{}", name)?,
                Segment::Index(index) => write!(f, "[{}]", index)?,
                Segment::Key(key) => write!(f, "[{}]", key)?,
            }
        }
        Ok(())
    }
}

impl Serialize for FieldPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Classification of a validation error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// A reference names an undeclared parameter, result, context key,
    /// workspace or object property
    Existence,
    /// A reference's type cannot be used at this position
    TypeMismatch,
    /// An array reference shares its field with other text
    Isolation,
    /// A declared name violates the allowed alphabet or format
    NamingFormat,
    /// A name or mount path is declared more than once
    Duplicate,
    /// A declared type disagrees with the default value's shape
    DefaultTypeMismatch,
    /// Enum misuse on a parameter declaration
    Enum,
    /// A construct requires a feature flag or API tier that is not enabled
    FeatureGate,
    MissingField,
    InvalidValue,
}

/// A single validation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub kind: ErrorKind,
    pub message: String,
    pub paths: Vec<FieldPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl FieldError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, path: FieldPath) -> Self {
        let paths = if path.is_root() { Vec::new() } else { vec![path] };
        Self {
            kind,
            message: message.into(),
            paths,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_path(mut self, path: FieldPath) -> Self {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
        self
    }

    /// `missing field(s)` at the given dotted field name
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::MissingField,
            "missing field(s)",
            FieldPath::field(field),
        )
    }

    /// `invalid value: <value>` at `path`
    pub fn invalid_value(value: impl fmt::Display, path: FieldPath) -> Self {
        Self::new(
            ErrorKind::InvalidValue,
            format!("invalid value: {}", value),
            path,
        )
    }

    /// A field that must not be combined with another one
    pub fn multiple_one_of(path: FieldPath) -> Self {
        Self::new(ErrorKind::Duplicate, "expected exactly one, got both", path)
    }

    /// Reference to something that was never declared
    pub fn non_existent(leaf: &str, path: FieldPath) -> Self {
        Self::new(
            ErrorKind::Existence,
            format!("non-existent variable in {:?}", leaf),
            path,
        )
    }

    /// Reference whose type cannot appear in this field
    pub fn type_invalid(text: &str, path: FieldPath) -> Self {
        Self::new(
            ErrorKind::TypeMismatch,
            format!("variable type invalid in {:?}", text),
            path,
        )
    }

    /// Array reference sharing its field with other text
    pub fn not_isolated(leaf: &str, path: FieldPath) -> Self {
        Self::new(
            ErrorKind::Isolation,
            format!("variable is not properly isolated in {:?}", leaf),
            path,
        )
    }

    fn same_finding(&self, other: &FieldError) -> bool {
        self.kind == other.kind && self.message == other.message && self.details == other.details
    }

    fn prefix_paths(&mut self, segment: &Segment) {
        for path in &mut self.paths {
            *path = std::mem::take(path).prefixed(segment.clone());
        }
        if self.paths.is_empty() {
            self.paths.push(FieldPath::root().child(segment.clone()));
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if !self.paths.is_empty() {
            let paths: Vec<String> = self.paths.iter().map(ToString::to_string).collect();
            write!(f, ": {}", paths.join(", "))?;
        }
        if let Some(details) = &self.details {
            write!(f, "\n{}", details)?;
        }
        Ok(())
    }
}

/// Ordered accumulator of validation errors
///
/// Identical findings (same kind, message and details) reported at several
/// paths are merged into one error listing every path, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors {
    errors: Vec<FieldError>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one error, merging it with an identical earlier finding
    pub fn push(&mut self, error: FieldError) {
        if let Some(existing) = self.errors.iter_mut().find(|e| e.same_finding(&error)) {
            for path in error.paths {
                if !existing.paths.contains(&path) {
                    existing.paths.push(path);
                }
            }
            return;
        }
        self.errors.push(error);
    }

    /// Merge another set of errors into this one
    pub fn also(&mut self, other: impl Into<FieldErrors>) {
        for error in other.into().errors {
            self.push(error);
        }
    }

    /// Prefix every path with a field name
    pub fn via_field(self, name: impl Into<String>) -> Self {
        self.via(Segment::Field(name.into()))
    }

    /// Prefix every path with an index
    pub fn via_index(self, index: usize) -> Self {
        self.via(Segment::Index(index))
    }

    /// Prefix every path with `name[index]`
    pub fn via_field_index(self, name: impl Into<String>, index: usize) -> Self {
        self.via_index(index).via_field(name)
    }

    /// Prefix every path with a keyed element
    pub fn via_key(self, key: impl Into<String>) -> Self {
        self.via(Segment::Key(key.into()))
    }

    fn via(mut self, segment: Segment) -> Self {
        for error in &mut self.errors {
            error.prefix_paths(&segment);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Whether any recorded error is of the given kind
    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<FieldError> for FieldErrors {
    fn from(error: FieldError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl FromIterator<FieldError> for FieldErrors {
    fn from_iter<I: IntoIterator<Item = FieldError>>(iter: I) -> Self {
        let mut errors = FieldErrors::new();
        for error in iter {
            errors.push(error);
        }
        errors
    }
}

impl IntoIterator for FieldErrors {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        write!(f, "{}", rendered.join("\n"))
    }
}

impl std::error::Error for FieldErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_rendering() {
        let path = FieldPath::field("steps")
            .at_index(0)
            .at_field("env")
            .at_key("URL");
        assert_eq!(path.to_string(), "steps[0].env[URL]");

        let path = FieldPath::field("steps")
            .at_index(2)
            .at_field("args")
            .at_index(0);
        assert_eq!(path.to_string(), "steps[2].args[0]");
    }

    #[test]
    fn test_via_field_prefixes_all_paths() {
        let errors = FieldErrors::from(FieldError::non_existent(
            "$(params.x)",
            FieldPath::field("args").at_index(0),
        ))
        .via_field_index("steps", 0)
        .via_field("spec");

        assert_eq!(
            errors.to_string(),
            r#"non-existent variable in "$(params.x)": spec.steps[0].args[0]"#
        );
    }

    #[test]
    fn test_via_on_pathless_error_creates_path() {
        let errors = FieldErrors::from(FieldError::new(
            ErrorKind::Enum,
            "enum can only be set with string type param",
            FieldPath::root(),
        ))
        .via_key("param1")
        .via_field("params");
        assert_eq!(
            errors.to_string(),
            "enum can only be set with string type param: params[param1]"
        );
    }

    #[test]
    fn test_identical_findings_merge_paths() {
        let mut errors = FieldErrors::new();
        errors.push(FieldError::type_invalid(
            "$(params.obj)",
            FieldPath::field("image"),
        ));
        errors.push(FieldError::type_invalid(
            "$(params.obj)",
            FieldPath::field("workingDir"),
        ));
        errors.push(FieldError::type_invalid(
            "$(params.obj)",
            FieldPath::field("image"),
        ));

        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.to_string(),
            r#"variable type invalid in "$(params.obj)": image, workingDir"#
        );
    }

    #[test]
    fn test_details_rendered_on_own_line() {
        let error = FieldError::invalid_value("wrong", FieldPath::field("type"))
            .with_details("type must be string");
        insta::assert_snapshot!(error.to_string(), @r"
        invalid value: wrong: type
        type must be string
        ");
    }

    #[test]
    fn test_message_escapes_control_characters() {
        let error = FieldError::non_existent("\n\techo $(results.x.path)", FieldPath::field("script"));
        assert_eq!(
            error.message,
            r#"non-existent variable in "\n\techo $(results.x.path)""#
        );
    }

    #[test]
    fn test_into_result() {
        assert!(FieldErrors::new().into_result().is_ok());
        let errors = FieldErrors::from(FieldError::missing_field("steps"));
        assert!(errors.has_kind(ErrorKind::MissingField));
        assert!(errors.into_result().is_err());
    }
}
