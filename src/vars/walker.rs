//! Structural traversal over every string field that may hold a reference
//!
//! Spec types describe their text-bearing fields as a flat list of
//! [`Field`]s, each one of a closed set of node kinds. One traversal
//! algorithm then serves every shape: [`leaves`] yields each string with its
//! [`FieldPath`], and [`rewrite`] visits the same fields mutably.

use std::collections::BTreeMap;

use crate::validation::{FieldPath, Segment};

/// How a field is shaped
pub enum Node<'a> {
    /// A single string
    Scalar(&'a str),
    /// A list of strings; each element is checked on its own and whole-array
    /// references may expand into it
    List(&'a [String]),
    /// A string-keyed map of strings; values are scalar leaves
    Map(&'a BTreeMap<String, String>),
    /// A nested structure
    Struct(&'a dyn Walk),
    /// A sequence of nested structures, by index or by key
    Items(Vec<(Segment, &'a dyn Walk)>),
}

impl<'a> Node<'a> {
    pub fn indexed<T: Walk>(items: &'a [T]) -> Self {
        Node::Items(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| (Segment::Index(i), item as &dyn Walk))
                .collect(),
        )
    }

    pub fn keyed<T: Walk + Keyed>(items: &'a [T]) -> Self {
        Node::Items(
            items
                .iter()
                .map(|item| (Segment::Key(item.key().to_string()), item as &dyn Walk))
                .collect(),
        )
    }
}

/// Mutable counterpart of [`Node`]
pub enum NodeMut<'a> {
    Scalar(&'a mut String),
    List(&'a mut Vec<String>),
    Map(&'a mut BTreeMap<String, String>),
    Struct(&'a mut dyn Walk),
    Items(Vec<(Segment, &'a mut dyn Walk)>),
}

impl<'a> NodeMut<'a> {
    pub fn indexed<T: Walk>(items: &'a mut [T]) -> Self {
        NodeMut::Items(
            items
                .iter_mut()
                .enumerate()
                .map(|(i, item)| (Segment::Index(i), item as &mut dyn Walk))
                .collect(),
        )
    }

    pub fn keyed<T: Walk + Keyed>(items: &'a mut [T]) -> Self {
        NodeMut::Items(
            items
                .iter_mut()
                .map(|item| {
                    let key = Segment::Key(item.key().to_string());
                    (key, item as &mut dyn Walk)
                })
                .collect(),
        )
    }
}

/// A field of a structure. A field without a segment is inline: its leaves
/// are attributed to the parent's path (an env var's value is reported at
/// `env[NAME]`).
pub struct Field<'a> {
    pub segment: Option<Segment>,
    pub node: Node<'a>,
}

impl<'a> Field<'a> {
    pub fn named(name: &str, node: Node<'a>) -> Self {
        Self {
            segment: Some(Segment::Field(name.to_string())),
            node,
        }
    }

    pub fn inline(node: Node<'a>) -> Self {
        Self {
            segment: None,
            node,
        }
    }
}

pub struct FieldMut<'a> {
    pub segment: Option<Segment>,
    pub node: NodeMut<'a>,
}

impl<'a> FieldMut<'a> {
    pub fn named(name: &str, node: NodeMut<'a>) -> Self {
        Self {
            segment: Some(Segment::Field(name.to_string())),
            node,
        }
    }

    pub fn inline(node: NodeMut<'a>) -> Self {
        Self {
            segment: None,
            node,
        }
    }
}

/// A structure whose string fields may contain references
pub trait Walk {
    fn fields(&self) -> Vec<Field<'_>>;
    fn fields_mut(&mut self) -> Vec<FieldMut<'_>>;
}

/// Elements addressed by name rather than position in field paths
pub trait Keyed {
    fn key(&self) -> &str;
}

/// Declares which fields of a type are walked.
///
/// Kinds: `scalar`, `list`, `map`, `nested` (an `Option` of a walkable
/// struct), `indexed` and `keyed` (a `Vec` of walkable structs), and
/// `inline` (a scalar reported at the parent's path).
macro_rules! impl_walk {
    (@ref $f:ident, scalar $name:literal, $t:expr) => {
        $f.push($crate::vars::walker::Field::named($name, $crate::vars::walker::Node::Scalar(&$t)));
    };
    (@ref $f:ident, inline, $t:expr) => {
        $f.push($crate::vars::walker::Field::inline($crate::vars::walker::Node::Scalar(&$t)));
    };
    (@ref $f:ident, list $name:literal, $t:expr) => {
        $f.push($crate::vars::walker::Field::named($name, $crate::vars::walker::Node::List(&$t)));
    };
    (@ref $f:ident, map $name:literal, $t:expr) => {
        $f.push($crate::vars::walker::Field::named($name, $crate::vars::walker::Node::Map(&$t)));
    };
    (@ref $f:ident, nested $name:literal, $t:expr) => {
        if let Some(inner) = &$t {
            $f.push($crate::vars::walker::Field::named($name, $crate::vars::walker::Node::Struct(inner)));
        }
    };
    (@ref $f:ident, indexed $name:literal, $t:expr) => {
        $f.push($crate::vars::walker::Field::named(
            $name,
            $crate::vars::walker::Node::indexed($t.as_slice()),
        ));
    };
    (@ref $f:ident, keyed $name:literal, $t:expr) => {
        $f.push($crate::vars::walker::Field::named(
            $name,
            $crate::vars::walker::Node::keyed($t.as_slice()),
        ));
    };

    (@mut $f:ident, scalar $name:literal, $t:expr) => {
        $f.push($crate::vars::walker::FieldMut::named($name, $crate::vars::walker::NodeMut::Scalar(&mut $t)));
    };
    (@mut $f:ident, inline, $t:expr) => {
        $f.push($crate::vars::walker::FieldMut::inline($crate::vars::walker::NodeMut::Scalar(&mut $t)));
    };
    (@mut $f:ident, list $name:literal, $t:expr) => {
        $f.push($crate::vars::walker::FieldMut::named($name, $crate::vars::walker::NodeMut::List(&mut $t)));
    };
    (@mut $f:ident, map $name:literal, $t:expr) => {
        $f.push($crate::vars::walker::FieldMut::named($name, $crate::vars::walker::NodeMut::Map(&mut $t)));
    };
    (@mut $f:ident, nested $name:literal, $t:expr) => {
        if let Some(inner) = &mut $t {
            $f.push($crate::vars::walker::FieldMut::named($name, $crate::vars::walker::NodeMut::Struct(inner)));
        }
    };
    (@mut $f:ident, indexed $name:literal, $t:expr) => {
        $f.push($crate::vars::walker::FieldMut::named(
            $name,
            $crate::vars::walker::NodeMut::indexed($t.as_mut_slice()),
        ));
    };
    (@mut $f:ident, keyed $name:literal, $t:expr) => {
        $f.push($crate::vars::walker::FieldMut::named(
            $name,
            $crate::vars::walker::NodeMut::keyed($t.as_mut_slice()),
        ));
    };

    ($ty:ty { $($kind:ident $($name:literal)? => $field:ident),* $(,)? }) => {
        impl $crate::vars::walker::Walk for $ty {
            fn fields(&self) -> Vec<$crate::vars::walker::Field<'_>> {
                let mut fields = Vec::new();
                $( $crate::vars::walker::impl_walk!(@ref fields, $kind $($name)?, self.$field); )*
                fields
            }

            fn fields_mut(&mut self) -> Vec<$crate::vars::walker::FieldMut<'_>> {
                let mut fields = Vec::new();
                $( $crate::vars::walker::impl_walk!(@mut fields, $kind $($name)?, self.$field); )*
                fields
            }
        }
    };
}

pub(crate) use impl_walk;

/// Whether a leaf is a whole field or one element of a list field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Scalar,
    ListElement,
}

/// One string leaf and where it lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf<'a> {
    pub value: &'a str,
    pub path: FieldPath,
    pub position: Position,
}

enum Pending<'a> {
    Node(Node<'a>),
    Element(&'a str),
}

/// Depth-first iterator over the string leaves of a structure, in field
/// declaration order
pub struct Leaves<'a> {
    stack: Vec<(FieldPath, Pending<'a>)>,
}

/// Walk every string leaf under `root`, with paths relative to it
pub fn leaves(root: &dyn Walk) -> Leaves<'_> {
    leaves_at(root, FieldPath::root())
}

/// Walk every string leaf under `root`, with paths prefixed by `base`
pub fn leaves_at(root: &dyn Walk, base: FieldPath) -> Leaves<'_> {
    let mut stack = Vec::new();
    push_fields(&mut stack, &base, root.fields());
    Leaves { stack }
}

fn push_fields<'a>(
    stack: &mut Vec<(FieldPath, Pending<'a>)>,
    path: &FieldPath,
    fields: Vec<Field<'a>>,
) {
    for field in fields.into_iter().rev() {
        let path = match field.segment {
            Some(segment) => path.child(segment),
            None => path.clone(),
        };
        stack.push((path, Pending::Node(field.node)));
    }
}

impl<'a> Iterator for Leaves<'a> {
    type Item = Leaf<'a>;

    fn next(&mut self) -> Option<Leaf<'a>> {
        while let Some((path, pending)) = self.stack.pop() {
            match pending {
                Pending::Element(value) => {
                    return Some(Leaf {
                        value,
                        path,
                        position: Position::ListElement,
                    })
                }
                Pending::Node(Node::Scalar(value)) => {
                    return Some(Leaf {
                        value,
                        path,
                        position: Position::Scalar,
                    })
                }
                Pending::Node(Node::List(values)) => {
                    for (i, value) in values.iter().enumerate().rev() {
                        self.stack.push((path.at_index(i), Pending::Element(value)));
                    }
                }
                Pending::Node(Node::Map(map)) => {
                    for (key, value) in map.iter().rev() {
                        self.stack
                            .push((path.at_key(key.as_str()), Pending::Node(Node::Scalar(value))));
                    }
                }
                Pending::Node(Node::Struct(inner)) => {
                    push_fields(&mut self.stack, &path, inner.fields());
                }
                Pending::Node(Node::Items(items)) => {
                    for (segment, inner) in items.into_iter().rev() {
                        self.stack
                            .push((path.child(segment), Pending::Node(Node::Struct(inner))));
                    }
                }
            }
        }
        None
    }
}

/// Receives every mutable string leaf during [`rewrite`]
pub trait Rewrite {
    type Error;

    /// A scalar field or a map value
    fn scalar(&mut self, value: &mut String, path: &FieldPath) -> Result<(), Self::Error>;

    /// A whole list field; the rewriter may change its length
    fn list(&mut self, values: &mut Vec<String>, path: &FieldPath) -> Result<(), Self::Error>;
}

/// Visit every string field under `root` mutably, stopping at the first error
pub fn rewrite<R: Rewrite>(root: &mut dyn Walk, rewriter: &mut R) -> Result<(), R::Error> {
    rewrite_at(root, &FieldPath::root(), rewriter)
}

/// Like [`rewrite`], with paths prefixed by `base`
pub fn rewrite_at<R: Rewrite>(
    node: &mut dyn Walk,
    base: &FieldPath,
    rewriter: &mut R,
) -> Result<(), R::Error> {
    for field in node.fields_mut() {
        let path = match field.segment {
            Some(segment) => base.child(segment),
            None => base.clone(),
        };
        match field.node {
            NodeMut::Scalar(value) => rewriter.scalar(value, &path)?,
            NodeMut::List(values) => rewriter.list(values, &path)?,
            NodeMut::Map(map) => {
                for (key, value) in map.iter_mut() {
                    rewriter.scalar(value, &path.at_key(key.as_str()))?;
                }
            }
            NodeMut::Struct(inner) => rewrite_at(inner, &path, rewriter)?,
            NodeMut::Items(items) => {
                for (segment, inner) in items {
                    rewrite_at(inner, &path.child(segment), rewriter)?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{EnvVar, Step, TaskSpec, VolumeMount};

    fn rendered(root: &dyn Walk) -> Vec<(String, String, Position)> {
        leaves(root)
            .filter(|leaf| !leaf.value.is_empty())
            .map(|leaf| (leaf.path.to_string(), leaf.value.to_string(), leaf.position))
            .collect()
    }

    #[test]
    fn test_step_leaves_carry_paths() {
        let mut step = Step::new("build", "golang")
            .with_args(["a", "b"])
            .with_env("URL", "http://x");
        step.volume_mounts.push(VolumeMount::new("cache", "/cache"));

        let leaves = rendered(&step);
        assert_eq!(
            leaves,
            vec![
                ("name".into(), "build".into(), Position::Scalar),
                ("image".into(), "golang".into(), Position::Scalar),
                ("args[0]".into(), "a".into(), Position::ListElement),
                ("args[1]".into(), "b".into(), Position::ListElement),
                ("env[URL]".into(), "http://x".into(), Position::Scalar),
                ("volumeMount[0].name".into(), "cache".into(), Position::Scalar),
                ("volumeMount[0].mountPath".into(), "/cache".into(), Position::Scalar),
            ]
        );
    }

    #[test]
    fn test_walk_is_deterministic_and_restartable() {
        let spec = TaskSpec {
            steps: vec![
                Step::new("a", "img").with_script("echo"),
                Step::new("b", "img2"),
            ],
            ..Default::default()
        };
        let first = rendered(&spec);
        let second = rendered(&spec);
        assert_eq!(first, second);
        assert_eq!(first[0].0, "steps[0].name");
        assert_eq!(first.last().unwrap().0, "steps[1].image");
    }

    #[test]
    fn test_leaves_at_prefixes_paths() {
        let env = EnvVar::new("HOME", "/root");
        let paths: Vec<String> = leaves_at(&env, FieldPath::field("env").at_key("HOME"))
            .map(|leaf| leaf.path.to_string())
            .collect();
        assert_eq!(paths, vec!["env[HOME]"]);
    }

    struct Upper;

    impl Rewrite for Upper {
        type Error = ();

        fn scalar(&mut self, value: &mut String, _path: &FieldPath) -> Result<(), ()> {
            *value = value.to_uppercase();
            Ok(())
        }

        fn list(&mut self, values: &mut Vec<String>, _path: &FieldPath) -> Result<(), ()> {
            values.push("extra".to_string());
            Ok(())
        }
    }

    #[test]
    fn test_rewrite_visits_every_field() {
        let mut step = Step::new("build", "golang")
            .with_args(["a"])
            .with_env("URL", "x");
        rewrite(&mut step, &mut Upper).unwrap();
        assert_eq!(step.name, "BUILD");
        assert_eq!(step.image, "GOLANG");
        assert_eq!(step.args, vec!["a", "extra"]);
        assert_eq!(step.env[0].value, "X");
        assert_eq!(step.env[0].name, "URL");
    }
}
