use std::fmt;

/// The kind of value a reference points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// `params.<name>`
    Params,
    /// `results.<name>.path`
    Results,
    /// `step.results.<name>.path`
    StepResults,
    /// `context.task.<key>`
    ContextTask,
    /// `context.taskRun.<key>`
    ContextTaskRun,
    /// Any other `context.*` path; never resolvable in a task
    Context,
    /// `credentials.path`
    Credentials,
    /// `workspaces.<name>.<attribute>`
    Workspaces,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Params => "params",
            Namespace::Results => "results",
            Namespace::StepResults => "step.results",
            Namespace::ContextTask => "context.task",
            Namespace::ContextTaskRun => "context.taskRun",
            Namespace::Context => "context",
            Namespace::Credentials => "credentials",
            Namespace::Workspaces => "workspaces",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trailing index on a reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayIndex {
    /// `[*]`, the whole array
    Star,
    /// `[N]`, one element
    Literal(usize),
}

/// One `$(...)` reference found in a string leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableReference<'a> {
    /// The exact matched text, `$(` through `)`
    pub text: &'a str,
    /// Byte offsets of `text` within the leaf
    pub start: usize,
    pub end: usize,
    pub namespace: Namespace,
    /// Path segments after the namespace
    pub path: Vec<String>,
    /// The first path segment came from bracket syntax (`params["a.b"]`)
    /// and names a parameter exactly
    pub quoted_name: bool,
    pub index: Option<ArrayIndex>,
}

impl<'a> VariableReference<'a> {
    /// Build a reference from a scanned body, or `None` when the body is
    /// not in a recognized namespace (shell `$(date)` and the like)
    pub(crate) fn from_body(
        text: &'a str,
        start: usize,
        end: usize,
        body: &str,
        index: Option<ArrayIndex>,
    ) -> Option<Self> {
        let segments = split_body(body)?;
        let (head, _) = segments.first()?;
        let second = segments.get(1).map(|(name, _)| name.as_str());

        let (namespace, skip) = match (head.as_str(), second) {
            ("params", Some(_)) => (Namespace::Params, 1),
            ("results", _) => (Namespace::Results, 1),
            ("step", Some("results")) => (Namespace::StepResults, 2),
            ("context", Some("task")) => (Namespace::ContextTask, 2),
            ("context", Some("taskRun")) => (Namespace::ContextTaskRun, 2),
            ("context", _) => (Namespace::Context, 1),
            ("credentials", _) => (Namespace::Credentials, 1),
            ("workspaces", _) => (Namespace::Workspaces, 1),
            _ => return None,
        };

        let quoted_name = segments.get(skip).is_some_and(|(_, quoted)| *quoted);
        let path = segments.into_iter().skip(skip).map(|(name, _)| name).collect();

        Some(Self {
            text,
            start,
            end,
            namespace,
            path,
            quoted_name,
            index,
        })
    }

    /// Whether this reference is the entire leaf
    pub fn is_whole(&self, leaf: &str) -> bool {
        self.start == 0 && self.end == leaf.len()
    }

    /// Split a parameter reference into the parameter name and the
    /// remaining key path.
    ///
    /// Bracketed names are taken as-is. Dotted paths resolve to the longest
    /// declared name first, so `params.a.b` addresses a parameter named
    /// `a.b` when one exists and key `b` of parameter `a` otherwise.
    pub fn split_param_name<F>(&self, is_declared: F) -> Option<(String, &[String])>
    where
        F: Fn(&str) -> bool,
    {
        if self.namespace != Namespace::Params || self.path.is_empty() {
            return None;
        }
        if self.quoted_name {
            let name = &self.path[0];
            return is_declared(name).then(|| (name.clone(), &self.path[1..]));
        }
        (1..=self.path.len()).rev().find_map(|split| {
            let name = self.path[..split].join(".");
            is_declared(&name).then(|| (name, &self.path[split..]))
        })
    }

    /// The result name of a `<name>.path` reference. Result names may
    /// contain dots, so every segment before the trailing `path` belongs
    /// to the name.
    pub fn result_name(&self) -> Option<String> {
        match (self.path.as_slice(), self.index) {
            ([name @ .., attribute], None) if attribute == "path" && !name.is_empty() => {
                Some(name.join("."))
            }
            _ => None,
        }
    }
}

/// Split a reference body into segments, flagging bracket-quoted ones
fn split_body(body: &str) -> Option<Vec<(String, bool)>> {
    let mut segments = Vec::new();
    let mut rest = body;

    while !rest.is_empty() {
        if let Some(bracketed) = rest.strip_prefix('[') {
            let quote = bracketed.chars().next()?;
            let inner = &bracketed[quote.len_utf8()..];
            let close = inner.find(quote)?;
            segments.push((inner[..close].to_string(), true));
            rest = inner[close + quote.len_utf8()..].strip_prefix(']')?;
        } else {
            let unprefixed = rest.strip_prefix('.').unwrap_or(rest);
            let end = unprefixed
                .find(|c| c == '.' || c == '[')
                .unwrap_or(unprefixed.len());
            segments.push((unprefixed[..end].to_string(), false));
            rest = &unprefixed[end..];
        }
    }
    Some(segments)
}
