//! Per-call execution state.
//!
//! A [`ParseContext`] lives for exactly one top-level parse call: it holds
//! the ordered issue list, the path segment stack, and the abort flag for
//! the node currently executing. It is never shared between calls.

use crate::issue::{Issue, IssueCode, PathSegment};
use crate::value::Value;

/// Internal outcome of executing one schema node.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Parsed {
    /// The node produced a (possibly transformed) value.
    Valid(Value),
    /// The node failed; its issues are in the context.
    Invalid,
}

impl Parsed {
    pub(crate) fn is_valid(&self) -> bool {
        matches!(self, Parsed::Valid(_))
    }
}

/// Mutable state threaded through a single validation run.
#[derive(Debug, Default)]
pub(crate) struct ParseContext {
    issues: Vec<Issue>,
    path: Vec<PathSegment>,
    aborted: bool,
}

impl ParseContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Enter a child location (object field, array index, map key, ...).
    pub(crate) fn push_path(&mut self, segment: PathSegment) {
        self.path.push(segment);
    }

    /// Leave the current child location.
    pub(crate) fn pop_path(&mut self) {
        self.path.pop();
    }

    /// Record an issue at the current path with the code's default message.
    pub(crate) fn add_issue(&mut self, code: IssueCode, input: Value) {
        self.issues.push(Issue::new(code, self.path.clone(), input));
    }

    /// Record an issue at the current path with an overridden message.
    pub(crate) fn add_issue_with_message(
        &mut self,
        code: IssueCode,
        input: Value,
        message: Option<String>,
    ) {
        let mut issue = Issue::new(code, self.path.clone(), input);
        if let Some(message) = message {
            issue.message = message;
        }
        self.issues.push(issue);
    }

    /// Record an issue below the current path, for refinement path overrides.
    pub(crate) fn add_issue_at(
        &mut self,
        relative: &[PathSegment],
        code: IssueCode,
        input: Value,
        message: Option<String>,
    ) {
        let mut path = self.path.clone();
        path.extend(relative.iter().cloned());
        let mut issue = Issue::new(code, path, input);
        if let Some(message) = message {
            issue.message = message;
        }
        self.issues.push(issue);
    }

    /// Number of issues recorded so far; nodes compare before/after to tell
    /// whether their subtree stayed clean.
    pub(crate) fn issue_count(&self) -> usize {
        self.issues.len()
    }

    pub(crate) fn aborted(&self) -> bool {
        self.aborted
    }

    pub(crate) fn set_aborted(&mut self) {
        self.aborted = true;
    }

    /// Save and clear the abort flag when entering a node; abort semantics
    /// are scoped to one node's pipeline and must not leak to ancestors or
    /// siblings.
    pub(crate) fn enter_node(&mut self) -> bool {
        std::mem::replace(&mut self.aborted, false)
    }

    pub(crate) fn leave_node(&mut self, saved: bool) {
        self.aborted = saved;
    }

    pub(crate) fn into_issues(self) -> Vec<Issue> {
        self.issues
    }

    pub(crate) fn issues(&self) -> &[Issue] {
        &self.issues
    }
}

/// A pending issue reported by a refinement or transform, relative to the
/// node under validation.
#[derive(Debug, Clone)]
pub struct RawIssue {
    pub(crate) code: IssueCode,
    pub(crate) message: Option<String>,
    pub(crate) path: Vec<PathSegment>,
}

/// Issue collector handed to rich refinements and transforms.
///
/// Closures report expected failures by pushing issues here — never by
/// panicking. Collected issues are applied to the run's context after the
/// closure returns, prefixed with the node's current path.
#[derive(Debug, Default)]
pub struct EffectContext {
    raised: Vec<RawIssue>,
}

impl EffectContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Report a custom failure at the value under validation.
    pub fn issue(&mut self, message: impl Into<String>) {
        self.raised.push(RawIssue {
            code: IssueCode::Custom,
            message: Some(message.into()),
            path: Vec::new(),
        });
    }

    /// Report a custom failure below the value under validation, e.g. at one
    /// field of an object refinement.
    pub fn issue_at(
        &mut self,
        path: impl IntoIterator<Item = PathSegment>,
        message: impl Into<String>,
    ) {
        self.raised.push(RawIssue {
            code: IssueCode::Custom,
            message: Some(message.into()),
            path: path.into_iter().collect(),
        });
    }

    /// Report a failure with an explicit code and optional message override.
    pub fn issue_with_code(&mut self, code: IssueCode, message: Option<String>) {
        self.raised.push(RawIssue {
            code,
            message,
            path: Vec::new(),
        });
    }

    /// Whether the closure reported any failure.
    pub fn has_issues(&self) -> bool {
        !self.raised.is_empty()
    }

    pub(crate) fn into_raised(self) -> Vec<RawIssue> {
        self.raised
    }
}
