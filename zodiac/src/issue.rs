//! Validation issues and the aggregate error type.
//!
//! Every validation failure is one [`Issue`]: a code, a path locating the
//! failure inside nested input, a human-readable message, and the offending
//! input value. Issues are collected in insertion order during a run and
//! surfaced together as a [`ValidationError`].

use crate::value::{Value, ValueType};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// One step of a path into nested input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Object field or map/record key.
    Key(String),
    /// Array element, tuple slot, or set element position.
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// Kind-specific classification of a validation failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum IssueCode {
    /// The input's base type did not match the schema's expectation.
    InvalidType {
        expected: &'static str,
        received: ValueType,
    },
    /// The input did not equal the required literal.
    InvalidLiteral { expected: Value },
    /// The input string was not one of the allowed enum options.
    InvalidEnumValue { options: Vec<String> },
    /// A strict object received keys absent from its field map.
    UnrecognizedKeys { keys: Vec<String> },
    /// No union branch accepted the input; carries each branch's issues in
    /// branch declaration order.
    InvalidUnion { branch_issues: Vec<Vec<Issue>> },
    /// The discriminator field held a value with no matching branch.
    InvalidUnionDiscriminator { options: Vec<String> },
    /// A lower bound was violated.
    TooSmall {
        minimum: f64,
        inclusive: bool,
        origin: ValueType,
    },
    /// An upper bound was violated.
    TooBig {
        maximum: f64,
        inclusive: bool,
        origin: ValueType,
    },
    /// A named string format (email, url, uuid, ...) did not match.
    InvalidString { format: String },
    /// The number was not a multiple of the configured step.
    NotMultipleOf { multiple_of: f64 },
    /// The number was NaN or infinite.
    NotFinite,
    /// The value could not be interpreted as a date.
    InvalidDate,
    /// Both intersection branches succeeded but their outputs conflict.
    InvalidIntersection,
    /// A refinement or transform reported a failure.
    Custom,
}

impl IssueCode {
    /// Default human-readable message for this code.
    pub fn default_message(&self) -> String {
        match self {
            IssueCode::InvalidType { expected, received } => {
                format!("expected {expected}, received {received}")
            }
            IssueCode::InvalidLiteral { expected } => {
                format!("expected literal {}", render(expected))
            }
            IssueCode::InvalidEnumValue { options } => {
                format!("expected one of: {}", options.join(", "))
            }
            IssueCode::UnrecognizedKeys { keys } => {
                format!("unrecognized key(s) in object: {}", keys.join(", "))
            }
            IssueCode::InvalidUnion { branch_issues } => {
                format!("invalid input: no match among {} union branches", branch_issues.len())
            }
            IssueCode::InvalidUnionDiscriminator { options } => {
                format!("invalid discriminator value, expected one of: {}", options.join(", "))
            }
            IssueCode::TooSmall {
                minimum,
                inclusive,
                origin,
            } => match origin {
                ValueType::String => {
                    format!("string must contain at least {} character(s)", fmt_num(*minimum))
                }
                ValueType::Array | ValueType::Set | ValueType::Object | ValueType::Map => {
                    format!("must contain at least {} element(s)", fmt_num(*minimum))
                }
                _ => format!(
                    "must be greater than {}{}",
                    if *inclusive { "or equal to " } else { "" },
                    fmt_num(*minimum)
                ),
            },
            IssueCode::TooBig {
                maximum,
                inclusive,
                origin,
            } => match origin {
                ValueType::String => {
                    format!("string must contain at most {} character(s)", fmt_num(*maximum))
                }
                ValueType::Array | ValueType::Set | ValueType::Object | ValueType::Map => {
                    format!("must contain at most {} element(s)", fmt_num(*maximum))
                }
                _ => format!(
                    "must be less than {}{}",
                    if *inclusive { "or equal to " } else { "" },
                    fmt_num(*maximum)
                ),
            },
            IssueCode::InvalidString { format } => format!("invalid {format}"),
            IssueCode::NotMultipleOf { multiple_of } => {
                format!("must be a multiple of {}", fmt_num(*multiple_of))
            }
            IssueCode::NotFinite => "must be a finite number".to_string(),
            IssueCode::InvalidDate => "invalid date".to_string(),
            IssueCode::InvalidIntersection => {
                "intersection branches produced unmergeable values".to_string()
            }
            IssueCode::Custom => "invalid value".to_string(),
        }
    }
}

/// One discrete validation failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    /// Classification plus code-specific metadata.
    #[serde(flatten)]
    pub code: IssueCode,
    /// Segments leading to the failing value; empty for a root failure.
    pub path: Vec<PathSegment>,
    /// Human-readable description.
    pub message: String,
    /// The offending input value.
    pub input: Value,
}

impl Issue {
    /// Create an issue with the code's default message.
    pub fn new(code: IssueCode, path: Vec<PathSegment>, input: Value) -> Self {
        let message = code.default_message();
        Self {
            code,
            path,
            message,
            input,
        }
    }

    /// Dotted path string (`user.tags[2]`), empty for a root failure.
    pub fn path_string(&self) -> String {
        let mut out = String::new();
        for segment in &self.path {
            match segment {
                PathSegment::Key(key) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(key);
                }
                PathSegment::Index(index) => {
                    out.push_str(&format!("[{index}]"));
                }
            }
        }
        out
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path_string();
        if path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{path}: {}", self.message)
        }
    }
}

/// Aggregate failure for one parse call, carrying the full ordered issue
/// list — never just the first issue.
#[derive(Debug, Clone, Error)]
#[error("validation failed:\n{}", format_issues(.issues))]
pub struct ValidationError {
    issues: Vec<Issue>,
}

impl ValidationError {
    /// Wrap an ordered issue list.
    pub fn new(issues: Vec<Issue>) -> Self {
        Self { issues }
    }

    /// All issues, in the order they were recorded.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Consume the error, yielding the issue list.
    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }
}

/// Numbered, line-per-issue rendering for the aggregate display.
fn format_issues(issues: &[Issue]) -> String {
    issues
        .iter()
        .enumerate()
        .map(|(i, issue)| format!("  {}. {}", i + 1, issue))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Compact rendering of a value for messages.
fn render(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("{value:?}"))
}

/// Format a bound without a trailing `.0` for whole numbers.
fn fmt_num(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_string() {
        let issue = Issue::new(
            IssueCode::InvalidType {
                expected: "string",
                received: ValueType::Number,
            },
            vec!["user".into(), "tags".into(), 2.into()],
            Value::from(7),
        );
        assert_eq!(issue.path_string(), "user.tags[2]");
        assert_eq!(issue.to_string(), "user.tags[2]: expected string, received number");
    }

    #[test]
    fn test_root_issue_display_has_no_path_prefix() {
        let issue = Issue::new(
            IssueCode::InvalidType {
                expected: "object",
                received: ValueType::Null,
            },
            vec![],
            Value::Null,
        );
        assert_eq!(issue.to_string(), "expected object, received null");
    }

    #[test]
    fn test_too_small_messages_by_origin() {
        let chars = IssueCode::TooSmall {
            minimum: 5.0,
            inclusive: true,
            origin: ValueType::String,
        };
        assert_eq!(chars.default_message(), "string must contain at least 5 character(s)");

        let bound = IssueCode::TooSmall {
            minimum: 10.0,
            inclusive: false,
            origin: ValueType::Number,
        };
        assert_eq!(bound.default_message(), "must be greater than 10");
    }

    #[test]
    fn test_validation_error_lists_all_issues() {
        let error = ValidationError::new(vec![
            Issue::new(
                IssueCode::InvalidType {
                    expected: "string",
                    received: ValueType::Number,
                },
                vec!["username".into()],
                Value::from(42),
            ),
            Issue::new(
                IssueCode::InvalidType {
                    expected: "number",
                    received: ValueType::String,
                },
                vec!["xp".into()],
                Value::from("100"),
            ),
        ]);

        let rendered = error.to_string();
        assert!(rendered.contains("1. username:"));
        assert!(rendered.contains("2. xp:"));
    }

    #[test]
    fn test_issue_serializes_with_flattened_code() {
        let issue = Issue::new(
            IssueCode::InvalidString {
                format: "email".to_string(),
            },
            vec!["contact".into()],
            Value::from("nope"),
        );
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["code"], "invalid_string");
        assert_eq!(json["format"], "email");
        assert_eq!(json["path"][0], "contact");
    }
}
