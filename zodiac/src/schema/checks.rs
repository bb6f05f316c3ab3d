//! Built-in checks: bounds, formats, and string rewrites.
//!
//! A check is a predicate plus the metadata needed to build its issue. On
//! nodes with a base type test it runs after that test and before
//! structural recursion; on kinds without one (wrappers, combinators,
//! `any`, literals) it runs in the finish stage, once the staged value
//! exists. Attachment order is preserved either way. Checks are
//! continuable by default; an abort-marked check stops the rest of its
//! own node's pipeline on failure.

use crate::context::ParseContext;
use crate::issue::IssueCode;
use crate::value::{Value, ValueType};
use crate::formats;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::net::IpAddr;

/// One attached check.
#[derive(Debug, Clone)]
pub struct Check {
    kind: CheckKind,
    message: Option<String>,
    abort: bool,
}

/// The built-in check vocabulary.
///
/// Bound checks observe only values of their shape: a string-length check
/// on a number is a no-op, since the builder surface is untyped and the
/// base type test has already classified the value.
#[derive(Debug, Clone)]
pub enum CheckKind {
    // String length and content
    MinLength(usize),
    MaxLength(usize),
    Length(usize),
    Pattern(Regex),
    Email,
    Url,
    Uuid,
    Datetime,
    Ip,
    StartsWith(String),
    EndsWith(String),
    Includes(String),

    // String rewrites; later checks observe the rewritten value
    Trim,
    ToLowerCase,
    ToUpperCase,

    // Numeric bounds (numbers and bigints)
    Min { value: f64, inclusive: bool },
    Max { value: f64, inclusive: bool },
    Int,
    Finite,
    MultipleOf(f64),

    // Date bounds
    DateMin(DateTime<Utc>),
    DateMax(DateTime<Utc>),

    // Collection sizes (arrays and sets)
    MinItems(usize),
    MaxItems(usize),
    LenItems(usize),
}

impl Check {
    pub(crate) fn new(kind: CheckKind) -> Self {
        Self {
            kind,
            message: None,
            abort: false,
        }
    }

    pub(crate) fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    pub(crate) fn set_abort(&mut self) {
        self.abort = true;
    }

    /// The check's description, for external tree walkers.
    pub fn kind(&self) -> &CheckKind {
        &self.kind
    }

    pub(crate) fn aborts(&self) -> bool {
        self.abort
    }

    /// Run the check, recording an issue on failure. Returns whether the
    /// value passed. Rewrite checks mutate the value in place and always
    /// pass.
    pub(crate) fn run(&self, value: &mut Value, ctx: &mut ParseContext) -> bool {
        let failure = self.evaluate(value);
        match failure {
            None => true,
            Some(code) => {
                ctx.add_issue_with_message(code, value.clone(), self.message.clone());
                false
            }
        }
    }

    fn evaluate(&self, value: &mut Value) -> Option<IssueCode> {
        let shape = value.value_type();
        match (&self.kind, &mut *value) {
            (CheckKind::MinLength(min), Value::String(s)) => {
                bound_min(s.chars().count() as f64, *min as f64, true, ValueType::String)
            }
            (CheckKind::MaxLength(max), Value::String(s)) => {
                bound_max(s.chars().count() as f64, *max as f64, true, ValueType::String)
            }
            (CheckKind::Length(len), Value::String(s)) => {
                let count = s.chars().count();
                if count < *len {
                    bound_min(count as f64, *len as f64, true, ValueType::String)
                } else if count > *len {
                    bound_max(count as f64, *len as f64, true, ValueType::String)
                } else {
                    None
                }
            }
            (CheckKind::Pattern(re), Value::String(s)) => (!re.is_match(s)).then(|| {
                IssueCode::InvalidString {
                    format: format!("string matching {}", re.as_str()),
                }
            }),
            (CheckKind::Email, Value::String(s)) => format_issue(formats::email().is_match(s), "email"),
            (CheckKind::Url, Value::String(s)) => format_issue(formats::url().is_match(s), "url"),
            (CheckKind::Uuid, Value::String(s)) => format_issue(formats::uuid().is_match(s), "uuid"),
            (CheckKind::Datetime, Value::String(s)) => {
                format_issue(formats::datetime().is_match(s), "datetime")
            }
            (CheckKind::Ip, Value::String(s)) => format_issue(s.parse::<IpAddr>().is_ok(), "ip"),
            (CheckKind::StartsWith(prefix), Value::String(s)) => {
                format_issue(s.starts_with(prefix.as_str()), &format!("string starting with \"{prefix}\""))
            }
            (CheckKind::EndsWith(suffix), Value::String(s)) => {
                format_issue(s.ends_with(suffix.as_str()), &format!("string ending with \"{suffix}\""))
            }
            (CheckKind::Includes(needle), Value::String(s)) => {
                format_issue(s.contains(needle.as_str()), &format!("string including \"{needle}\""))
            }

            (CheckKind::Trim, Value::String(s)) => {
                *s = s.trim().to_string();
                None
            }
            (CheckKind::ToLowerCase, Value::String(s)) => {
                *s = s.to_lowercase();
                None
            }
            (CheckKind::ToUpperCase, Value::String(s)) => {
                *s = s.to_uppercase();
                None
            }

            (CheckKind::Min { value: min, inclusive }, Value::Number(n)) => {
                bound_min(*n, *min, *inclusive, ValueType::Number)
            }
            (CheckKind::Max { value: max, inclusive }, Value::Number(n)) => {
                bound_max(*n, *max, *inclusive, ValueType::Number)
            }
            (CheckKind::Min { value: min, inclusive }, Value::BigInt(n)) => {
                bound_min(*n as f64, *min, *inclusive, ValueType::BigInt)
            }
            (CheckKind::Max { value: max, inclusive }, Value::BigInt(n)) => {
                bound_max(*n as f64, *max, *inclusive, ValueType::BigInt)
            }
            (CheckKind::Int, Value::Number(n)) => (n.fract() != 0.0 || !n.is_finite()).then_some(
                IssueCode::InvalidType {
                    expected: "integer",
                    received: ValueType::Number,
                },
            ),
            (CheckKind::Finite, Value::Number(n)) => (!n.is_finite()).then_some(IssueCode::NotFinite),
            (CheckKind::MultipleOf(step), Value::Number(n)) => {
                ((*n % *step).abs() > f64::EPSILON).then_some(IssueCode::NotMultipleOf {
                    multiple_of: *step,
                })
            }
            (CheckKind::MultipleOf(step), Value::BigInt(n)) => {
                let step = *step as i64;
                (step != 0 && n.rem_euclid(step) != 0).then_some(IssueCode::NotMultipleOf {
                    multiple_of: step as f64,
                })
            }

            (CheckKind::DateMin(min), Value::Date(d)) => bound_min(
                d.timestamp_millis() as f64,
                min.timestamp_millis() as f64,
                true,
                ValueType::Date,
            ),
            (CheckKind::DateMax(max), Value::Date(d)) => bound_max(
                d.timestamp_millis() as f64,
                max.timestamp_millis() as f64,
                true,
                ValueType::Date,
            ),

            (CheckKind::MinItems(min), Value::Array(items))
            | (CheckKind::MinItems(min), Value::Set(items)) => {
                bound_min(items.len() as f64, *min as f64, true, shape)
            }
            (CheckKind::MaxItems(max), Value::Array(items))
            | (CheckKind::MaxItems(max), Value::Set(items)) => {
                bound_max(items.len() as f64, *max as f64, true, shape)
            }
            (CheckKind::LenItems(len), Value::Array(items))
            | (CheckKind::LenItems(len), Value::Set(items)) => {
                let count = items.len();
                if count < *len {
                    bound_min(count as f64, *len as f64, true, ValueType::Array)
                } else if count > *len {
                    bound_max(count as f64, *len as f64, true, ValueType::Array)
                } else {
                    None
                }
            }

            // Shape mismatch: not this check's concern.
            _ => None,
        }
    }
}

fn format_issue(passed: bool, format: &str) -> Option<IssueCode> {
    (!passed).then(|| IssueCode::InvalidString {
        format: format.to_string(),
    })
}

fn bound_min(actual: f64, minimum: f64, inclusive: bool, origin: ValueType) -> Option<IssueCode> {
    let ok = if inclusive {
        actual >= minimum
    } else {
        actual > minimum
    };
    (!ok).then_some(IssueCode::TooSmall {
        minimum,
        inclusive,
        origin,
    })
}

fn bound_max(actual: f64, maximum: f64, inclusive: bool, origin: ValueType) -> Option<IssueCode> {
    let ok = if inclusive {
        actual <= maximum
    } else {
        actual < maximum
    };
    (!ok).then_some(IssueCode::TooBig {
        maximum,
        inclusive,
        origin,
    })
}
