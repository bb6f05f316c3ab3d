//! Top-level parse drivers.
//!
//! Four entry points cover the sync/async and error-style axes:
//!
//! | | returns the error | carries the error |
//! |---|---|---|
//! | sync | [`Schema::parse`] | [`Schema::safe_parse`] |
//! | async | [`Schema::parse_async`] | [`Schema::safe_parse_async`] |
//!
//! All four share one execution core; a given schema and input produce the
//! same value and the same ordered issue list through any of them.

use crate::context::{Parsed, ParseContext};
use crate::issue::ValidationError;
use crate::schema::Schema;
use crate::value::Value;

/// Non-erroring parse outcome, for call sites that treat failure as data.
#[derive(Debug, Clone)]
pub enum SafeParseResult {
    /// The input validated; `data` is the possibly transformed output.
    Success { data: Value },
    /// The input failed; `error` carries every issue found.
    Failure { error: ValidationError },
}

impl SafeParseResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SafeParseResult::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SafeParseResult::Failure { .. })
    }

    /// The output value, if validation succeeded.
    pub fn data(&self) -> Option<&Value> {
        match self {
            SafeParseResult::Success { data } => Some(data),
            SafeParseResult::Failure { .. } => None,
        }
    }

    /// The error, if validation failed.
    pub fn error(&self) -> Option<&ValidationError> {
        match self {
            SafeParseResult::Success { .. } => None,
            SafeParseResult::Failure { error } => Some(error),
        }
    }

    /// Convert to a plain `Result`.
    pub fn into_result(self) -> Result<Value, ValidationError> {
        match self {
            SafeParseResult::Success { data } => Ok(data),
            SafeParseResult::Failure { error } => Err(error),
        }
    }
}

impl From<Result<Value, ValidationError>> for SafeParseResult {
    fn from(result: Result<Value, ValidationError>) -> Self {
        match result {
            Ok(data) => SafeParseResult::Success { data },
            Err(error) => SafeParseResult::Failure { error },
        }
    }
}

fn settle(parsed: Parsed, ctx: ParseContext) -> Result<Value, ValidationError> {
    match parsed {
        Parsed::Valid(value) => Ok(value),
        Parsed::Invalid => Err(ValidationError::new(ctx.into_issues())),
    }
}

impl Schema {
    /// Validate `input`, returning the output value or the aggregate error.
    ///
    /// # Panics
    ///
    /// Panics when the schema contains asynchronous refinements or
    /// transforms; drive those through [`parse_async`](Schema::parse_async).
    pub fn parse(&self, input: impl Into<Value>) -> Result<Value, ValidationError> {
        if self.is_async() {
            panic!("schema contains asynchronous effects; use parse_async");
        }
        let mut ctx = ParseContext::new();
        let parsed = self.run_sync(input.into(), &mut ctx);
        settle(parsed, ctx)
    }

    /// Validate `input`, packaging success and failure as plain data.
    ///
    /// # Panics
    ///
    /// Same async restriction as [`parse`](Schema::parse).
    pub fn safe_parse(&self, input: impl Into<Value>) -> SafeParseResult {
        self.parse(input).into()
    }

    /// Validate `input`, awaiting any asynchronous refinements and
    /// transforms. Also accepts purely synchronous schemas.
    pub async fn parse_async(&self, input: impl Into<Value>) -> Result<Value, ValidationError> {
        let mut ctx = ParseContext::new();
        let parsed = self.run_async(input.into(), &mut ctx).await;
        settle(parsed, ctx)
    }

    /// Async twin of [`safe_parse`](Schema::safe_parse).
    pub async fn safe_parse_async(&self, input: impl Into<Value>) -> SafeParseResult {
        self.parse_async(input).await.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{number, string};

    #[test]
    fn test_parse_ok_and_err() {
        let schema = string().min_length(2);
        assert_eq!(schema.parse("hi").unwrap(), Value::from("hi"));
        let err = schema.parse("x").unwrap_err();
        assert_eq!(err.issues().len(), 1);
    }

    #[test]
    fn test_safe_parse_mirrors_parse() {
        let schema = number().min(10.0);
        let ok = schema.safe_parse(12);
        assert!(ok.is_success());
        assert_eq!(ok.data(), Some(&Value::from(12)));

        let bad = schema.safe_parse(3);
        assert!(bad.is_failure());
        assert_eq!(bad.error().unwrap().issues().len(), 1);
        assert!(bad.into_result().is_err());
    }

    #[test]
    #[should_panic(expected = "use parse_async")]
    fn test_sync_driver_rejects_async_schema() {
        let schema = string().refine_async("nope", |_| Box::pin(async { true }));
        let _ = schema.parse("value");
    }
}
