//! Composable schema validation and transformation.
//!
//! Zodiac validates dynamically typed values against immutable schema
//! trees, collecting every failure as a structured, path-addressed issue,
//! and optionally transforming the value along the way.
//!
//! # Quick start
//!
//! ```rust
//! use zodiac::{object, string, number};
//!
//! let user = object([
//!     ("username", string().min_length(3).max_length(20)),
//!     ("email", string().email()),
//!     ("xp", number().int().nonnegative()),
//! ]);
//!
//! let ok = user.parse(serde_json::json!({
//!     "username": "billie",
//!     "email": "billie@example.com",
//!     "xp": 420,
//! }));
//! assert!(ok.is_ok());
//!
//! let err = user.parse(serde_json::json!({
//!     "username": "x",
//!     "email": "not-an-email",
//!     "xp": -1,
//! })).unwrap_err();
//! assert_eq!(err.issues().len(), 3);
//! assert_eq!(err.issues()[0].path_string(), "username");
//! ```
//!
//! # Building blocks
//!
//! - Constructors: [`string`], [`number`], [`boolean`], [`bigint`],
//!   [`date`], [`literal`], [`enumeration`], [`object`], [`array`],
//!   [`tuple`], [`record`], [`map`], [`set`], [`union`],
//!   [`discriminated_union`], [`intersection`], [`lazy`], plus the
//!   sentinels [`null`], [`undefined`], [`any`], [`unknown`], [`never`].
//! - Checks and modifiers chain off [`Schema`]: bounds, string formats,
//!   `optional`/`nullable`/`default_value`/`catch`, `pipe`, and custom
//!   `refine`/`transform` closures, including async variants driven
//!   through [`Schema::parse_async`].
//! - Coercing constructors live in [`coerce`].
//!
//! Schemas are immutable: every builder call returns a new node with a
//! fresh [`SchemaId`], so shared subtrees are never affected by later
//! composition.

pub mod coerce;
mod context;
pub mod formats;
mod issue;
mod parse;
mod schema;
mod value;

pub use context::EffectContext;
pub use issue::{Issue, IssueCode, PathSegment, ValidationError};
pub use parse::SafeParseResult;
pub use schema::checks::{Check, CheckKind};
pub use schema::{
    any, array, bigint, boolean, date, discriminated_union, enumeration, intersection, lazy,
    literal, map, never, null, number, object, record, set, string, tuple, undefined, union,
    Schema, SchemaId,
};
pub use value::{Value, ValueType};
