//! Schema nodes: immutable, composable descriptions of validation and
//! transformation steps.
//!
//! A [`Schema`] is a cheap-clone handle to an immutable node. Every builder
//! method consumes the handle and returns a *new* node; nothing is mutated
//! after construction, so schema trees are safe to share and reuse across
//! any number of simultaneous parse calls.
//!
//! ## Quick start
//!
//! ```rust
//! use zodiac::{object, string, number};
//!
//! let user = object([
//!     ("username", string().min_length(3)),
//!     ("xp", number().nonnegative()),
//! ]);
//!
//! let parsed = user.parse(serde_json::json!({ "username": "billie", "xp": 100 }));
//! assert!(parsed.is_ok());
//! ```

pub mod checks;
pub(crate) mod effects;
mod exec;

use crate::coerce::CoerceTo;
use crate::context::EffectContext;
use crate::issue::ValidationError;
use crate::value::Value;
use checks::{Check, CheckKind};
use chrono::{DateTime, Utc};
use effects::{Effect, RefineRun, Refinement, Transform};
use futures::future::BoxFuture;
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Stable identity of one schema node instance.
///
/// Every composition step mints a fresh id, so an external registry can
/// attach metadata to "this exact node" without the engine knowing what
/// that metadata is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(u64);

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> SchemaId {
    SchemaId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

/// An immutable validation/transformation step, composable into a tree.
#[derive(Clone)]
pub struct Schema {
    pub(crate) node: Arc<Node>,
}

pub(crate) struct Node {
    pub(crate) id: SchemaId,
    pub(crate) kind: SchemaKind,
    pub(crate) effects: Vec<Effect>,
    pub(crate) coerce: Option<CoerceTo>,
    pub(crate) is_async: bool,
    pub(crate) has_lazy: bool,
}

/// Unknown-key handling for object schemas.
#[derive(Clone)]
pub(crate) enum UnknownKeyPolicy {
    /// Unknown keys are dropped from the output (the default).
    Strip,
    /// Any unknown key is an issue.
    Strict,
    /// Unknown keys pass through unchanged.
    Loose,
    /// Unknown keys are validated against a catchall schema.
    Catchall(Schema),
}

/// Fallback carried by a `catch` wrapper.
#[derive(Clone)]
pub(crate) enum CatchFallback {
    Value(Value),
    Computed(Arc<dyn Fn(&ValidationError) -> Value + Send + Sync>),
}

/// Hashable discriminator value for O(1) dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum DiscriminantKey {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl DiscriminantKey {
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(DiscriminantKey::Str(s.clone())),
            Value::Bool(b) => Some(DiscriminantKey::Bool(*b)),
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() => {
                Some(DiscriminantKey::Int(*n as i64))
            }
            Value::BigInt(n) => Some(DiscriminantKey::Int(*n)),
            _ => None,
        }
    }

    pub(crate) fn display(&self) -> String {
        match self {
            DiscriminantKey::Str(s) => s.clone(),
            DiscriminantKey::Int(n) => n.to_string(),
            DiscriminantKey::Bool(b) => b.to_string(),
        }
    }
}

/// Deferred schema for recursive structures; resolved once on first use.
#[derive(Clone)]
pub(crate) struct LazySchema {
    thunk: Arc<dyn Fn() -> Schema + Send + Sync>,
    cell: Arc<OnceCell<Schema>>,
}

impl LazySchema {
    pub(crate) fn resolve(&self) -> &Schema {
        self.cell.get_or_init(|| (self.thunk)())
    }
}

#[derive(Clone)]
pub(crate) enum SchemaKind {
    // Primitives
    String,
    Number,
    Boolean,
    BigInt,
    Date,
    Literal(Value),
    Enum(Vec<String>),
    Null,
    Undefined,
    Any,
    Unknown,
    Never,

    // Composites
    Object {
        fields: IndexMap<String, Schema>,
        policy: UnknownKeyPolicy,
    },
    Array(Schema),
    Tuple {
        items: Vec<Schema>,
        rest: Option<Schema>,
    },
    Record {
        key: Schema,
        value: Schema,
    },
    Map {
        key: Schema,
        value: Schema,
    },
    Set(Schema),
    Union(Vec<Schema>),
    DiscriminatedUnion {
        discriminator: String,
        branches: Vec<Schema>,
        table: HashMap<DiscriminantKey, usize>,
    },
    Intersection(Schema, Schema),

    // Modifiers
    Optional(Schema),
    Nullable(Schema),
    DefaultValue {
        inner: Schema,
        value: Value,
    },
    Prefault {
        inner: Schema,
        value: Value,
    },
    Catch {
        inner: Schema,
        fallback: CatchFallback,
    },
    Readonly(Schema),
    Pipe(Schema, Schema),
    Lazy(LazySchema),
}

impl SchemaKind {
    fn children(&self) -> Vec<&Schema> {
        match self {
            SchemaKind::Object { fields, policy } => {
                let mut out: Vec<&Schema> = fields.values().collect();
                if let UnknownKeyPolicy::Catchall(catchall) = policy {
                    out.push(catchall);
                }
                out
            }
            SchemaKind::Array(elem) | SchemaKind::Set(elem) => vec![elem],
            SchemaKind::Tuple { items, rest } => {
                let mut out: Vec<&Schema> = items.iter().collect();
                if let Some(rest) = rest {
                    out.push(rest);
                }
                out
            }
            SchemaKind::Record { key, value } | SchemaKind::Map { key, value } => {
                vec![key, value]
            }
            SchemaKind::Union(branches) => branches.iter().collect(),
            SchemaKind::DiscriminatedUnion { branches, .. } => branches.iter().collect(),
            SchemaKind::Intersection(a, b) | SchemaKind::Pipe(a, b) => vec![a, b],
            SchemaKind::Optional(inner)
            | SchemaKind::Nullable(inner)
            | SchemaKind::Readonly(inner)
            | SchemaKind::DefaultValue { inner, .. }
            | SchemaKind::Prefault { inner, .. }
            | SchemaKind::Catch { inner, .. } => vec![inner],
            // A lazy child is opaque until resolved.
            SchemaKind::Lazy(_) => Vec::new(),
            _ => Vec::new(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            SchemaKind::String => "string",
            SchemaKind::Number => "number",
            SchemaKind::Boolean => "boolean",
            SchemaKind::BigInt => "bigint",
            SchemaKind::Date => "date",
            SchemaKind::Literal(_) => "literal",
            SchemaKind::Enum(_) => "enum",
            SchemaKind::Null => "null",
            SchemaKind::Undefined => "undefined",
            SchemaKind::Any => "any",
            SchemaKind::Unknown => "unknown",
            SchemaKind::Never => "never",
            SchemaKind::Object { .. } => "object",
            SchemaKind::Array(_) => "array",
            SchemaKind::Tuple { .. } => "tuple",
            SchemaKind::Record { .. } => "record",
            SchemaKind::Map { .. } => "map",
            SchemaKind::Set(_) => "set",
            SchemaKind::Union(_) => "union",
            SchemaKind::DiscriminatedUnion { .. } => "discriminated_union",
            SchemaKind::Intersection(..) => "intersection",
            SchemaKind::Optional(_) => "optional",
            SchemaKind::Nullable(_) => "nullable",
            SchemaKind::DefaultValue { .. } => "default",
            SchemaKind::Prefault { .. } => "prefault",
            SchemaKind::Catch { .. } => "catch",
            SchemaKind::Readonly(_) => "readonly",
            SchemaKind::Pipe(..) => "pipe",
            SchemaKind::Lazy(_) => "lazy",
        }
    }
}

impl Schema {
    pub(crate) fn from_kind(kind: SchemaKind) -> Self {
        Self::build(kind, Vec::new(), None)
    }

    pub(crate) fn build(kind: SchemaKind, effects: Vec<Effect>, coerce: Option<CoerceTo>) -> Self {
        let children = kind.children();
        let is_async =
            effects.iter().any(Effect::is_async) || children.iter().any(|c| c.node.is_async);
        let has_lazy = matches!(kind, SchemaKind::Lazy(_))
            || children.iter().any(|c| c.node.has_lazy);
        Schema {
            node: Arc::new(Node {
                id: next_id(),
                kind,
                effects,
                coerce,
                is_async,
                has_lazy,
            }),
        }
    }

    fn with_effect(self, effect: Effect) -> Self {
        let mut effects = self.node.effects.clone();
        effects.push(effect);
        Schema::build(self.node.kind.clone(), effects, self.node.coerce)
    }

    fn with_check(self, kind: CheckKind) -> Self {
        self.with_effect(Effect::Check(Check::new(kind)))
    }

    // =========================================================================
    // Identity and introspection
    // =========================================================================

    /// Stable identity of this node instance.
    pub fn id(&self) -> SchemaId {
        self.node.id
    }

    /// The node's variant discriminant, for external tree walkers.
    pub fn type_name(&self) -> &'static str {
        self.node.kind.type_name()
    }

    /// Direct child nodes, in declaration order.
    pub fn children(&self) -> Vec<&Schema> {
        self.node.kind.children()
    }

    /// Attached built-in checks, in attachment order.
    pub fn checks(&self) -> Vec<&Check> {
        self.node
            .effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Check(check) => Some(check),
                _ => None,
            })
            .collect()
    }

    /// Whether any node or effect in this tree requires asynchronous
    /// execution.
    pub fn is_async(&self) -> bool {
        self.node.is_async
    }

    /// Field names and schemas, if this is an object schema.
    pub fn object_fields(&self) -> Option<Vec<(&str, &Schema)>> {
        match &self.node.kind {
            SchemaKind::Object { fields, .. } => {
                Some(fields.iter().map(|(k, v)| (k.as_str(), v)).collect())
            }
            _ => None,
        }
    }

    /// The unknown-key policy name, if this is an object schema.
    pub fn unknown_key_policy(&self) -> Option<&'static str> {
        match &self.node.kind {
            SchemaKind::Object { policy, .. } => Some(match policy {
                UnknownKeyPolicy::Strip => "strip",
                UnknownKeyPolicy::Strict => "strict",
                UnknownKeyPolicy::Loose => "loose",
                UnknownKeyPolicy::Catchall(_) => "catchall",
            }),
            _ => None,
        }
    }

    /// The discriminator field name, if this is a discriminated union.
    pub fn discriminator(&self) -> Option<&str> {
        match &self.node.kind {
            SchemaKind::DiscriminatedUnion { discriminator, .. } => Some(discriminator),
            _ => None,
        }
    }

    /// The required literal, if this is a literal schema.
    pub fn literal_value(&self) -> Option<&Value> {
        match &self.node.kind {
            SchemaKind::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// The allowed options, if this is an enum schema.
    pub fn enum_options(&self) -> Option<&[String]> {
        match &self.node.kind {
            SchemaKind::Enum(options) => Some(options),
            _ => None,
        }
    }

    // =========================================================================
    // String checks
    // =========================================================================

    /// Require at least `min` characters.
    pub fn min_length(self, min: usize) -> Self {
        self.with_check(CheckKind::MinLength(min))
    }

    /// Require at most `max` characters.
    pub fn max_length(self, max: usize) -> Self {
        self.with_check(CheckKind::MaxLength(max))
    }

    /// Require exactly `len` characters.
    pub fn length(self, len: usize) -> Self {
        self.with_check(CheckKind::Length(len))
    }

    /// Require the string to match a regex pattern.
    ///
    /// # Panics
    ///
    /// Panics if the pattern does not compile; a malformed pattern is a bug
    /// in the schema definition, not a data error.
    pub fn regex(self, pattern: &str) -> Self {
        let compiled = match Regex::new(pattern) {
            Ok(re) => re,
            Err(err) => panic!("invalid regex pattern {pattern:?}: {err}"),
        };
        self.with_check(CheckKind::Pattern(compiled))
    }

    /// Require an email-shaped string.
    pub fn email(self) -> Self {
        self.with_check(CheckKind::Email)
    }

    /// Require a URL-shaped string.
    pub fn url(self) -> Self {
        self.with_check(CheckKind::Url)
    }

    /// Require a UUID-shaped string.
    pub fn uuid(self) -> Self {
        self.with_check(CheckKind::Uuid)
    }

    /// Require an RFC 3339 datetime string.
    pub fn datetime(self) -> Self {
        self.with_check(CheckKind::Datetime)
    }

    /// Require an IPv4 or IPv6 address string.
    pub fn ip(self) -> Self {
        self.with_check(CheckKind::Ip)
    }

    /// Require the string to start with a prefix.
    pub fn starts_with(self, prefix: impl Into<String>) -> Self {
        self.with_check(CheckKind::StartsWith(prefix.into()))
    }

    /// Require the string to end with a suffix.
    pub fn ends_with(self, suffix: impl Into<String>) -> Self {
        self.with_check(CheckKind::EndsWith(suffix.into()))
    }

    /// Require the string to contain a substring.
    pub fn includes(self, needle: impl Into<String>) -> Self {
        self.with_check(CheckKind::Includes(needle.into()))
    }

    /// Trim surrounding whitespace; later checks observe the trimmed value.
    pub fn trim(self) -> Self {
        self.with_check(CheckKind::Trim)
    }

    /// Lowercase the string in place.
    pub fn to_lowercase(self) -> Self {
        self.with_check(CheckKind::ToLowerCase)
    }

    /// Uppercase the string in place.
    pub fn to_uppercase(self) -> Self {
        self.with_check(CheckKind::ToUpperCase)
    }

    // =========================================================================
    // Numeric and date checks
    // =========================================================================

    /// Require `>= min` (numbers and bigints).
    pub fn min(self, min: f64) -> Self {
        self.with_check(CheckKind::Min {
            value: min,
            inclusive: true,
        })
    }

    /// Require `<= max` (numbers and bigints).
    pub fn max(self, max: f64) -> Self {
        self.with_check(CheckKind::Max {
            value: max,
            inclusive: true,
        })
    }

    /// Require `> bound`.
    pub fn gt(self, bound: f64) -> Self {
        self.with_check(CheckKind::Min {
            value: bound,
            inclusive: false,
        })
    }

    /// Require `< bound`.
    pub fn lt(self, bound: f64) -> Self {
        self.with_check(CheckKind::Max {
            value: bound,
            inclusive: false,
        })
    }

    /// Require an integral number.
    pub fn int(self) -> Self {
        self.with_check(CheckKind::Int)
    }

    /// Reject NaN and infinities.
    pub fn finite(self) -> Self {
        self.with_check(CheckKind::Finite)
    }

    /// Require `> 0`.
    pub fn positive(self) -> Self {
        self.gt(0.0)
    }

    /// Require `< 0`.
    pub fn negative(self) -> Self {
        self.lt(0.0)
    }

    /// Require `>= 0`.
    pub fn nonnegative(self) -> Self {
        self.min(0.0)
    }

    /// Require `<= 0`.
    pub fn nonpositive(self) -> Self {
        self.max(0.0)
    }

    /// Require the number to be a multiple of `step`.
    ///
    /// # Panics
    ///
    /// Panics if `step` is zero or non-finite; a degenerate step is a bug
    /// in the schema definition, not a data error.
    pub fn multiple_of(self, step: f64) -> Self {
        if step == 0.0 || !step.is_finite() {
            panic!("invalid multiple_of step {step:?}: step must be nonzero and finite");
        }
        self.with_check(CheckKind::MultipleOf(step))
    }

    /// Require the date to be at or after `min`.
    pub fn min_date(self, min: DateTime<Utc>) -> Self {
        self.with_check(CheckKind::DateMin(min))
    }

    /// Require the date to be at or before `max`.
    pub fn max_date(self, max: DateTime<Utc>) -> Self {
        self.with_check(CheckKind::DateMax(max))
    }

    // =========================================================================
    // Collection checks
    // =========================================================================

    /// Require at least `min` elements (arrays and sets). Size checks run
    /// before element-wise validation.
    pub fn min_items(self, min: usize) -> Self {
        self.with_check(CheckKind::MinItems(min))
    }

    /// Require at most `max` elements.
    pub fn max_items(self, max: usize) -> Self {
        self.with_check(CheckKind::MaxItems(max))
    }

    /// Require exactly `len` elements.
    pub fn len_items(self, len: usize) -> Self {
        self.with_check(CheckKind::LenItems(len))
    }

    /// Require at least one element.
    pub fn nonempty(self) -> Self {
        self.min_items(1)
    }

    // =========================================================================
    // Check metadata
    // =========================================================================

    /// Override the message of the most recently attached check or
    /// refinement.
    ///
    /// # Panics
    ///
    /// Panics if no check or refinement has been attached yet.
    pub fn with_message(self, message: impl Into<String>) -> Self {
        let mut effects = self.node.effects.clone();
        match effects.last_mut() {
            Some(Effect::Check(check)) => check.set_message(message),
            Some(Effect::Refine(refinement)) => refinement.message = Some(message.into()),
            _ => panic!("with_message() requires a preceding check or refinement"),
        }
        Schema::build(self.node.kind.clone(), effects, self.node.coerce)
    }

    /// Mark the most recently attached check or refinement non-continuable:
    /// on failure, the rest of this node's pipeline is skipped. Sibling
    /// nodes elsewhere in the tree are unaffected.
    ///
    /// # Panics
    ///
    /// Panics if no check or refinement has been attached yet.
    pub fn abort(self) -> Self {
        let mut effects = self.node.effects.clone();
        match effects.last_mut() {
            Some(Effect::Check(check)) => check.set_abort(),
            Some(Effect::Refine(refinement)) => refinement.abort = true,
            _ => panic!("abort() requires a preceding check or refinement"),
        }
        Schema::build(self.node.kind.clone(), effects, self.node.coerce)
    }

    // =========================================================================
    // Refinements and transforms
    // =========================================================================

    /// Attach a custom predicate; a false return records one issue with the
    /// given message. The predicate must not panic for expected failures.
    pub fn refine(
        self,
        message: impl Into<String>,
        predicate: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.with_effect(Effect::Refine(Refinement {
            run: RefineRun::Predicate(Arc::new(predicate)),
            message: Some(message.into()),
            abort: false,
            when: None,
        }))
    }

    /// Like [`refine`](Schema::refine), but a failure also skips the rest of
    /// this node's pipeline.
    pub fn refine_abort(
        self,
        message: impl Into<String>,
        predicate: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.with_effect(Effect::Refine(Refinement {
            run: RefineRun::Predicate(Arc::new(predicate)),
            message: Some(message.into()),
            abort: true,
            when: None,
        }))
    }

    /// Like [`refine`](Schema::refine), but gated by a readiness predicate
    /// instead of the node's abort flag: the refinement runs whenever
    /// `ready` accepts the staged value, even after an earlier abort on
    /// this node, and is skipped whenever `ready` rejects it.
    pub fn refine_when(
        self,
        ready: impl Fn(&Value) -> bool + Send + Sync + 'static,
        message: impl Into<String>,
        predicate: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.with_effect(Effect::Refine(Refinement {
            run: RefineRun::Predicate(Arc::new(predicate)),
            message: Some(message.into()),
            abort: false,
            when: Some(Arc::new(ready)),
        }))
    }

    /// Attach an asynchronous predicate. Marks the tree async: it must be
    /// driven through [`parse_async`](Schema::parse_async).
    pub fn refine_async(
        self,
        message: impl Into<String>,
        predicate: impl Fn(Value) -> BoxFuture<'static, bool> + Send + Sync + 'static,
    ) -> Self {
        self.with_effect(Effect::Refine(Refinement {
            run: RefineRun::PredicateAsync(Arc::new(predicate)),
            message: Some(message.into()),
            abort: false,
            when: None,
        }))
    }

    /// Attach a rich refinement that may report multiple issues, override
    /// paths, and pick issue codes through the [`EffectContext`].
    pub fn super_refine(
        self,
        refine: impl Fn(&Value, &mut EffectContext) + Send + Sync + 'static,
    ) -> Self {
        self.with_effect(Effect::Refine(Refinement {
            run: RefineRun::Rich(Arc::new(refine)),
            message: None,
            abort: false,
            when: None,
        }))
    }

    /// Asynchronous rich refinement.
    pub fn super_refine_async(
        self,
        refine: impl Fn(Value, EffectContext) -> BoxFuture<'static, EffectContext>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.with_effect(Effect::Refine(Refinement {
            run: RefineRun::RichAsync(Arc::new(refine)),
            message: None,
            abort: false,
            when: None,
        }))
    }

    /// Map the validated value to a new value. A transform that reports an
    /// issue fails the node regardless of what it returns.
    pub fn transform(
        self,
        transform: impl Fn(Value, &mut EffectContext) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.with_effect(Effect::Transform(Transform::Sync(Arc::new(transform))))
    }

    /// Asynchronous transform.
    pub fn transform_async(
        self,
        transform: impl Fn(Value, EffectContext) -> BoxFuture<'static, (Value, EffectContext)>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.with_effect(Effect::Transform(Transform::Async(Arc::new(transform))))
    }

    // =========================================================================
    // Modifiers
    // =========================================================================

    /// Accept `undefined` in addition to the inner type.
    pub fn optional(self) -> Self {
        Schema::from_kind(SchemaKind::Optional(self))
    }

    /// Accept `null` in addition to the inner type.
    pub fn nullable(self) -> Self {
        Schema::from_kind(SchemaKind::Nullable(self))
    }

    /// Accept both `undefined` and `null`.
    pub fn nullish(self) -> Self {
        self.optional().nullable()
    }

    /// Return `value` when the input is missing, bypassing the inner
    /// pipeline entirely. The value must already be of the output type.
    pub fn default_value(self, value: impl Into<Value>) -> Self {
        let value = value.into();
        Schema::from_kind(SchemaKind::DefaultValue { inner: self, value })
    }

    /// Substitute `value` as *input* when the raw input is missing; the full
    /// pipeline still runs against it.
    pub fn prefault(self, value: impl Into<Value>) -> Self {
        let value = value.into();
        Schema::from_kind(SchemaKind::Prefault { inner: self, value })
    }

    /// Swallow any failure of the inner schema and return `fallback`
    /// instead.
    pub fn catch(self, fallback: impl Into<Value>) -> Self {
        let fallback = CatchFallback::Value(fallback.into());
        Schema::from_kind(SchemaKind::Catch {
            inner: self,
            fallback,
        })
    }

    /// Like [`catch`](Schema::catch), computing the fallback from the
    /// triggering error.
    pub fn catch_with(
        self,
        fallback: impl Fn(&ValidationError) -> Value + Send + Sync + 'static,
    ) -> Self {
        let fallback = CatchFallback::Computed(Arc::new(fallback));
        Schema::from_kind(SchemaKind::Catch {
            inner: self,
            fallback,
        })
    }

    /// Mark the output immutable. Ownership already prevents aliased
    /// mutation of a returned [`Value`], so this is a pass-through at
    /// runtime; the node is kept for introspection and idempotence.
    pub fn readonly(self) -> Self {
        Schema::from_kind(SchemaKind::Readonly(self))
    }

    /// Type-level branding. No runtime representation; returns the schema
    /// unchanged.
    pub fn brand(self) -> Self {
        self
    }

    /// Feed this schema's output into `next`. `next` only runs when this
    /// schema produced a clean value.
    pub fn pipe(self, next: Schema) -> Self {
        Schema::from_kind(SchemaKind::Pipe(self, next))
    }

    // =========================================================================
    // Object and tuple configuration
    // =========================================================================

    /// Reject unknown keys with an `unrecognized_keys` issue.
    ///
    /// # Panics
    ///
    /// Panics when called on a non-object schema.
    pub fn strict(self) -> Self {
        self.with_policy(UnknownKeyPolicy::Strict, "strict()")
    }

    /// Pass unknown keys through into the output unchanged.
    ///
    /// # Panics
    ///
    /// Panics when called on a non-object schema.
    pub fn loose(self) -> Self {
        self.with_policy(UnknownKeyPolicy::Loose, "loose()")
    }

    /// Validate unknown keys against `catchall` instead of stripping them.
    ///
    /// # Panics
    ///
    /// Panics when called on a non-object schema.
    pub fn catchall(self, catchall: Schema) -> Self {
        self.with_policy(UnknownKeyPolicy::Catchall(catchall), "catchall()")
    }

    fn with_policy(self, policy: UnknownKeyPolicy, method: &str) -> Self {
        match &self.node.kind {
            SchemaKind::Object { fields, .. } => Schema::build(
                SchemaKind::Object {
                    fields: fields.clone(),
                    policy,
                },
                self.node.effects.clone(),
                self.node.coerce,
            ),
            _ => panic!("{method} requires an object schema"),
        }
    }

    /// Validate elements beyond the fixed tuple positions against `rest`.
    ///
    /// # Panics
    ///
    /// Panics when called on a non-tuple schema.
    pub fn rest(self, rest: Schema) -> Self {
        match &self.node.kind {
            SchemaKind::Tuple { items, .. } => Schema::build(
                SchemaKind::Tuple {
                    items: items.clone(),
                    rest: Some(rest),
                },
                self.node.effects.clone(),
                self.node.coerce,
            ),
            _ => panic!("rest() requires a tuple schema"),
        }
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("id", &self.node.id)
            .field("type", &self.type_name())
            .finish()
    }
}

// =============================================================================
// Constructors
// =============================================================================

/// A string schema.
pub fn string() -> Schema {
    Schema::from_kind(SchemaKind::String)
}

/// A number schema.
pub fn number() -> Schema {
    Schema::from_kind(SchemaKind::Number)
}

/// A boolean schema.
pub fn boolean() -> Schema {
    Schema::from_kind(SchemaKind::Boolean)
}

/// A bigint schema.
pub fn bigint() -> Schema {
    Schema::from_kind(SchemaKind::BigInt)
}

/// A date schema.
pub fn date() -> Schema {
    Schema::from_kind(SchemaKind::Date)
}

/// A schema accepting exactly one value.
pub fn literal(value: impl Into<Value>) -> Schema {
    Schema::from_kind(SchemaKind::Literal(value.into()))
}

/// A schema accepting one of a fixed set of strings.
pub fn enumeration<S: Into<String>>(options: impl IntoIterator<Item = S>) -> Schema {
    Schema::from_kind(SchemaKind::Enum(
        options.into_iter().map(Into::into).collect(),
    ))
}

/// A schema accepting only `null`.
pub fn null() -> Schema {
    Schema::from_kind(SchemaKind::Null)
}

/// A schema accepting only `undefined`.
pub fn undefined() -> Schema {
    Schema::from_kind(SchemaKind::Undefined)
}

/// A schema accepting anything.
pub fn any() -> Schema {
    Schema::from_kind(SchemaKind::Any)
}

/// A schema accepting anything, typed as unknown.
pub fn unknown() -> Schema {
    Schema::from_kind(SchemaKind::Unknown)
}

/// A schema accepting nothing.
pub fn never() -> Schema {
    Schema::from_kind(SchemaKind::Never)
}

/// An object schema over named fields. Unknown keys are stripped by
/// default; see [`Schema::strict`], [`Schema::loose`], and
/// [`Schema::catchall`].
pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, Schema)>) -> Schema {
    Schema::from_kind(SchemaKind::Object {
        fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        policy: UnknownKeyPolicy::Strip,
    })
}

/// An array schema with one element type.
pub fn array(element: Schema) -> Schema {
    Schema::from_kind(SchemaKind::Array(element))
}

/// A fixed-position tuple schema; see [`Schema::rest`] for a variadic tail.
pub fn tuple(items: impl IntoIterator<Item = Schema>) -> Schema {
    Schema::from_kind(SchemaKind::Tuple {
        items: items.into_iter().collect(),
        rest: None,
    })
}

/// A record schema: an object with validated keys and homogeneous values.
pub fn record(key: Schema, value: Schema) -> Schema {
    Schema::from_kind(SchemaKind::Record { key, value })
}

/// A map schema with arbitrary keys.
pub fn map(key: Schema, value: Schema) -> Schema {
    Schema::from_kind(SchemaKind::Map { key, value })
}

/// A set schema.
pub fn set(element: Schema) -> Schema {
    Schema::from_kind(SchemaKind::Set(element))
}

/// An ordered union: branches are tried in declaration order against a
/// fresh sub-context; the first branch with no issues wins.
pub fn union(branches: impl IntoIterator<Item = Schema>) -> Schema {
    Schema::from_kind(SchemaKind::Union(branches.into_iter().collect()))
}

/// A discriminated union dispatching on one shared object field.
///
/// # Panics
///
/// Panics when a branch is not an object schema, lacks the discriminator
/// field, uses a non-hashable discriminator (e.g. a fractional number), or
/// duplicates another branch's discriminator value. These are schema
/// definition bugs, not data errors.
pub fn discriminated_union(
    discriminator: impl Into<String>,
    branches: impl IntoIterator<Item = Schema>,
) -> Schema {
    let discriminator = discriminator.into();
    let branches: Vec<Schema> = branches.into_iter().collect();
    let mut table: HashMap<DiscriminantKey, usize> = HashMap::new();

    for (index, branch) in branches.iter().enumerate() {
        let fields = match &branch.node.kind {
            SchemaKind::Object { fields, .. } => fields,
            _ => panic!("discriminated_union branch {index} is not an object schema"),
        };
        let field = fields.get(&discriminator).unwrap_or_else(|| {
            panic!("discriminated_union branch {index} lacks discriminator field {discriminator:?}")
        });
        let keys: Vec<DiscriminantKey> = match &field.node.kind {
            SchemaKind::Literal(value) => {
                vec![DiscriminantKey::from_value(value).unwrap_or_else(|| {
                    panic!("discriminated_union branch {index} has a non-hashable discriminator literal")
                })]
            }
            SchemaKind::Enum(options) => options
                .iter()
                .map(|option| DiscriminantKey::Str(option.clone()))
                .collect(),
            _ => panic!(
                "discriminated_union branch {index} discriminator must be a literal or enum"
            ),
        };
        for key in keys {
            if table.insert(key.clone(), index).is_some() {
                panic!(
                    "discriminated_union has duplicate discriminator value {:?}",
                    key.display()
                );
            }
        }
    }

    Schema::from_kind(SchemaKind::DiscriminatedUnion {
        discriminator,
        branches,
        table,
    })
}

/// An intersection: both schemas must accept the input; their outputs are
/// deep-merged.
pub fn intersection(a: Schema, b: Schema) -> Schema {
    Schema::from_kind(SchemaKind::Intersection(a, b))
}

/// A deferred schema for recursive structures. The thunk runs once, on
/// first use.
pub fn lazy(thunk: impl Fn() -> Schema + Send + Sync + 'static) -> Schema {
    Schema::from_kind(SchemaKind::Lazy(LazySchema {
        thunk: Arc::new(thunk),
        cell: Arc::new(OnceCell::new()),
    }))
}
