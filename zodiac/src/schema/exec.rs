//! Schema execution: the recursive walk that validates and transforms.
//!
//! Every node runs the same pipeline: coercion, base type test, attached
//! checks, structural recursion into children, then user refinements and
//! transforms. Checks and children may fail without stopping the walk
//! (issues aggregate), while an abort-marked failure skips the rest of its
//! own node's pipeline. Transforms only run when the node's subtree
//! produced no issues.
//!
//! The walk exists twice, sync and async, sharing the leaf and check
//! logic. The async walk shortcuts to the sync one for any subtree that
//! contains neither async effects nor lazy nodes.

use super::effects::{Effect, RefineRun, Transform};
use super::{CatchFallback, DiscriminantKey, Schema, SchemaKind, UnknownKeyPolicy};
use crate::context::{EffectContext, Parsed, ParseContext};
use crate::issue::{IssueCode, PathSegment, ValidationError};
use crate::value::Value;
use futures::future::{self, BoxFuture};
use indexmap::IndexMap;

const ASYNC_IN_SYNC: &str =
    "asynchronous refinement or transform encountered during synchronous parse; use parse_async";

impl Schema {
    /// Run this node synchronously against `input`.
    ///
    /// # Panics
    ///
    /// Panics when the walk reaches an asynchronous refinement or
    /// transform; callers gate on [`Schema::is_async`], but a lazy node can
    /// hide async work until resolution.
    pub(crate) fn run_sync(&self, input: Value, ctx: &mut ParseContext) -> Parsed {
        let saved = ctx.enter_node();
        let before = ctx.issue_count();

        let input = match self.node.coerce {
            Some(coerce) => coerce.apply(input),
            None => input,
        };

        // A default bypasses the node's whole pipeline, effects included.
        if let SchemaKind::DefaultValue { value, .. } = &self.node.kind {
            if input.is_undefined() {
                ctx.leave_node(saved);
                return Parsed::Valid(value.clone());
            }
        }

        let result = match self.stage_sync(input, ctx) {
            Some(value) => self.finish_sync(value, ctx, before),
            None => Parsed::Invalid,
        };
        ctx.leave_node(saved);
        result
    }

    /// Async twin of [`run_sync`](Schema::run_sync). Purely synchronous
    /// subtrees run inline without allocating intermediate futures.
    pub(crate) fn run_async<'a>(
        &'a self,
        input: Value,
        ctx: &'a mut ParseContext,
    ) -> BoxFuture<'a, Parsed> {
        if !self.node.is_async && !self.node.has_lazy {
            let result = self.run_sync(input, ctx);
            return Box::pin(future::ready(result));
        }
        Box::pin(async move {
            let saved = ctx.enter_node();
            let before = ctx.issue_count();

            let input = match self.node.coerce {
                Some(coerce) => coerce.apply(input),
                None => input,
            };

            if let SchemaKind::DefaultValue { value, .. } = &self.node.kind {
                if input.is_undefined() {
                    ctx.leave_node(saved);
                    return Parsed::Valid(value.clone());
                }
            }

            let result = match self.stage_async(input, ctx).await {
                Some(value) => self.finish_async(value, ctx, before).await,
                None => Parsed::Invalid,
            };
            ctx.leave_node(saved);
            result
        })
    }

    // =========================================================================
    // Stage 1: type test, checks, structural recursion
    // =========================================================================

    /// Returns the structurally validated value, or `None` when the node
    /// hard-stopped (type mismatch or abort). Child failures do not
    /// hard-stop: the assembled value keeps the failing child's raw input
    /// so later refinements can still observe it.
    fn stage_sync(&self, input: Value, ctx: &mut ParseContext) -> Option<Value> {
        match &self.node.kind {
            SchemaKind::String => self.leaf(input, ctx, "string"),
            SchemaKind::Number => self.leaf(input, ctx, "number"),
            SchemaKind::Boolean => self.leaf(input, ctx, "boolean"),
            SchemaKind::BigInt => self.leaf(input, ctx, "bigint"),
            SchemaKind::Date => self.leaf(input, ctx, "date"),
            SchemaKind::Null => self.leaf(input, ctx, "null"),
            SchemaKind::Undefined => self.leaf(input, ctx, "undefined"),
            SchemaKind::Any | SchemaKind::Unknown => Some(input),
            SchemaKind::Never => {
                ctx.add_issue(
                    IssueCode::InvalidType {
                        expected: "never",
                        received: input.value_type(),
                    },
                    input,
                );
                None
            }
            SchemaKind::Literal(expected) => {
                if input == *expected {
                    Some(input)
                } else {
                    ctx.add_issue(
                        IssueCode::InvalidLiteral {
                            expected: expected.clone(),
                        },
                        input,
                    );
                    None
                }
            }
            SchemaKind::Enum(options) => {
                let matched = input
                    .as_str()
                    .is_some_and(|s| options.iter().any(|o| o == s));
                if matched {
                    Some(input)
                } else {
                    ctx.add_issue(
                        IssueCode::InvalidEnumValue {
                            options: options.clone(),
                        },
                        input,
                    );
                    None
                }
            }

            SchemaKind::Object { fields, policy } => {
                let mut value = self.leaf(input, ctx, "object")?;
                let Value::Object(entries) = &mut value else {
                    return Some(value);
                };
                let entries = std::mem::take(entries);

                let mut output: IndexMap<String, Value> = IndexMap::new();
                for (name, field) in fields {
                    let present = entries.contains_key(name);
                    let raw = entries.get(name).cloned().unwrap_or(Value::Undefined);
                    ctx.push_path(PathSegment::Key(name.clone()));
                    let parsed = field.run_sync(raw.clone(), ctx);
                    ctx.pop_path();
                    match parsed {
                        Parsed::Valid(v) => {
                            if present || !v.is_undefined() {
                                output.insert(name.clone(), v);
                            }
                        }
                        Parsed::Invalid => {
                            if present {
                                output.insert(name.clone(), raw);
                            }
                        }
                    }
                }

                let mut unknown: Vec<String> = Vec::new();
                for (key, raw) in &entries {
                    if fields.contains_key(key) {
                        continue;
                    }
                    match policy {
                        UnknownKeyPolicy::Strip => {}
                        UnknownKeyPolicy::Strict => unknown.push(key.clone()),
                        UnknownKeyPolicy::Loose => {
                            output.insert(key.clone(), raw.clone());
                        }
                        UnknownKeyPolicy::Catchall(catchall) => {
                            ctx.push_path(PathSegment::Key(key.clone()));
                            let parsed = catchall.run_sync(raw.clone(), ctx);
                            ctx.pop_path();
                            if let Parsed::Valid(v) = parsed {
                                output.insert(key.clone(), v);
                            } else {
                                output.insert(key.clone(), raw.clone());
                            }
                        }
                    }
                }
                if !unknown.is_empty() {
                    ctx.add_issue(
                        IssueCode::UnrecognizedKeys { keys: unknown },
                        Value::Object(entries),
                    );
                }
                Some(Value::Object(output))
            }

            SchemaKind::Array(element) => {
                let value = self.leaf(input, ctx, "array")?;
                let Value::Array(items) = value else {
                    return Some(value);
                };
                let mut output = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    ctx.push_path(PathSegment::Index(index));
                    let parsed = element.run_sync(item.clone(), ctx);
                    ctx.pop_path();
                    output.push(match parsed {
                        Parsed::Valid(v) => v,
                        Parsed::Invalid => item,
                    });
                }
                Some(Value::Array(output))
            }

            SchemaKind::Tuple { items: slots, rest } => {
                let value = self.leaf(input, ctx, "array")?;
                let Value::Array(items) = value else {
                    return Some(value);
                };
                self.tuple_arity(slots.len(), rest.is_some(), &items, ctx);
                let mut output = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    let slot = slots.get(index).or(rest.as_ref());
                    let Some(slot) = slot else {
                        // Excess element with no rest schema; arity already
                        // reported.
                        output.push(item);
                        continue;
                    };
                    ctx.push_path(PathSegment::Index(index));
                    let parsed = slot.run_sync(item.clone(), ctx);
                    ctx.pop_path();
                    output.push(match parsed {
                        Parsed::Valid(v) => v,
                        Parsed::Invalid => item,
                    });
                }
                Some(Value::Array(output))
            }

            SchemaKind::Record { key, value: val } => {
                let value = self.leaf(input, ctx, "object")?;
                let Value::Object(entries) = value else {
                    return Some(value);
                };
                let mut output: IndexMap<String, Value> = IndexMap::new();
                for (name, raw) in entries {
                    ctx.push_path(PathSegment::Key(name.clone()));
                    let key_parsed = key.run_sync(Value::String(name.clone()), ctx);
                    let val_parsed = val.run_sync(raw.clone(), ctx);
                    ctx.pop_path();
                    let out_key = match key_parsed {
                        Parsed::Valid(Value::String(s)) => s,
                        _ => name,
                    };
                    let out_val = match val_parsed {
                        Parsed::Valid(v) => v,
                        Parsed::Invalid => raw,
                    };
                    output.insert(out_key, out_val);
                }
                Some(Value::Object(output))
            }

            SchemaKind::Map { key, value: val } => {
                let value = self.leaf(input, ctx, "map")?;
                let Value::Map(entries) = value else {
                    return Some(value);
                };
                let mut output = Vec::with_capacity(entries.len());
                for (index, (raw_key, raw_val)) in entries.into_iter().enumerate() {
                    ctx.push_path(map_segment(&raw_key, index));
                    let key_parsed = key.run_sync(raw_key.clone(), ctx);
                    let val_parsed = val.run_sync(raw_val.clone(), ctx);
                    ctx.pop_path();
                    let out_key = match key_parsed {
                        Parsed::Valid(v) => v,
                        Parsed::Invalid => raw_key,
                    };
                    let out_val = match val_parsed {
                        Parsed::Valid(v) => v,
                        Parsed::Invalid => raw_val,
                    };
                    output.push((out_key, out_val));
                }
                Some(Value::Map(output))
            }

            SchemaKind::Set(element) => {
                let value = self.leaf(input, ctx, "set")?;
                let Value::Set(items) = value else {
                    return Some(value);
                };
                let mut output = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    ctx.push_path(PathSegment::Index(index));
                    let parsed = element.run_sync(item.clone(), ctx);
                    ctx.pop_path();
                    output.push(match parsed {
                        Parsed::Valid(v) => v,
                        Parsed::Invalid => item,
                    });
                }
                // Transforms may have collapsed distinct inputs.
                Some(Value::set(output))
            }

            SchemaKind::Union(branches) => {
                let mut branch_issues: Vec<Vec<crate::issue::Issue>> = Vec::new();
                for branch in branches {
                    let mut sub = ParseContext::new();
                    let parsed = branch.run_sync(input.clone(), &mut sub);
                    if let Parsed::Valid(v) = parsed {
                        if sub.issue_count() == 0 {
                            return Some(v);
                        }
                    }
                    branch_issues.push(sub.into_issues());
                }
                ctx.add_issue(IssueCode::InvalidUnion { branch_issues }, input);
                None
            }

            SchemaKind::DiscriminatedUnion {
                discriminator,
                branches,
                table,
            } => {
                let index = self.dispatch(discriminator, table, &input, ctx)?;
                match branches[index].run_sync(input, ctx) {
                    Parsed::Valid(v) => Some(v),
                    Parsed::Invalid => None,
                }
            }

            SchemaKind::Intersection(a, b) => {
                let left = a.run_sync(input.clone(), ctx);
                let right = b.run_sync(input, ctx);
                match (left, right) {
                    (Parsed::Valid(lv), Parsed::Valid(rv)) => merge_values(lv, rv, ctx),
                    _ => None,
                }
            }

            SchemaKind::Optional(inner) => {
                if input.is_undefined() {
                    Some(Value::Undefined)
                } else {
                    match inner.run_sync(input, ctx) {
                        Parsed::Valid(v) => Some(v),
                        Parsed::Invalid => None,
                    }
                }
            }
            SchemaKind::Nullable(inner) => {
                if input.is_null() {
                    Some(Value::Null)
                } else {
                    match inner.run_sync(input, ctx) {
                        Parsed::Valid(v) => Some(v),
                        Parsed::Invalid => None,
                    }
                }
            }
            SchemaKind::DefaultValue { inner, .. } => {
                // The undefined case short-circuited in run_sync.
                match inner.run_sync(input, ctx) {
                    Parsed::Valid(v) => Some(v),
                    Parsed::Invalid => None,
                }
            }
            SchemaKind::Prefault { inner, value } => {
                let input = if input.is_undefined() {
                    value.clone()
                } else {
                    input
                };
                match inner.run_sync(input, ctx) {
                    Parsed::Valid(v) => Some(v),
                    Parsed::Invalid => None,
                }
            }
            SchemaKind::Catch { inner, fallback } => {
                let mut sub = ParseContext::new();
                match inner.run_sync(input, &mut sub) {
                    Parsed::Valid(v) if sub.issue_count() == 0 => Some(v),
                    _ => Some(resolve_fallback(fallback, sub)),
                }
            }
            SchemaKind::Readonly(inner) => match inner.run_sync(input, ctx) {
                Parsed::Valid(v) => Some(v),
                Parsed::Invalid => None,
            },
            SchemaKind::Pipe(a, b) => {
                let first = match a.run_sync(input, ctx) {
                    Parsed::Valid(v) => v,
                    Parsed::Invalid => return None,
                };
                match b.run_sync(first, ctx) {
                    Parsed::Valid(v) => Some(v),
                    Parsed::Invalid => None,
                }
            }
            SchemaKind::Lazy(lazy) => match lazy.resolve().run_sync(input, ctx) {
                Parsed::Valid(v) => Some(v),
                Parsed::Invalid => None,
            },
        }
    }

    async fn stage_async(&self, input: Value, ctx: &mut ParseContext) -> Option<Value> {
        match &self.node.kind {
            SchemaKind::Object { fields, policy } => {
                let mut value = self.leaf(input, ctx, "object")?;
                let Value::Object(entries) = &mut value else {
                    return Some(value);
                };
                let entries = std::mem::take(entries);

                let mut output: IndexMap<String, Value> = IndexMap::new();
                for (name, field) in fields {
                    let present = entries.contains_key(name);
                    let raw = entries.get(name).cloned().unwrap_or(Value::Undefined);
                    ctx.push_path(PathSegment::Key(name.clone()));
                    let parsed = field.run_async(raw.clone(), ctx).await;
                    ctx.pop_path();
                    match parsed {
                        Parsed::Valid(v) => {
                            if present || !v.is_undefined() {
                                output.insert(name.clone(), v);
                            }
                        }
                        Parsed::Invalid => {
                            if present {
                                output.insert(name.clone(), raw);
                            }
                        }
                    }
                }

                let mut unknown: Vec<String> = Vec::new();
                for (key, raw) in &entries {
                    if fields.contains_key(key) {
                        continue;
                    }
                    match policy {
                        UnknownKeyPolicy::Strip => {}
                        UnknownKeyPolicy::Strict => unknown.push(key.clone()),
                        UnknownKeyPolicy::Loose => {
                            output.insert(key.clone(), raw.clone());
                        }
                        UnknownKeyPolicy::Catchall(catchall) => {
                            ctx.push_path(PathSegment::Key(key.clone()));
                            let parsed = catchall.run_async(raw.clone(), ctx).await;
                            ctx.pop_path();
                            if let Parsed::Valid(v) = parsed {
                                output.insert(key.clone(), v);
                            } else {
                                output.insert(key.clone(), raw.clone());
                            }
                        }
                    }
                }
                if !unknown.is_empty() {
                    ctx.add_issue(
                        IssueCode::UnrecognizedKeys { keys: unknown },
                        Value::Object(entries),
                    );
                }
                Some(Value::Object(output))
            }

            SchemaKind::Array(element) => {
                let value = self.leaf(input, ctx, "array")?;
                let Value::Array(items) = value else {
                    return Some(value);
                };
                let mut output = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    ctx.push_path(PathSegment::Index(index));
                    let parsed = element.run_async(item.clone(), ctx).await;
                    ctx.pop_path();
                    output.push(match parsed {
                        Parsed::Valid(v) => v,
                        Parsed::Invalid => item,
                    });
                }
                Some(Value::Array(output))
            }

            SchemaKind::Tuple { items: slots, rest } => {
                let value = self.leaf(input, ctx, "array")?;
                let Value::Array(items) = value else {
                    return Some(value);
                };
                self.tuple_arity(slots.len(), rest.is_some(), &items, ctx);
                let mut output = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    let slot = slots.get(index).or(rest.as_ref());
                    let Some(slot) = slot else {
                        output.push(item);
                        continue;
                    };
                    ctx.push_path(PathSegment::Index(index));
                    let parsed = slot.run_async(item.clone(), ctx).await;
                    ctx.pop_path();
                    output.push(match parsed {
                        Parsed::Valid(v) => v,
                        Parsed::Invalid => item,
                    });
                }
                Some(Value::Array(output))
            }

            SchemaKind::Record { key, value: val } => {
                let value = self.leaf(input, ctx, "object")?;
                let Value::Object(entries) = value else {
                    return Some(value);
                };
                let mut output: IndexMap<String, Value> = IndexMap::new();
                for (name, raw) in entries {
                    ctx.push_path(PathSegment::Key(name.clone()));
                    let key_parsed = key.run_async(Value::String(name.clone()), ctx).await;
                    let val_parsed = val.run_async(raw.clone(), ctx).await;
                    ctx.pop_path();
                    let out_key = match key_parsed {
                        Parsed::Valid(Value::String(s)) => s,
                        _ => name,
                    };
                    let out_val = match val_parsed {
                        Parsed::Valid(v) => v,
                        Parsed::Invalid => raw,
                    };
                    output.insert(out_key, out_val);
                }
                Some(Value::Object(output))
            }

            SchemaKind::Map { key, value: val } => {
                let value = self.leaf(input, ctx, "map")?;
                let Value::Map(entries) = value else {
                    return Some(value);
                };
                let mut output = Vec::with_capacity(entries.len());
                for (index, (raw_key, raw_val)) in entries.into_iter().enumerate() {
                    ctx.push_path(map_segment(&raw_key, index));
                    let key_parsed = key.run_async(raw_key.clone(), ctx).await;
                    let val_parsed = val.run_async(raw_val.clone(), ctx).await;
                    ctx.pop_path();
                    let out_key = match key_parsed {
                        Parsed::Valid(v) => v,
                        Parsed::Invalid => raw_key,
                    };
                    let out_val = match val_parsed {
                        Parsed::Valid(v) => v,
                        Parsed::Invalid => raw_val,
                    };
                    output.push((out_key, out_val));
                }
                Some(Value::Map(output))
            }

            SchemaKind::Set(element) => {
                let value = self.leaf(input, ctx, "set")?;
                let Value::Set(items) = value else {
                    return Some(value);
                };
                let mut output = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    ctx.push_path(PathSegment::Index(index));
                    let parsed = element.run_async(item.clone(), ctx).await;
                    ctx.pop_path();
                    output.push(match parsed {
                        Parsed::Valid(v) => v,
                        Parsed::Invalid => item,
                    });
                }
                Some(Value::set(output))
            }

            SchemaKind::Union(branches) => {
                let mut branch_issues: Vec<Vec<crate::issue::Issue>> = Vec::new();
                for branch in branches {
                    let mut sub = ParseContext::new();
                    let parsed = branch.run_async(input.clone(), &mut sub).await;
                    if let Parsed::Valid(v) = parsed {
                        if sub.issue_count() == 0 {
                            return Some(v);
                        }
                    }
                    branch_issues.push(sub.into_issues());
                }
                ctx.add_issue(IssueCode::InvalidUnion { branch_issues }, input);
                None
            }

            SchemaKind::DiscriminatedUnion {
                discriminator,
                branches,
                table,
            } => {
                let index = self.dispatch(discriminator, table, &input, ctx)?;
                match branches[index].run_async(input, ctx).await {
                    Parsed::Valid(v) => Some(v),
                    Parsed::Invalid => None,
                }
            }

            SchemaKind::Intersection(a, b) => {
                let left = a.run_async(input.clone(), ctx).await;
                let right = b.run_async(input, ctx).await;
                match (left, right) {
                    (Parsed::Valid(lv), Parsed::Valid(rv)) => merge_values(lv, rv, ctx),
                    _ => None,
                }
            }

            SchemaKind::Optional(inner) => {
                if input.is_undefined() {
                    Some(Value::Undefined)
                } else {
                    match inner.run_async(input, ctx).await {
                        Parsed::Valid(v) => Some(v),
                        Parsed::Invalid => None,
                    }
                }
            }
            SchemaKind::Nullable(inner) => {
                if input.is_null() {
                    Some(Value::Null)
                } else {
                    match inner.run_async(input, ctx).await {
                        Parsed::Valid(v) => Some(v),
                        Parsed::Invalid => None,
                    }
                }
            }
            SchemaKind::DefaultValue { inner, .. } => match inner.run_async(input, ctx).await {
                Parsed::Valid(v) => Some(v),
                Parsed::Invalid => None,
            },
            SchemaKind::Prefault { inner, value } => {
                let input = if input.is_undefined() {
                    value.clone()
                } else {
                    input
                };
                match inner.run_async(input, ctx).await {
                    Parsed::Valid(v) => Some(v),
                    Parsed::Invalid => None,
                }
            }
            SchemaKind::Catch { inner, fallback } => {
                let mut sub = ParseContext::new();
                match inner.run_async(input, &mut sub).await {
                    Parsed::Valid(v) if sub.issue_count() == 0 => Some(v),
                    _ => Some(resolve_fallback(fallback, sub)),
                }
            }
            SchemaKind::Readonly(inner) => match inner.run_async(input, ctx).await {
                Parsed::Valid(v) => Some(v),
                Parsed::Invalid => None,
            },
            SchemaKind::Pipe(a, b) => {
                let first = match a.run_async(input, ctx).await {
                    Parsed::Valid(v) => v,
                    Parsed::Invalid => return None,
                };
                match b.run_async(first, ctx).await {
                    Parsed::Valid(v) => Some(v),
                    Parsed::Invalid => None,
                }
            }
            SchemaKind::Lazy(lazy) => {
                match lazy.resolve().run_async(input, ctx).await {
                    Parsed::Valid(v) => Some(v),
                    Parsed::Invalid => None,
                }
            }

            // Leaves carry no children; both walks share one code path.
            _ => self.stage_sync(input, ctx),
        }
    }

    /// Whether this kind runs its checks inside [`leaf`](Schema::leaf).
    /// Every other kind (wrappers, combinators, `any`/`unknown`, literals)
    /// has no base type test, so its checks run in the finish stage
    /// instead, after the staged value exists.
    fn checks_ran_in_stage(&self) -> bool {
        matches!(
            self.node.kind,
            SchemaKind::String
                | SchemaKind::Number
                | SchemaKind::Boolean
                | SchemaKind::BigInt
                | SchemaKind::Date
                | SchemaKind::Null
                | SchemaKind::Undefined
                | SchemaKind::Object { .. }
                | SchemaKind::Record { .. }
                | SchemaKind::Array(_)
                | SchemaKind::Tuple { .. }
                | SchemaKind::Map { .. }
                | SchemaKind::Set(_)
        )
    }

    /// Base type test plus the node's checks, shared by both walks.
    fn leaf(&self, value: Value, ctx: &mut ParseContext, expected: &'static str) -> Option<Value> {
        let ok = match (&self.node.kind, &value) {
            (SchemaKind::String, Value::String(_))
            | (SchemaKind::Number, Value::Number(_))
            | (SchemaKind::Boolean, Value::Bool(_))
            | (SchemaKind::BigInt, Value::BigInt(_))
            | (SchemaKind::Date, Value::Date(_))
            | (SchemaKind::Null, Value::Null)
            | (SchemaKind::Undefined, Value::Undefined)
            | (SchemaKind::Object { .. }, Value::Object(_))
            | (SchemaKind::Record { .. }, Value::Object(_))
            | (SchemaKind::Array(_), Value::Array(_))
            | (SchemaKind::Tuple { .. }, Value::Array(_))
            | (SchemaKind::Map { .. }, Value::Map(_))
            | (SchemaKind::Set(_), Value::Set(_)) => true,
            _ => false,
        };
        if !ok {
            ctx.add_issue(
                IssueCode::InvalidType {
                    expected,
                    received: value.value_type(),
                },
                value,
            );
            return None;
        }

        let mut value = value;
        for effect in &self.node.effects {
            if let Effect::Check(check) = effect {
                let passed = check.run(&mut value, ctx);
                if !passed && check.aborts() {
                    ctx.set_aborted();
                    return None;
                }
            }
        }
        Some(value)
    }

    fn tuple_arity(&self, slots: usize, has_rest: bool, items: &[Value], ctx: &mut ParseContext) {
        if items.len() < slots {
            ctx.add_issue(
                IssueCode::TooSmall {
                    minimum: slots as f64,
                    inclusive: true,
                    origin: crate::value::ValueType::Array,
                },
                Value::Array(items.to_vec()),
            );
        } else if items.len() > slots && !has_rest {
            ctx.add_issue(
                IssueCode::TooBig {
                    maximum: slots as f64,
                    inclusive: true,
                    origin: crate::value::ValueType::Array,
                },
                Value::Array(items.to_vec()),
            );
        }
    }

    /// Discriminator lookup for the dispatch table; a miss records one
    /// issue at the discriminator's path.
    fn dispatch(
        &self,
        discriminator: &str,
        table: &std::collections::HashMap<DiscriminantKey, usize>,
        input: &Value,
        ctx: &mut ParseContext,
    ) -> Option<usize> {
        let Some(entries) = input.as_object() else {
            ctx.add_issue(
                IssueCode::InvalidType {
                    expected: "object",
                    received: input.value_type(),
                },
                input.clone(),
            );
            return None;
        };
        let disc_value = entries.get(discriminator).cloned().unwrap_or(Value::Undefined);
        let hit = DiscriminantKey::from_value(&disc_value).and_then(|key| table.get(&key).copied());
        match hit {
            Some(index) => Some(index),
            None => {
                let mut options: Vec<String> =
                    table.keys().map(DiscriminantKey::display).collect();
                options.sort();
                ctx.push_path(PathSegment::Key(discriminator.to_string()));
                ctx.add_issue(IssueCode::InvalidUnionDiscriminator { options }, disc_value);
                ctx.pop_path();
                None
            }
        }
    }

    // =========================================================================
    // Stage 2: refinements and transforms
    // =========================================================================

    fn finish_sync(&self, mut value: Value, ctx: &mut ParseContext, before: usize) -> Parsed {
        for effect in &self.node.effects {
            match effect {
                Effect::Check(check) => {
                    if self.checks_ran_in_stage() || ctx.aborted() {
                        continue;
                    }
                    let passed = check.run(&mut value, ctx);
                    if !passed && check.aborts() {
                        ctx.set_aborted();
                    }
                }
                Effect::Refine(refinement) => {
                    match &refinement.when {
                        Some(ready) => {
                            if !ready(&value) {
                                continue;
                            }
                        }
                        None => {
                            if ctx.aborted() {
                                continue;
                            }
                        }
                    }
                    let failed = match &refinement.run {
                        RefineRun::Predicate(predicate) => {
                            let failed = !predicate(&value);
                            if failed {
                                ctx.add_issue_with_message(
                                    IssueCode::Custom,
                                    value.clone(),
                                    refinement.message.clone(),
                                );
                            }
                            failed
                        }
                        RefineRun::Rich(rich) => {
                            let mut effect_ctx = EffectContext::new();
                            rich(&value, &mut effect_ctx);
                            apply_raised(ctx, effect_ctx, &value)
                        }
                        RefineRun::PredicateAsync(_) | RefineRun::RichAsync(_) => {
                            panic!("{ASYNC_IN_SYNC}")
                        }
                    };
                    if failed && refinement.abort {
                        ctx.set_aborted();
                    }
                }
                Effect::Transform(transform) => {
                    if ctx.aborted() || ctx.issue_count() > before {
                        continue;
                    }
                    match transform {
                        Transform::Sync(run) => {
                            let mut effect_ctx = EffectContext::new();
                            value = run(value, &mut effect_ctx);
                            apply_raised(ctx, effect_ctx, &value);
                        }
                        Transform::Async(_) => panic!("{ASYNC_IN_SYNC}"),
                    }
                }
            }
        }
        if ctx.aborted() || ctx.issue_count() > before {
            Parsed::Invalid
        } else {
            Parsed::Valid(value)
        }
    }

    async fn finish_async(&self, mut value: Value, ctx: &mut ParseContext, before: usize) -> Parsed {
        for effect in &self.node.effects {
            match effect {
                Effect::Check(check) => {
                    if self.checks_ran_in_stage() || ctx.aborted() {
                        continue;
                    }
                    let passed = check.run(&mut value, ctx);
                    if !passed && check.aborts() {
                        ctx.set_aborted();
                    }
                }
                Effect::Refine(refinement) => {
                    match &refinement.when {
                        Some(ready) => {
                            if !ready(&value) {
                                continue;
                            }
                        }
                        None => {
                            if ctx.aborted() {
                                continue;
                            }
                        }
                    }
                    let failed = match &refinement.run {
                        RefineRun::Predicate(predicate) => {
                            let failed = !predicate(&value);
                            if failed {
                                ctx.add_issue_with_message(
                                    IssueCode::Custom,
                                    value.clone(),
                                    refinement.message.clone(),
                                );
                            }
                            failed
                        }
                        RefineRun::PredicateAsync(predicate) => {
                            let failed = !predicate(value.clone()).await;
                            if failed {
                                ctx.add_issue_with_message(
                                    IssueCode::Custom,
                                    value.clone(),
                                    refinement.message.clone(),
                                );
                            }
                            failed
                        }
                        RefineRun::Rich(rich) => {
                            let mut effect_ctx = EffectContext::new();
                            rich(&value, &mut effect_ctx);
                            apply_raised(ctx, effect_ctx, &value)
                        }
                        RefineRun::RichAsync(rich) => {
                            let effect_ctx = rich(value.clone(), EffectContext::new()).await;
                            apply_raised(ctx, effect_ctx, &value)
                        }
                    };
                    if failed && refinement.abort {
                        ctx.set_aborted();
                    }
                }
                Effect::Transform(transform) => {
                    if ctx.aborted() || ctx.issue_count() > before {
                        continue;
                    }
                    match transform {
                        Transform::Sync(run) => {
                            let mut effect_ctx = EffectContext::new();
                            value = run(value, &mut effect_ctx);
                            apply_raised(ctx, effect_ctx, &value);
                        }
                        Transform::Async(run) => {
                            let (out, effect_ctx) = run(value, EffectContext::new()).await;
                            value = out;
                            apply_raised(ctx, effect_ctx, &value);
                        }
                    }
                }
            }
        }
        if ctx.aborted() || ctx.issue_count() > before {
            Parsed::Invalid
        } else {
            Parsed::Valid(value)
        }
    }
}

/// Returns whether any issue was applied.
fn apply_raised(ctx: &mut ParseContext, effect_ctx: EffectContext, input: &Value) -> bool {
    let raised = effect_ctx.into_raised();
    let failed = !raised.is_empty();
    for issue in raised {
        ctx.add_issue_at(&issue.path, issue.code, input.clone(), issue.message);
    }
    failed
}

fn map_segment(key: &Value, index: usize) -> PathSegment {
    match key {
        Value::String(s) => PathSegment::Key(s.clone()),
        _ => PathSegment::Index(index),
    }
}

fn resolve_fallback(fallback: &CatchFallback, sub: ParseContext) -> Value {
    match fallback {
        CatchFallback::Value(value) => value.clone(),
        CatchFallback::Computed(compute) => {
            compute(&ValidationError::new(sub.into_issues()))
        }
    }
}

/// Deep merge for intersection outputs: objects merge per key, arrays of
/// equal length merge per slot, and anything else must be equal. A
/// conflict records one issue at its location and fails the merge.
fn merge_values(a: Value, b: Value, ctx: &mut ParseContext) -> Option<Value> {
    match (a, b) {
        (Value::Object(ao), Value::Object(bo)) => {
            let mut bo = bo;
            let mut out: IndexMap<String, Value> = IndexMap::with_capacity(ao.len());
            let mut ok = true;
            for (key, av) in ao {
                match bo.shift_remove(&key) {
                    Some(bv) => {
                        ctx.push_path(PathSegment::Key(key.clone()));
                        let merged = merge_values(av, bv, ctx);
                        ctx.pop_path();
                        match merged {
                            Some(v) => {
                                out.insert(key, v);
                            }
                            None => ok = false,
                        }
                    }
                    None => {
                        out.insert(key, av);
                    }
                }
            }
            for (key, bv) in bo {
                out.insert(key, bv);
            }
            ok.then_some(Value::Object(out))
        }
        (Value::Array(av), Value::Array(bv)) if av.len() == bv.len() => {
            let mut out = Vec::with_capacity(av.len());
            let mut ok = true;
            for (index, (ai, bi)) in av.into_iter().zip(bv).enumerate() {
                ctx.push_path(PathSegment::Index(index));
                let merged = merge_values(ai, bi, ctx);
                ctx.pop_path();
                match merged {
                    Some(v) => out.push(v),
                    None => ok = false,
                }
            }
            ok.then_some(Value::Array(out))
        }
        (a, b) => {
            if a == b {
                Some(a)
            } else {
                ctx.add_issue(IssueCode::InvalidIntersection, b);
                None
            }
        }
    }
}
