//! Refinements and transforms attached to schema nodes.
//!
//! Both run after the base type test and structural recursion, in
//! attachment order. Refinements validate without changing the value;
//! transforms replace it. Either may be asynchronous, which marks the whole
//! tree async bottom-up.
//!
//! Closures signal expected failures through their return value or the
//! [`EffectContext`](crate::EffectContext) — a closure that panics is a
//! bug in the caller's code and propagates out of the parse call untouched.

use crate::context::EffectContext;
use crate::value::Value;
use futures::future::BoxFuture;
use std::sync::Arc;

pub(crate) type SyncPredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
pub(crate) type AsyncPredicate = Arc<dyn Fn(Value) -> BoxFuture<'static, bool> + Send + Sync>;
pub(crate) type SyncRich = Arc<dyn Fn(&Value, &mut EffectContext) + Send + Sync>;
pub(crate) type AsyncRich =
    Arc<dyn Fn(Value, EffectContext) -> BoxFuture<'static, EffectContext> + Send + Sync>;
pub(crate) type SyncTransform = Arc<dyn Fn(Value, &mut EffectContext) -> Value + Send + Sync>;
pub(crate) type AsyncTransform =
    Arc<dyn Fn(Value, EffectContext) -> BoxFuture<'static, (Value, EffectContext)> + Send + Sync>;

/// A user-supplied post-check predicate.
///
/// By default a refinement is gated on the node's abort flag. A readiness
/// predicate in `when` replaces that gate: the refinement runs exactly
/// when the predicate accepts the staged value, aborted or not.
#[derive(Clone)]
pub(crate) struct Refinement {
    pub(crate) run: RefineRun,
    pub(crate) message: Option<String>,
    pub(crate) abort: bool,
    pub(crate) when: Option<SyncPredicate>,
}

#[derive(Clone)]
pub(crate) enum RefineRun {
    /// Simple form: false means one custom issue.
    Predicate(SyncPredicate),
    PredicateAsync(AsyncPredicate),
    /// Rich form: the closure reports zero or more issues itself.
    Rich(SyncRich),
    RichAsync(AsyncRich),
}

impl Refinement {
    pub(crate) fn is_async(&self) -> bool {
        matches!(
            self.run,
            RefineRun::PredicateAsync(_) | RefineRun::RichAsync(_)
        )
    }
}

/// A user-supplied value mapping.
#[derive(Clone)]
pub(crate) enum Transform {
    Sync(SyncTransform),
    Async(AsyncTransform),
}

impl Transform {
    pub(crate) fn is_async(&self) -> bool {
        matches!(self, Transform::Async(_))
    }
}

/// One slot in a node's ordered effect pipeline.
#[derive(Clone)]
pub(crate) enum Effect {
    Check(super::checks::Check),
    Refine(Refinement),
    Transform(Transform),
}

impl Effect {
    pub(crate) fn is_async(&self) -> bool {
        match self {
            Effect::Check(_) => false,
            Effect::Refine(r) => r.is_async(),
            Effect::Transform(t) => t.is_async(),
        }
    }
}
