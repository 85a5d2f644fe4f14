//! Collaborator traits: rewrite rules and notification sinks.

use crate::context::TransformContext;
use crate::engine::LoaderId;
use reweave_classfile::ClassVisitor;
use std::rc::Rc;
use std::sync::Arc;

/// What a rule decided about one class.
///
/// Rust moves the chain link into `try_wrap`, so a declining rule hands it
/// back untouched; either way the chain survives intact.
pub enum WrapOutcome<'a> {
    /// The rule participates: its stage now heads the chain.
    Wrap(Box<dyn ClassVisitor + 'a>),
    /// The rule sits this class out; it contributes no context and is
    /// invisible to the rules above it.
    Decline(Box<dyn ClassVisitor + 'a>),
}

/// A pluggable rewrite rule.
///
/// Stateless per artifact: everything a rule wants to say about one class
/// goes through the [`TransformContext`] it is handed, and every structural
/// edit goes through the visitor stage it wraps around `next`.
pub trait RewriteRule: Send + Sync {
    /// Stable name used in logs and reported to sinks.
    fn name(&self) -> &str;

    /// Offers this rule the class named `class_name` (dotted form) loaded by
    /// `loader`.
    ///
    /// A participating rule wraps `next` and keeps a clone of `ctx` in its
    /// stage; side-effect requests recorded on the context during the drive
    /// are folded into the pipeline after the pass.
    fn try_wrap<'a>(
        &self,
        loader: LoaderId,
        class_name: &str,
        next: Box<dyn ClassVisitor + 'a>,
        ctx: Rc<TransformContext<'a>>,
    ) -> WrapOutcome<'a>;
}

/// Observer notified once per load event, after reconciliation.
///
/// `final_bytes` are the committed bytes, or the original input when the
/// pipeline abandoned its work. `applied` lists the rules that reported a
/// modification in any pass, built-in reconciliation rules included.
///
/// Sinks run synchronously on the dispatching thread. A failing sink aborts
/// the remaining sinks for that class and the load event is treated as an
/// unexpected failure.
pub trait NotificationSink: Send + Sync {
    /// Delivers the outcome of one load event.
    fn on_class_processed(
        &self,
        loader: LoaderId,
        class_name: &str,
        final_bytes: &[u8],
        applied: &[Arc<dyn RewriteRule>],
    ) -> anyhow::Result<()>;
}
