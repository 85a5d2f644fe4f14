//! One structural pass: build the chain, drive the parse, fold the
//! side-effect requests, replace the buffer.

use crate::context::TransformContext;
use crate::engine::LoaderId;
use crate::error::EngineError;
use crate::metrics::Metrics;
use crate::rule::{RewriteRule, WrapOutcome};
use reweave_classfile::{drive, ClassBuffer, ClassVisitor, ClassWriter, SharedOutput};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Per-artifact state accumulated across every pass of one load event.
///
/// Owned exclusively by the dispatch for this one class; intermediate
/// buffers live only here, so an abandoned outcome discards them by simply
/// never returning them.
pub(crate) struct PipelineState {
    pub(crate) loader: LoaderId,
    /// Dotted class name.
    pub(crate) class_name: String,
    pub(crate) buffer: ClassBuffer,
    /// Rules that reported a modification in any pass, in the order they
    /// were folded.
    pub(crate) applied: Vec<Arc<dyn RewriteRule>>,
    /// Running max of required minimum major versions.
    pub(crate) min_version: Option<u16>,
    /// Running max of requested upgrade major versions.
    pub(crate) upgrade_version: Option<u16>,
    /// Sticky across passes once any rule asks.
    pub(crate) bootstrap_requested: bool,
}

impl PipelineState {
    pub(crate) fn new(loader: LoaderId, class_name: String, bytes: Vec<u8>) -> Self {
        Self {
            loader,
            class_name,
            buffer: ClassBuffer::new(bytes),
            applied: Vec::new(),
            min_version: None,
            upgrade_version: None,
            bootstrap_requested: false,
        }
    }
}

/// Runs one pass of `rules` over the current buffer.
///
/// Returns whether this pass replaced the buffer. A pass in which no rule
/// participates skips the structural parse entirely; a pass in which no
/// participating rule marks itself modified leaves the buffer and the
/// aggregates untouched.
pub(crate) fn run_pass(
    state: &mut PipelineState,
    rules: &[Arc<dyn RewriteRule>],
    metrics: &Metrics,
) -> Result<bool, EngineError> {
    let scan_start = Instant::now();

    let output: SharedOutput = Rc::new(RefCell::new(None));
    let mut chain: Box<dyn ClassVisitor + '_> = Box::new(ClassWriter::new(Rc::clone(&output)));
    // Built innermost-first so the first-declared rule ends up outermost.
    let mut staged: Vec<(Arc<dyn RewriteRule>, Rc<TransformContext<'_>>)> = Vec::new();
    for rule in rules.iter().rev() {
        let ctx = Rc::new(TransformContext::new(&state.buffer, &state.class_name));
        match rule.try_wrap(state.loader, &state.class_name, chain, Rc::clone(&ctx)) {
            WrapOutcome::Wrap(stage) => {
                chain = stage;
                staged.push((Arc::clone(rule), ctx));
            }
            WrapOutcome::Decline(stage) => chain = stage,
        }
    }
    metrics.record_scan(scan_start.elapsed());

    if staged.is_empty() {
        return Ok(false);
    }

    let class = state.buffer.parsed()?.clone();
    let analysis_start = Instant::now();
    drive(class, chain.as_mut())?;
    metrics.record_analysis(analysis_start.elapsed());
    drop(chain);

    let mut pass_modified = false;
    // Fold in declared rule order.
    for (rule, ctx) in staged.iter().rev() {
        let requests = ctx.requests();
        if !requests.modified {
            continue;
        }
        info!(
            class = %state.class_name,
            rule = rule.name(),
            "applied rewrite rule"
        );
        state.applied.push(Arc::clone(rule));
        state.min_version = fold_max(state.min_version, requests.min_version);
        state.upgrade_version = fold_max(state.upgrade_version, requests.upgrade_version);
        state.bootstrap_requested |= requests.bootstrap;
        pass_modified = true;
    }
    drop(staged);

    if pass_modified {
        let bytes = output
            .borrow_mut()
            .take()
            .ok_or(EngineError::IncompleteChain)?;
        state.buffer.replace(bytes);
    }
    Ok(pass_modified)
}

fn fold_max(current: Option<u16>, incoming: Option<u16>) -> Option<u16> {
    match (current, incoming) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (value, None) | (None, value) => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_max_takes_the_larger_side() {
        assert_eq!(fold_max(None, None), None);
        assert_eq!(fold_max(Some(50), None), Some(50));
        assert_eq!(fold_max(None, Some(10)), Some(10));
        assert_eq!(fold_max(Some(50), Some(55)), Some(55));
        assert_eq!(fold_max(Some(55), Some(50)), Some(55));
    }
}
