//! The reconciliation controller: corrective passes and the commit/abort
//! decision.

use crate::bootstrap::BootstrapInjector;
use crate::error::EngineError;
use crate::metrics::Metrics;
use crate::pipeline::{run_pass, PipelineState};
use crate::rule::RewriteRule;
use crate::version::{check_floor, VersionReconciler};
use std::sync::Arc;
use tracing::{debug, warn};

/// States of one load event's reconciliation.
///
/// ```text
/// Primary ──(nothing modified)──────────────────────► Abandoned
///    │
///    ├─(bootstrap requested)─► BootstrapInjection ─┐
///    │                                             │
///    ├─(no version requests)──────────────────────►│── Committed
///    │                                             │
///    └────────────► VersionReconciliation ─────────┘
///                          │
///                          └─(policy conflict)────► Abandoned
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReconcileState {
    /// The requested rule set has run; deciding what comes next.
    Primary,
    /// Injecting the shared bootstrap method.
    BootstrapInjection,
    /// Rewriting the declared format version.
    VersionReconciliation,
    /// The current buffer is the result.
    Committed,
    /// Every accumulated modification is discarded; the class is unchanged.
    Abandoned,
}

/// Runs the corrective passes after the primary pass and decides the final
/// state.
///
/// Returns only `Committed` or `Abandoned`. The version-policy conflict is
/// handled here — logged and folded into `Abandoned` — so partially-applied
/// rewrites are never surfaced.
pub(crate) fn reconcile(
    state: &mut PipelineState,
    metrics: &Metrics,
    ceiling: u16,
) -> Result<ReconcileState, EngineError> {
    if state.applied.is_empty() {
        return Ok(ReconcileState::Abandoned);
    }

    if state.bootstrap_requested {
        debug!(
            class = %state.class_name,
            phase = ?ReconcileState::BootstrapInjection,
            "running corrective pass"
        );
        let injector: Arc<dyn RewriteRule> = Arc::new(BootstrapInjector);
        run_pass(state, std::slice::from_ref(&injector), metrics)?;
    }

    if state.min_version.is_none() && state.upgrade_version.is_none() {
        return Ok(ReconcileState::Committed);
    }

    if let Err(conflict) = check_floor(state.min_version, ceiling) {
        warn!(
            class = %state.class_name,
            phase = ?ReconcileState::VersionReconciliation,
            %conflict,
            "abandoning rewrite"
        );
        return Ok(ReconcileState::Abandoned);
    }
    let reconciler: Arc<dyn RewriteRule> =
        Arc::new(VersionReconciler::new(state.min_version, state.upgrade_version));
    run_pass(state, std::slice::from_ref(&reconciler), metrics)?;

    Ok(ReconcileState::Committed)
}
