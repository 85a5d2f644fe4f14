//! Engine error taxonomy.
//!
//! The expected, per-artifact recoverable case — a version-policy conflict —
//! is *not* here: it is [`crate::version::PolicyConflict`], consumed by the
//! reconciliation controller's transition to Abandoned and never allowed to
//! escape as a general fault.

use reweave_classfile::FormatError;
use thiserror::Error;

/// Unexpected failures of one per-class pipeline invocation.
///
/// Any of these propagates to the single outermost boundary in
/// [`crate::RewriteEngine::transform`], where it is logged and the class is
/// treated as unchanged.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The buffer could not be parsed or rebuilt.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// A modifying pass finished without the writer producing bytes (a
    /// stage swallowed `visit_end`).
    #[error("rewrite chain completed without producing a class buffer")]
    IncompleteChain,

    /// A notification sink failed; remaining sinks were not notified.
    #[error("notification sink failed: {0}")]
    Sink(anyhow::Error),
}
