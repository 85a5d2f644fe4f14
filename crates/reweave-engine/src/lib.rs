//! reweave-engine — the load-time class rewrite pipeline.
//!
//! The engine rewrites class files as the host loads them: every registered
//! [`RewriteRule`] gets a chance to wrap the structural visitor chain for a
//! class, the chain is driven by a single parse, and each rule's side-effect
//! requests (minimum format version, explicit upgrade, shared bootstrap
//! method) are reconciled into one consistent result. The whole load event
//! commits atomically or not at all: a version-policy conflict, or any
//! unexpected failure, leaves the original bytes in force.
//!
//! # Example
//!
//! ```rust,ignore
//! use reweave_engine::{LoaderId, RewriteEngine};
//! use std::sync::Arc;
//!
//! let engine = RewriteEngine::new();
//! engine.register_rule(Arc::new(MyRule::default()));
//!
//! // Called from the host's load hook, concurrently across classes.
//! match engine.transform(LoaderId(0), "com/example/Widget", &bytes) {
//!     Some(rewritten) => install(rewritten),
//!     None => install(bytes), // untouched
//! }
//! ```

// Core modules
pub mod bootstrap;
pub mod context;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod rule;
pub mod version;

mod pipeline;
mod reconcile;

// Re-exports for convenience
pub use bootstrap::{BOOTSTRAP_METHOD_DESCRIPTOR, BOOTSTRAP_METHOD_NAME};
pub use context::{HandleKind, MethodHandleRef, TransformContext};
pub use engine::{EngineConfig, LoaderId, RewriteEngine};
pub use error::EngineError;
pub use metrics::{Metrics, MetricsSnapshot};
pub use registry::Registry;
pub use rule::{NotificationSink, RewriteRule, WrapOutcome};
pub use version::{PolicyConflict, DEFAULT_VERSION_CEILING};
