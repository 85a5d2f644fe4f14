//! The rewrite engine: registration surface and the per-class dispatch.

use crate::error::EngineError;
use crate::metrics::Metrics;
use crate::pipeline::{run_pass, PipelineState};
use crate::reconcile::{reconcile, ReconcileState};
use crate::registry::Registry;
use crate::rule::{NotificationSink, RewriteRule};
use crate::version::DEFAULT_VERSION_CEILING;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Opaque identity of the defining loader for one load event.
///
/// The engine never interprets the value; it only hands it through to rules
/// and sinks so they can scope their decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoaderId(pub u64);

impl fmt::Display for LoaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loader#{}", self.0)
    }
}

/// Engine-wide tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log classes the pipeline leaves untouched (debug level; noisy).
    pub log_untouched: bool,
    /// Highest class-file major version the engine will produce.
    pub version_ceiling: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_untouched: false,
            version_ceiling: DEFAULT_VERSION_CEILING,
        }
    }
}

/// The process-wide rewrite engine.
///
/// Registration and dispatch may interleave freely: each dispatch works
/// against the rule snapshot taken at its start, so a rule registered
/// mid-flight applies to subsequent classes only.
#[derive(Default)]
pub struct RewriteEngine {
    config: EngineConfig,
    rules: Registry<dyn RewriteRule>,
    sinks: Registry<dyn NotificationSink>,
    metrics: Metrics,
}

impl RewriteEngine {
    /// An engine with default configuration and no rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine with the given configuration.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Appends a rule. Later-registered rules sit closer to the output end
    /// of every chain.
    pub fn register_rule(&self, rule: Arc<dyn RewriteRule>) {
        self.rules.push(rule);
    }

    /// Appends a notification sink.
    pub fn register_sink(&self, sink: Arc<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    /// The engine's counters.
    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Rewrites one class as it is loaded.
    ///
    /// `class_name` may use either dotted or slashed separators. Returns the
    /// committed replacement bytes, or `None` when the class is to be loaded
    /// unchanged. This is the fault boundary: any unexpected failure inside
    /// the pipeline is logged and folded into `None`, so a broken rule can
    /// never take the host down or install a half-rewritten class.
    pub fn transform(&self, loader: LoaderId, class_name: &str, bytes: &[u8]) -> Option<Vec<u8>> {
        match self.try_transform(loader, class_name, bytes) {
            Ok(result) => result,
            Err(error) => {
                warn!(%loader, class = class_name, %error, "rewrite pipeline failed");
                None
            }
        }
    }

    fn try_transform(
        &self,
        loader: LoaderId,
        class_name: &str,
        bytes: &[u8],
    ) -> Result<Option<Vec<u8>>, EngineError> {
        let total_start = Instant::now();

        let match_start = Instant::now();
        let class_name = class_name.replace('/', ".");
        let rules = self.rules.snapshot();
        let match_elapsed = match_start.elapsed();

        let mut state = PipelineState::new(loader, class_name, bytes.to_vec());
        debug!(
            %loader,
            class = %state.class_name,
            phase = ?ReconcileState::Primary,
            rules = rules.len(),
            "dispatching load event"
        );
        run_pass(&mut state, &rules, &self.metrics)?;
        let outcome = reconcile(&mut state, &self.metrics, self.config.version_ceiling)?;

        let committed = outcome == ReconcileState::Committed;
        if !committed && self.config.log_untouched {
            debug!(%loader, class = %state.class_name, "no rewrite applied");
        }

        let final_bytes: &[u8] = if committed { state.buffer.bytes() } else { bytes };
        for sink in self.sinks.snapshot().iter() {
            sink.on_class_processed(loader, &state.class_name, final_bytes, &state.applied)
                .map_err(EngineError::Sink)?;
        }

        self.metrics.record_class(match_elapsed, total_start.elapsed());
        Ok(committed.then(|| state.buffer.into_bytes()))
    }
}

impl fmt::Debug for RewriteEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewriteEngine")
            .field("config", &self.config)
            .field("rules", &self.rules.len())
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_the_version_ceiling() {
        let config = EngineConfig::default();
        assert!(!config.log_untouched);
        assert_eq!(config.version_ceiling, DEFAULT_VERSION_CEILING);
    }

    #[test]
    fn config_round_trips_through_serde_with_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.version_ceiling, DEFAULT_VERSION_CEILING);
        let config: EngineConfig =
            serde_json::from_str(r#"{"version_ceiling": 55}"#).unwrap();
        assert_eq!(config.version_ceiling, 55);
    }

    #[test]
    fn loader_id_displays_compactly() {
        assert_eq!(LoaderId(7).to_string(), "loader#7");
    }
}
