//! Extraction of reported values from response messages.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ReportRule;
use crate::registry::Message;
use crate::sink::ReportingSink;

/// Watches for the configured response message and forwards the first
/// result entry to a [`ReportingSink`].
#[derive(Clone)]
pub struct Reporter {
    rule: ReportRule,
    sink: Arc<dyn ReportingSink>,
}

impl Reporter {
    /// Create a reporter.
    pub fn new(rule: ReportRule, sink: Arc<dyn ReportingSink>) -> Self {
        Self { rule, sink }
    }

    /// The rule in use.
    pub fn rule(&self) -> &ReportRule {
        &self.rule
    }

    /// The sink reports go to.
    pub fn sink(&self) -> &Arc<dyn ReportingSink> {
        &self.sink
    }

    /// Identifier and values carried by `message`, if it is a non-empty
    /// response.
    pub fn extract(&self, message: &Message) -> Option<(String, Vec<i64>)> {
        if !message.is(&self.rule.message) {
            return None;
        }
        let first = message
            .field(&self.rule.list_field)?
            .as_array()?
            .first()?;

        let identifier = match first.get(&self.rule.id_field)? {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let values = first
            .get(&self.rule.values_field)
            .and_then(Value::as_array)
            .map(|values| values.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default();

        Some((identifier, values))
    }

    /// Report `message` if it matches, waiting for the sink. Sink failures
    /// are logged only.
    ///
    /// [`Inject`](crate::policy::Inject) does not call this; it queues
    /// [`extract`](Self::extract) results on a
    /// [`SinkQueue`](crate::sink::SinkQueue) instead.
    pub async fn inspect(&self, message: &Message) {
        let Some((identifier, values)) = self.extract(message) else {
            return;
        };
        info!(%identifier, ?values, "reporting response");
        match self.sink.report(&identifier, &values).await {
            Ok(()) => debug!(%identifier, "report delivered"),
            Err(e) => warn!(%identifier, "report failed: {}", e),
        }
    }
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("rule", &self.rule)
            .finish_non_exhaustive()
    }
}
