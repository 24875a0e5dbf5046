//! Bridge configuration.
//!
//! Everything is optional in the serialized form; missing sections fall
//! back to their defaults. Loaded from JSON:
//!
//! ```json
//! {
//!   "session": { "read_buffer_size": 8192 },
//!   "inject": { "history_capacity": 100, "consumption": { "mode": "exact" } },
//!   "automation": { "worklist": [7, 8, 9], "pacing_ms": 800 },
//!   "report": { "message": "ExchangeTypesItemsExchangerDescriptionForUserMessage" }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BridgeError, Result};
use crate::registry::Message;

/// Default read size per readiness event.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8192;

/// Default bound of the external injection queue.
pub const DEFAULT_INJECTION_QUEUE: usize = 64;

/// Default number of decoded messages kept in history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Default bound of the sink delivery queue.
pub const DEFAULT_SINK_QUEUE: usize = 1024;

/// Default milliseconds between automated actions.
pub const DEFAULT_PACING_MS: u64 = 800;

/// Default cadence of refresh actions.
pub const DEFAULT_REFRESH_EVERY: u64 = 3;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Relay loop settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Inject policy settings.
    #[serde(default)]
    pub inject: InjectConfig,

    /// Automation, disabled when absent.
    #[serde(default)]
    pub automation: Option<AutomationConfig>,

    /// Response reporting, disabled when absent.
    #[serde(default)]
    pub report: Option<ReportRule>,
}

impl BridgeConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            BridgeError::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| BridgeError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the bridge cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.session.read_buffer_size == 0 {
            return Err(BridgeError::Config("read_buffer_size must be > 0".into()));
        }
        if self.session.injection_queue == 0 {
            return Err(BridgeError::Config("injection_queue must be > 0".into()));
        }
        if self.inject.sink_queue == 0 {
            return Err(BridgeError::Config("sink_queue must be > 0".into()));
        }
        if let Some(automation) = &self.automation {
            if automation.refresh_every == 0 {
                return Err(BridgeError::Config("refresh_every must be > 0".into()));
            }
        }
        Ok(())
    }

    /// Set the relay loop settings.
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Set the inject policy settings.
    pub fn with_inject(mut self, inject: InjectConfig) -> Self {
        self.inject = inject;
        self
    }

    /// Enable automation.
    pub fn with_automation(mut self, automation: AutomationConfig) -> Self {
        self.automation = Some(automation);
        self
    }

    /// Enable response reporting.
    pub fn with_report(mut self, report: ReportRule) -> Self {
        self.report = Some(report);
        self
    }
}

/// Relay loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Bytes requested per read.
    pub read_buffer_size: usize,
    /// Capacity of the queue behind [`InjectHandle`](crate::session::InjectHandle).
    pub injection_queue: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            injection_queue: DEFAULT_INJECTION_QUEUE,
        }
    }
}

/// How many payload bytes a codec may leave unread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ConsumptionPolicy {
    /// The codec must consume the whole payload.
    #[default]
    Exact,
    /// Either the whole payload or all but exactly `trailing` bytes.
    Tolerate {
        /// Accepted number of leftover bytes.
        trailing: usize,
    },
}

impl ConsumptionPolicy {
    /// Whether consuming `consumed` of `declared` bytes is acceptable.
    pub fn accepts(&self, declared: usize, consumed: usize) -> bool {
        if consumed > declared {
            return false;
        }
        let leftover = declared - consumed;
        match *self {
            ConsumptionPolicy::Exact => leftover == 0,
            ConsumptionPolicy::Tolerate { trailing } => leftover == 0 || leftover == trailing,
        }
    }
}

/// Inject policy settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectConfig {
    /// Decoded messages kept in the history ring.
    pub history_capacity: usize,
    /// Pause after each decoded frame, in milliseconds.
    pub forward_delay_ms: Option<u64>,
    /// Accepted decode leftovers.
    pub consumption: ConsumptionPolicy,
    /// Sink deliveries waiting for a slow sink before new ones are dropped.
    pub sink_queue: usize,
}

impl Default for InjectConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            forward_delay_ms: None,
            consumption: ConsumptionPolicy::Exact,
            sink_queue: DEFAULT_SINK_QUEUE,
        }
    }
}

/// A message shape with fixed fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageTemplate {
    /// Registry name of the message.
    pub message: String,
    /// Fields copied into every rendered message.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl MessageTemplate {
    /// A template without fixed fields.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fields: Map::new(),
        }
    }

    /// Add a fixed field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Render the template, adding `extra` on top of the fixed fields.
    pub fn render<I>(&self, extra: I) -> Message
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut body = self.fields.clone();
        body.extend(extra);
        Message::new(self.message.clone(), Value::Object(body))
    }
}

/// Control channel recognition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Message carrying control tokens.
    pub message: String,
    /// Text field holding the token.
    pub field: String,
    /// Token that starts automation.
    pub start_token: String,
    /// Token that stops automation.
    pub stop_token: String,
    /// Text sent to the server when automation starts.
    pub start_reply: Option<String>,
    /// Text sent to the server when automation stops.
    pub stop_reply: Option<String>,
    /// Fields added to reply messages besides the text field.
    pub reply_fields: Map<String, Value>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        let mut reply_fields = Map::new();
        reply_fields.insert("channel".into(), Value::from(0));
        Self {
            message: "ChatClientMultiMessage".into(),
            field: "content".into(),
            start_token: "start".into(),
            stop_token: "stop".into(),
            start_reply: None,
            stop_reply: None,
            reply_fields,
        }
    }
}

/// Template of the per-item query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Message sent for each worklist item.
    pub message: String,
    /// Field receiving the item.
    pub item_field: String,
    /// Fixed fields.
    pub fields: Map<String, Value>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        let mut fields = Map::new();
        fields.insert("follow".into(), Value::Bool(true));
        Self {
            message: "ExchangeBidHouseSearchMessage".into(),
            item_field: "genId".into(),
            fields,
        }
    }
}

/// Automation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Items queried in each round. Consumed from the end.
    pub worklist: Vec<u32>,
    /// Minimum milliseconds between actions.
    pub pacing_ms: u64,
    /// Every `refresh_every`-th action is a refresh.
    pub refresh_every: u64,
    /// Control channel.
    pub control: ControlConfig,
    /// Query template.
    pub query: QueryConfig,
    /// First message of a refresh.
    pub leave: MessageTemplate,
    /// Second message of a refresh.
    pub enter: MessageTemplate,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            worklist: Vec::new(),
            pacing_ms: DEFAULT_PACING_MS,
            refresh_every: DEFAULT_REFRESH_EVERY,
            control: ControlConfig::default(),
            query: QueryConfig::default(),
            leave: MessageTemplate::new("LeaveDialogRequestMessage"),
            enter: MessageTemplate::new("InteractiveUseRequestMessage"),
        }
    }
}

impl AutomationConfig {
    /// Default settings over `worklist`.
    pub fn new(worklist: Vec<u32>) -> Self {
        Self {
            worklist,
            ..Self::default()
        }
    }

    /// Set the pacing threshold.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing_ms = pacing.as_millis() as u64;
        self
    }

    /// Set the refresh cadence.
    pub fn with_refresh_every(mut self, refresh_every: u64) -> Self {
        self.refresh_every = refresh_every;
        self
    }

    /// Set the control channel.
    pub fn with_control(mut self, control: ControlConfig) -> Self {
        self.control = control;
        self
    }

    /// Set the refresh templates.
    pub fn with_refresh(mut self, leave: MessageTemplate, enter: MessageTemplate) -> Self {
        self.leave = leave;
        self.enter = enter;
        self
    }

    /// Pacing threshold as a duration.
    #[inline]
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

/// Which response message to report, and where its values live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportRule {
    /// Response message name.
    pub message: String,
    /// List field inspected.
    pub list_field: String,
    /// Identifier field of a list entry.
    pub id_field: String,
    /// Numeric array field of a list entry.
    pub values_field: String,
}

impl Default for ReportRule {
    fn default() -> Self {
        Self {
            message: "ExchangeTypesItemsExchangerDescriptionForUserMessage".into(),
            list_field: "itemTypeDescriptions".into(),
            id_field: "objectGID".into(),
            values_field: "prices".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_json_yields_defaults() {
        let config = BridgeConfig::from_json("{}").unwrap();

        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.session.read_buffer_size, 8192);
        assert_eq!(config.inject.history_capacity, 100);
        assert_eq!(config.inject.consumption, ConsumptionPolicy::Exact);
        assert!(config.automation.is_none());
        assert!(config.report.is_none());
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config = BridgeConfig::from_json(
            r#"{
                "inject": { "forward_delay_ms": 5, "consumption": { "mode": "tolerate", "trailing": 48 } },
                "automation": { "worklist": [7, 8, 9], "refresh_every": 4 },
                "report": {}
            }"#,
        )
        .unwrap();

        assert_eq!(config.inject.forward_delay_ms, Some(5));
        assert_eq!(config.inject.history_capacity, 100);
        assert_eq!(
            config.inject.consumption,
            ConsumptionPolicy::Tolerate { trailing: 48 }
        );

        let automation = config.automation.unwrap();
        assert_eq!(automation.worklist, vec![7, 8, 9]);
        assert_eq!(automation.pacing(), Duration::from_millis(800));
        assert_eq!(automation.refresh_every, 4);
        assert_eq!(automation.control.start_token, "start");
        assert_eq!(config.report.unwrap().values_field, "prices");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = BridgeConfig::from_json(r#"{"session": {"read_buffer_size": 0}}"#).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));

        let err =
            BridgeConfig::from_json(r#"{"automation": {"refresh_every": 0}}"#).unwrap_err();
        assert!(err.to_string().contains("refresh_every"));

        let err = BridgeConfig::from_json(r#"{"inject": {"sink_queue": 0}}"#).unwrap_err();
        assert!(err.to_string().contains("sink_queue"));

        assert!(BridgeConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = BridgeConfig::from_file("/nonexistent/wirebridge.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_consumption_policy() {
        assert!(ConsumptionPolicy::Exact.accepts(10, 10));
        assert!(!ConsumptionPolicy::Exact.accepts(10, 9));
        assert!(!ConsumptionPolicy::Exact.accepts(10, 11));

        let tolerant = ConsumptionPolicy::Tolerate { trailing: 48 };
        assert!(tolerant.accepts(100, 100));
        assert!(tolerant.accepts(100, 52));
        assert!(!tolerant.accepts(100, 53));
        assert!(!tolerant.accepts(10, 11));
    }

    #[test]
    fn test_template_render_merges_fields() {
        let template = MessageTemplate::new("ExchangeBidHouseSearchMessage").with_field("follow", true);
        let msg = template.render([("genId".to_string(), json!(9))]);

        assert_eq!(msg.name, "ExchangeBidHouseSearchMessage");
        assert_eq!(msg.body, json!({"follow": true, "genId": 9}));
    }

    #[test]
    fn test_builder_chain() {
        let config = BridgeConfig::default()
            .with_automation(AutomationConfig::new(vec![1]).with_pacing(Duration::from_millis(50)))
            .with_report(ReportRule::default());

        assert_eq!(config.automation.as_ref().unwrap().pacing_ms, 50);
        assert!(config.report.is_some());
    }
}
