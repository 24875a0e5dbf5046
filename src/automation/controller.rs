//! Timer-gated automation state machine.
//!
//! The controller never touches the network. It turns observed messages and
//! the passage of time into [`AutomationAction`]s; the owning policy renders
//! them with [`AutomationController::messages_for`] and sends them toward
//! the server.
//!
//! ```text
//!            start token                  worklist empty
//!   ┌──────┐ ──────────► ┌─────────┐ ──────────────────► refill
//!   │ Idle │             │ Running │ ──── pacing elapsed ──► Query / Refresh
//!   └──────┘ ◄────────── └─────────┘
//!             stop token
//! ```

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::AutomationConfig;
use crate::pacing::PacingGate;
use crate::protocol::Role;
use crate::registry::Message;

/// Automation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Not acting; the initial state.
    #[default]
    Idle,
    /// Working through the worklist.
    Running,
}

/// Something the controller wants sent to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutomationAction {
    /// Query one worklist item.
    Query(u32),
    /// Leave and re-enter the target context.
    Refresh,
    /// Acknowledge a control token on the control channel.
    Reply(String),
}

/// Drives queries over a worklist while running.
#[derive(Debug, Clone)]
pub struct AutomationController {
    config: AutomationConfig,
    mode: Mode,
    worklist: Vec<u32>,
    gate: PacingGate,
    action_counter: u64,
}

impl AutomationController {
    /// Create an idle controller.
    pub fn new(config: AutomationConfig, now: Instant) -> Self {
        let gate = PacingGate::new(config.pacing(), now);
        Self {
            worklist: config.worklist.clone(),
            config,
            mode: Mode::Idle,
            gate,
            action_counter: 0,
        }
    }

    /// Current state.
    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Items still to query in this round.
    #[inline]
    pub fn worklist(&self) -> &[u32] {
        &self.worklist
    }

    /// Actions performed since the last start.
    #[inline]
    pub fn action_counter(&self) -> u64 {
        self.action_counter
    }

    /// Settings in use.
    pub fn config(&self) -> &AutomationConfig {
        &self.config
    }

    /// Feed one decoded message. Control tokens are only honored on
    /// client messages; every message then counts as a tick.
    pub fn observe(&mut self, message: &Message, origin: Role, now: Instant) -> Vec<AutomationAction> {
        let mut actions = Vec::new();
        if origin == Role::Primary {
            actions.extend(self.control(message, now));
        }
        actions.extend(self.tick(now));
        actions
    }

    /// Apply a control token carried by `message`, if any.
    pub fn control(&mut self, message: &Message, now: Instant) -> Option<AutomationAction> {
        let control = &self.config.control;
        if !message.is(&control.message) {
            return None;
        }
        let token = message.text(&control.field)?;

        if token == control.start_token {
            info!(items = self.config.worklist.len(), "automation started");
            self.mode = Mode::Running;
            self.gate.reset(now);
            self.refill();
            self.action_counter = 0;
            self.config.control.start_reply.clone().map(AutomationAction::Reply)
        } else if token == control.stop_token {
            info!(actions = self.action_counter, "automation stopped");
            self.mode = Mode::Idle;
            self.config.control.stop_reply.clone().map(AutomationAction::Reply)
        } else {
            None
        }
    }

    /// Perform at most one scheduled action if the pacing threshold has
    /// passed.
    pub fn tick(&mut self, now: Instant) -> Option<AutomationAction> {
        if self.mode != Mode::Running || !self.gate.ready(now) {
            return None;
        }
        self.gate.reset(now);

        if self.worklist.is_empty() {
            debug!("worklist exhausted, refilling");
            self.refill();
            return None;
        }

        let refresh_every = self.config.refresh_every.max(1);
        let action = if self.action_counter % refresh_every == refresh_every - 1 {
            AutomationAction::Refresh
        } else {
            // non-empty checked above
            AutomationAction::Query(self.worklist.pop()?)
        };
        self.action_counter += 1;
        Some(action)
    }

    /// Render an action into the messages to send, in order.
    pub fn messages_for(&self, action: &AutomationAction) -> Vec<Message> {
        match action {
            AutomationAction::Query(item) => {
                let query = &self.config.query;
                let mut body = query.fields.clone();
                body.insert(query.item_field.clone(), Value::from(*item));
                vec![Message::new(query.message.clone(), Value::Object(body))]
            }
            AutomationAction::Refresh => vec![
                self.config.leave.render([]),
                self.config.enter.render([]),
            ],
            AutomationAction::Reply(text) => {
                let control = &self.config.control;
                let mut body = control.reply_fields.clone();
                body.insert(control.field.clone(), Value::from(text.as_str()));
                vec![Message::new(control.message.clone(), Value::Object(body))]
            }
        }
    }

    fn refill(&mut self) {
        self.worklist.clear();
        self.worklist.extend_from_slice(&self.config.worklist);
    }
}
