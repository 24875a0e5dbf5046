//! Automation on top of the inject policy.
//!
//! Provides:
//! - [`AutomationController`] - control-token driven worklist scheduler
//! - [`Reporter`] - forwards values from response messages to a sink

mod controller;
mod report;

pub use controller::{AutomationAction, AutomationController, Mode};
pub use report::Reporter;

pub use crate::config::{AutomationConfig, ReportRule};
