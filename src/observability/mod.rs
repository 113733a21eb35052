//! Observability subsystem for cascmon
//!
//! - Structured logging (JSON, one line per event)
//! - Typed lifecycle events
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on monitoring or fault execution
//! 3. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use cascmon::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::NodeStarted, &[("node", "line0-1")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log a lifecycle event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_degraded() {
        Severity::Warn
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}
