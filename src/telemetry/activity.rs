//! Mirrors operator-relevant log events into the observer activity log

use crate::observer::ActivityLog;
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Target used for trade lifecycle events that belong in the activity log
pub const TRADE_TARGET: &str = "trade";

/// Layer that records WARN/ERROR events and `trade` target events
pub struct ActivityLayer {
    log: ActivityLog,
}

impl ActivityLayer {
    pub fn new(log: ActivityLog) -> Self {
        Self { log }
    }

    fn wants(metadata: &tracing::Metadata<'_>) -> bool {
        *metadata.level() <= Level::WARN || metadata.target() == TRADE_TARGET
    }
}

impl<S: Subscriber> Layer<S> for ActivityLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !Self::wants(metadata) {
            return;
        }

        let level = if metadata.target() == TRADE_TARGET && *metadata.level() > Level::WARN {
            "TRADE"
        } else {
            metadata.level().as_str()
        };

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.log.push(level, visitor.finish());
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{} {}", self.message, self.fields.join(" "))
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}
