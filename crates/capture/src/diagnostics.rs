//! Bounded text log that an embedding host polls for session messages.
//!
//! Events reach the log through [`DiagnosticLayer`], so library code only
//! ever uses the `tracing` macros.

use parking_lot::Mutex;
use std::{
    fmt::Write,
    sync::{Arc, LazyLock},
};
use tracing::{Level, field::Field, field::Visit};
use tracing_subscriber::{EnvFilter, Layer, layer::Context, prelude::*};

pub const LOG_CAPACITY: usize = 2000;

static GLOBAL: LazyLock<Arc<DiagnosticLog>> =
    LazyLock::new(|| Arc::new(DiagnosticLog::new(LOG_CAPACITY)));

/// Lines are kept until drained. Once full, new lines are dropped so the
/// earliest messages of a failing session survive.
pub struct DiagnosticLog {
    text: Mutex<String>,
    capacity: usize,
}

impl DiagnosticLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            text: Mutex::new(String::new()),
            capacity,
        }
    }

    /// Returns `false` if the line did not fit.
    pub fn append(&self, line: &str) -> bool {
        let mut text = self.text.lock();
        if text.len() + line.len() + 1 > self.capacity {
            return false;
        }
        text.push_str(line);
        text.push('\n');
        true
    }

    pub fn drain(&self) -> String {
        std::mem::take(&mut *self.text.lock())
    }

    pub fn len(&self) -> usize {
        self.text.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.lock().is_empty()
    }
}

pub fn global() -> Arc<DiagnosticLog> {
    Arc::clone(&GLOBAL)
}

/// Takes everything the process-wide log holds.
pub fn drain() -> String {
    GLOBAL.drain()
}

/// Installs a global subscriber that prints to stderr (filtered by
/// `RUST_LOG`, `info` otherwise) and feeds the process-wide log.
///
/// Does nothing if a global subscriber is already set.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(filter))
        .with(DiagnosticLayer::new(global()))
        .try_init();

    if result.is_err() {
        tracing::debug!("Global subscriber already installed");
    }
}

/// Formats events at or above `max_level` into a [`DiagnosticLog`].
pub struct DiagnosticLayer {
    log: Arc<DiagnosticLog>,
    max_level: Level,
}

impl DiagnosticLayer {
    pub fn new(log: Arc<DiagnosticLog>) -> Self {
        Self {
            log,
            max_level: Level::INFO,
        }
    }

    pub fn with_max_level(mut self, level: Level) -> Self {
        self.max_level = level;
        self
    }
}

impl<S> Layer<S> for DiagnosticLayer
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() > self.max_level {
            return;
        }

        let target = meta.target();
        let short_target = target.rsplit("::").next().unwrap_or(target);

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        self.log.append(&format!(
            "{:>5} {}: {}",
            meta.level(),
            short_target,
            visitor.message
        ));
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl MessageVisitor {
    fn push(&mut self, field: &Field, value: std::fmt::Arguments<'_>) {
        if field.name() == "message" {
            if self.message.is_empty() {
                let _ = self.message.write_fmt(value);
            } else {
                self.message = format!("{value} {}", self.message);
            }
        } else {
            if !self.message.is_empty() {
                self.message.push(' ');
            }
            let _ = write!(self.message, "{}={}", field.name(), value);
        }
    }
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.push(field, format_args!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, format_args!("{value}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_keeps_oldest_lines() {
        let log = DiagnosticLog::new(12);

        assert!(log.append("first"));
        assert!(log.append("next"));
        assert!(!log.append("dropped"));

        assert_eq!(log.drain(), "first\nnext\n");
        assert!(log.is_empty());
        assert!(log.append("again"));
    }

    #[test]
    fn layer_formats_message_and_fields() {
        let log = Arc::new(DiagnosticLog::new(LOG_CAPACITY));
        let subscriber = tracing_subscriber::registry().with(DiagnosticLayer::new(log.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(stream = 1, "Signal lost");
            tracing::debug!("too verbose");
        });

        let text = log.drain();
        assert!(text.contains("WARN"), "{text}");
        assert!(text.contains("Signal lost stream=1"), "{text}");
        assert!(!text.contains("too verbose"));
    }

    #[test]
    fn max_level_controls_what_is_kept() {
        let log = Arc::new(DiagnosticLog::new(LOG_CAPACITY));
        let subscriber = tracing_subscriber::registry()
            .with(DiagnosticLayer::new(log.clone()).with_max_level(Level::WARN));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("Configuring for 4x2p");
            tracing::error!("Capture session ended");
        });

        let text = log.drain();
        assert!(!text.contains("Configuring"), "{text}");
        assert!(text.contains("ERROR"), "{text}");
    }
}
