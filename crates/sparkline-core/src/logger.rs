//! Per-plugin log handle.

use std::fmt;
use std::sync::Arc;

use tracing::Level;

use crate::plugin::PluginId;

/// Host-supplied callback receiving every plugin log line.
///
/// Used by embedders that show plugin output somewhere other than the
/// `tracing` subscriber, such as a console panel.
pub type LogSink = Arc<dyn Fn(&PluginId, Level, &str) + Send + Sync>;

/// The logging handle a plugin receives at construction.
///
/// Messages become `tracing` events under the `sparkline::plugin` target with
/// the plugin id and label attached, and are forwarded to the host's
/// [`LogSink`] when one is installed. Cloning is cheap.
#[derive(Clone)]
pub struct PluginLogger {
    id: PluginId,
    label: Arc<str>,
    sink: Option<LogSink>,
}

impl PluginLogger {
    /// Creates a logger for `id`, shown as `label`.
    #[must_use]
    pub fn new(id: PluginId, label: &str, sink: Option<LogSink>) -> Self {
        Self {
            id,
            label: Arc::from(label),
            sink,
        }
    }

    /// A logger with no sink, for tests and tools.
    #[must_use]
    pub fn detached(id: &str) -> Self {
        Self::new(PluginId::new(id), id, None)
    }

    /// The plugin this logger belongs to.
    #[must_use]
    pub fn id(&self) -> &PluginId {
        &self.id
    }

    /// Logs at `INFO`.
    pub fn info(&self, message: impl AsRef<str>) {
        self.log(Level::INFO, message.as_ref());
    }

    /// Logs at `DEBUG`.
    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(Level::DEBUG, message.as_ref());
    }

    /// Logs at `WARN`.
    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(Level::WARN, message.as_ref());
    }

    /// Logs at `ERROR`.
    pub fn error(&self, message: impl AsRef<str>) {
        self.log(Level::ERROR, message.as_ref());
    }

    /// Logs at an explicit level.
    pub fn log(&self, level: Level, message: &str) {
        let id = self.id.as_str();
        let label = &*self.label;
        match level {
            Level::ERROR => tracing::error!(target: "sparkline::plugin", plugin = id, label, "{message}"),
            Level::WARN => tracing::warn!(target: "sparkline::plugin", plugin = id, label, "{message}"),
            Level::INFO => tracing::info!(target: "sparkline::plugin", plugin = id, label, "{message}"),
            Level::DEBUG => tracing::debug!(target: "sparkline::plugin", plugin = id, label, "{message}"),
            Level::TRACE => tracing::trace!(target: "sparkline::plugin", plugin = id, label, "{message}"),
        }
        if let Some(sink) = &self.sink {
            sink(&self.id, level, message);
        }
    }
}

impl fmt::Debug for PluginLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginLogger")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn sink_receives_messages() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&lines);
        let sink: LogSink = Arc::new(move |id, level, msg| {
            captured
                .lock()
                .unwrap()
                .push(format!("{id} {level} {msg}"));
        });

        let logger = PluginLogger::new(PluginId::new("tracker"), "Tracker", Some(sink));
        logger.info("ready");
        logger.warn("careful");

        let lines = lines.lock().unwrap();
        assert_eq!(*lines, vec!["tracker INFO ready", "tracker WARN careful"]);
    }

    #[test]
    fn detached_logger_does_not_panic() {
        let logger = PluginLogger::detached("quiet");
        logger.error("nobody listens");
        assert_eq!(logger.id().as_str(), "quiet");
    }
}
