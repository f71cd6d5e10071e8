//! Script console
//!
//! Scripts write through a `Console` whose sink can be swapped at runtime.
//! `Console::capture` installs a capturing sink and returns a guard; dropping
//! the guard puts the previous sink back, whichever way the run ended.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::types::{LogEntry, LogKind};

/// Severity chosen by the script (`console.log`, `console.warn`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
}

impl ConsoleLevel {
    pub fn log_kind(self) -> LogKind {
        match self {
            ConsoleLevel::Log | ConsoleLevel::Info => LogKind::Info,
            ConsoleLevel::Warn => LogKind::Warning,
            ConsoleLevel::Error => LogKind::Error,
        }
    }
}

/// Destination for console output
pub trait ConsoleSink: Send + Sync {
    fn write(&self, level: ConsoleLevel, message: &str);
}

/// Default sink: forwards script output to `tracing`
#[derive(Debug, Default)]
pub struct TracingSink;

impl ConsoleSink for TracingSink {
    fn write(&self, level: ConsoleLevel, message: &str) {
        match level {
            ConsoleLevel::Log | ConsoleLevel::Info => {
                tracing::info!(target: "flowops::script", "{}", message)
            }
            ConsoleLevel::Warn => tracing::warn!(target: "flowops::script", "{}", message),
            ConsoleLevel::Error => tracing::error!(target: "flowops::script", "{}", message),
        }
    }
}

/// Shared handle to the currently installed sink
#[derive(Clone)]
pub struct Console {
    sink: Arc<Mutex<Arc<dyn ConsoleSink>>>,
}

impl Default for Console {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console").finish_non_exhaustive()
    }
}

impl Console {
    pub fn new(sink: Arc<dyn ConsoleSink>) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    // A panic while holding the lock leaves the sink itself intact
    fn slot(&self) -> MutexGuard<'_, Arc<dyn ConsoleSink>> {
        self.sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn current(&self) -> Arc<dyn ConsoleSink> {
        Arc::clone(&self.slot())
    }

    pub fn write(&self, level: ConsoleLevel, message: &str) {
        // Release the lock before calling out
        let sink = self.current();
        sink.write(level, message);
    }

    /// Start capturing output until the returned guard is dropped
    pub fn capture(&self) -> CaptureGuard {
        let buffer = Arc::new(CapturingSink {
            entries: Mutex::new(Vec::new()),
            forward: self.current(),
        });
        let installed: Arc<dyn ConsoleSink> = buffer.clone();
        let previous = std::mem::replace(&mut *self.slot(), installed);
        CaptureGuard {
            console: self.clone(),
            previous: Some(previous),
            buffer,
        }
    }
}

struct CapturingSink {
    entries: Mutex<Vec<LogEntry>>,
    forward: Arc<dyn ConsoleSink>,
}

impl ConsoleSink for CapturingSink {
    fn write(&self, level: ConsoleLevel, message: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(LogEntry::new(level.log_kind(), message));
        self.forward.write(level, message);
    }
}

/// Active capture; restores the previous sink on drop
pub struct CaptureGuard {
    console: Console,
    previous: Option<Arc<dyn ConsoleSink>>,
    buffer: Arc<CapturingSink>,
}

impl CaptureGuard {
    /// Take everything captured so far
    pub fn drain(&self) -> Vec<LogEntry> {
        std::mem::take(
            &mut *self
                .buffer
                .entries
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            *self.console.slot() = previous;
        }
    }
}
