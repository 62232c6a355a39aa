//! Progress logging boundary
//!
//! User-facing progress and result lines go through the narrow
//! [`ProgressLogger`] trait: one method taking a pre-formatted line. The
//! concrete destination (terminal, test buffer, nothing) is supplied by the
//! caller. Diagnostic logging is separate and uses `tracing` throughout the
//! crate.

use parking_lot::Mutex;

/// Sink for pre-formatted, user-facing progress lines
pub trait ProgressLogger: Send + Sync {
    /// Emit a single line, without a trailing newline
    fn log(&self, line: &str);
}

/// Logger writing each line to standard output
#[derive(Debug, Default)]
pub struct TerminalLogger;

impl ProgressLogger for TerminalLogger {
    fn log(&self, line: &str) {
        println!("{line}");
    }
}

/// Logger collecting lines in memory, for tests and capture
#[derive(Debug, Default)]
pub struct BufferLogger {
    lines: Mutex<Vec<String>>,
}

impl BufferLogger {
    /// Create an empty buffer logger
    pub fn new() -> Self {
        Self::default()
    }

    /// All lines logged so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl ProgressLogger for BufferLogger {
    fn log(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}

/// Logger discarding everything
#[derive(Debug, Default)]
pub struct NoopLogger;

impl ProgressLogger for NoopLogger {
    fn log(&self, _line: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_logger_collects_lines() {
        let logger = BufferLogger::new();
        logger.log("first");
        logger.log("second");

        assert_eq!(logger.lines(), vec!["first", "second"]);
    }
}
