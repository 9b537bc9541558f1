//! Progress reporting for pipeline stages.
//!
//! Stage boundaries emit one line each; hosts that want silence (or capture)
//! inject their own reporter.

use std::io::Write;
use std::sync::Mutex;

/// Trait for pipeline progress reporters.
pub trait Reporter: Send + Sync {
    /// Report a progress line.
    fn log(&self, message: &str);

    /// Report an error line.
    fn error(&self, message: &str) {
        self.log(message);
    }

    /// Check if this reporter wants verbose output.
    fn is_verbose(&self) -> bool {
        false
    }
}

/// A reporter that discards all output.
#[derive(Debug, Default)]
pub struct NullReporter;

impl NullReporter {
    /// Create a new null reporter.
    pub fn new() -> Self {
        Self
    }
}

impl Reporter for NullReporter {
    fn log(&self, _message: &str) {
        // Discard all output
    }

    fn error(&self, _message: &str) {}
}

/// Console reporter with timestamps and optional colors.
pub struct ConsoleReporter {
    /// Whether to use colors
    use_colors: bool,
    /// Whether to show verbose output
    verbose: bool,
    /// Output writer (for testing)
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for ConsoleReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleReporter")
            .field("use_colors", &self.use_colors)
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl ConsoleReporter {
    /// Create a new console reporter writing to stderr.
    pub fn new() -> Self {
        Self {
            use_colors: atty::is(atty::Stream::Stderr),
            verbose: false,
            output: Mutex::new(Box::new(std::io::stderr())),
        }
    }

    /// Create a console reporter that writes to a custom output.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self {
            use_colors: false, // Disable colors for custom output
            verbose: false,
            output: Mutex::new(Box::new(output)),
        }
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set whether to use colors.
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    fn red(&self, text: &str) -> String {
        if self.use_colors {
            format!("\x1b[31m{}\x1b[0m", text)
        } else {
            text.to_string()
        }
    }

    fn writeln(&self, line: &str) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", line);
        }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for ConsoleReporter {
    fn log(&self, message: &str) {
        self.writeln(&format!("[{}] {}", timestamp(), message));
    }

    fn error(&self, message: &str) {
        let line = format!("[{}] {}", timestamp(), message);
        self.writeln(&self.red(&line));
    }

    fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Get current timestamp for logging
pub(crate) fn timestamp() -> String {
    use std::time::SystemTime;
    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs() % 86400; // seconds since midnight
    let hours = (secs / 3600) % 24;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
