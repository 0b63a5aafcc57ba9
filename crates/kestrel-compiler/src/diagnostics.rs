//! Location-tagged diagnostic sink
//!
//! Recoverable problems are reported here and compilation continues, so a
//! single unit can report more than one error.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

/// Where in the program a diagnostic applies
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Location {
    /// Source file name, if known
    pub source_file: Option<String>,
    /// Enclosing element, e.g. `java/lang/Object.wait(J)V`
    pub element: Option<String>,
    /// Source line; 0 when unknown
    pub line: u32,
    /// Bytecode index; -1 when unknown
    pub bci: i32,
}

impl Location {
    /// A location with nothing known about it
    pub fn unknown() -> Self {
        Location {
            bci: -1,
            ..Location::default()
        }
    }

    /// A location inside `element`
    pub fn in_element(element: impl Into<String>) -> Self {
        Location {
            element: Some(element.into()),
            ..Location::unknown()
        }
    }

    /// Same location at a different line and bytecode index
    pub fn at(&self, line: u32, bci: i32) -> Self {
        Location {
            line,
            bci,
            ..self.clone()
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source_file.as_deref().unwrap_or("<unknown>"))?;
        if self.line > 0 {
            write!(f, ":{}", self.line)?;
        }
        if let Some(element) = &self.element {
            write!(f, " ({})", element)?;
        }
        if self.bci >= 0 {
            write!(f, " @{}", self.bci)?;
        }
        Ok(())
    }
}

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Compilation will fail but continues to find more problems
    Error,
    /// Suspicious but not fatal
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        })
    }
}

/// A single reported problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Where the problem was found
    pub location: Location,
    /// Human-readable message
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.location, self.severity, self.message)
    }
}

/// Thread-safe collector shared by all compilation threads
#[derive(Debug, Default)]
pub struct Diagnostics {
    reported: Mutex<Vec<Diagnostic>>,
    errors: AtomicUsize,
    warnings: AtomicUsize,
}

impl Diagnostics {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Report an error
    pub fn error(&self, location: &Location, message: impl Into<String>) {
        self.report(Severity::Error, location, message.into());
    }

    /// Report a warning
    pub fn warning(&self, location: &Location, message: impl Into<String>) {
        self.report(Severity::Warning, location, message.into());
    }

    fn report(&self, severity: Severity, location: &Location, message: String) {
        let diagnostic = Diagnostic {
            severity,
            location: location.clone(),
            message,
        };
        match severity {
            Severity::Error => {
                log::warn!("{}", diagnostic);
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
            Severity::Warning => {
                log::debug!("{}", diagnostic);
                self.warnings.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.reported.lock().push(diagnostic);
    }

    /// Number of errors reported so far
    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    /// Number of warnings reported so far
    pub fn warning_count(&self) -> usize {
        self.warnings.load(Ordering::Relaxed)
    }

    /// Whether any error was reported
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Snapshot of everything reported so far, in report order
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.reported.lock().clone()
    }

    /// Snapshot of the reported errors
    pub fn errors(&self) -> Vec<Diagnostic> {
        self.reported
            .lock()
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_order() {
        let sink = Diagnostics::new();
        let loc = Location::in_element("Main.run()V").at(12, 4);
        sink.error(&loc, "first");
        sink.warning(&loc, "second");
        sink.error(&Location::unknown(), "third");

        assert_eq!(sink.error_count(), 2);
        assert_eq!(sink.warning_count(), 1);
        assert!(sink.has_errors());
        let messages: Vec<String> = sink.diagnostics().into_iter().map(|d| d.message).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
        assert_eq!(sink.errors().len(), 2);
    }

    #[test]
    fn test_location_display() {
        let loc = Location {
            source_file: Some("Main.java".to_string()),
            element: Some("Main.run()V".to_string()),
            line: 7,
            bci: 3,
        };
        assert_eq!(loc.to_string(), "Main.java:7 (Main.run()V) @3");
        assert_eq!(Location::unknown().to_string(), "<unknown>");
    }
}
