use nu_ansi_term::{Color, Style};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How serious a compiler-reported condition is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Note,
    Other,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
            Severity::Other => "other",
        }
    }

    fn color(&self) -> Color {
        match self {
            Severity::Error => Color::Red,
            Severity::Warning => Color::Yellow,
            Severity::Note => Color::Blue,
            Severity::Other => Color::Green,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured record recovered from the compiler output.
///
/// Unlocated diagnostics (general compiler or JVM failures, prefix-only blocks,
/// salvaged stack traces) carry no file and zeroed positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub file: Option<String>,
    pub start_line: i32,
    pub start_column: usize,
    pub end_line: i32,
    pub end_column: usize,
    pub message: String,
}

impl Diagnostic {
    /// A diagnostic without source location. Trailing whitespace is dropped.
    pub fn unlocated(severity: Severity, message: impl Into<String>) -> Self {
        let message: String = message.into();
        Diagnostic {
            severity,
            file: None,
            start_line: 0,
            start_column: 0,
            end_line: 0,
            end_column: 0,
            message: message.trim_end().to_string(),
        }
    }

    pub fn positioned(
        severity: Severity,
        file: impl Into<String>,
        line: i32,
        start_column: usize,
        end_column: usize,
        message: impl Into<String>,
    ) -> Self {
        let message: String = message.into();
        Diagnostic {
            severity,
            file: Some(file.into()),
            start_line: line,
            start_column,
            end_line: line,
            end_column,
            message: message.trim_end().to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn has_location(&self) -> bool {
        self.file.is_some()
    }

    /// `file:line:column` for located diagnostics.
    pub fn lineref(&self) -> Option<String> {
        self.file
            .as_ref()
            .map(|file| format!("{}:{}:{}", file, self.start_line, self.start_column))
    }

    /// Terminal rendering; the severity is colored and the lineref underlined
    /// when `uses_color` is set.
    pub fn render(&self, uses_color: bool) -> String {
        let level = self.severity.as_str();
        let level = if uses_color {
            self.severity.color().bold().paint(level).to_string()
        } else {
            level.to_string()
        };
        match self.lineref() {
            Some(lineref) if uses_color => format!(
                "{} {}: {}",
                Style::new().underline().paint(lineref),
                level,
                self.message
            ),
            Some(lineref) => format!("{}: {}: {}", lineref, level, self.message),
            None => format!("{}: {}", level, self.message),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

/// Exit code and output text exactly as produced by one compiler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOutput {
    pub exit_code: i32,
    pub text: String,
}

/// Result of a compilation: success derived from the exit code plus the
/// diagnostics in the order they appeared in the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileOutcome {
    success: bool,
    diagnostics: Vec<Diagnostic>,
}

impl CompileOutcome {
    /// A nonzero exit code is a failure even when nothing could be parsed.
    pub fn from_exit_code(exit_code: i32, diagnostics: Vec<Diagnostic>) -> Self {
        CompileOutcome {
            success: exit_code == 0,
            diagnostics,
        }
    }

    /// Outcome for a compilation that had nothing to compile.
    pub fn empty() -> Self {
        CompileOutcome {
            success: true,
            diagnostics: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// One-line summary, e.g. `FAILED: 2 errors, 1 warning`.
    pub fn summary(&self) -> String {
        let errors = self.errors().count();
        let warnings = self.warnings().count();
        format!(
            "{}: {} error{}, {} warning{}",
            if self.success { "OK" } else { "FAILED" },
            errors,
            if errors == 1 { "" } else { "s" },
            warnings,
            if warnings == 1 { "" } else { "s" }
        )
    }
}
