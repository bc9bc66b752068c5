//! Diagnostic reporting for the Velo compiler.
//!
//! Provides the `Diagnostic` container used throughout code generation and
//! lightweight, rustc-style error printing to stderr. Errors are raised at
//! the deepest point of detection, carry the byte offset of the offending
//! node when available, and propagate up to the module assembler which
//! aggregates them per function.

use std::sync::atomic::{AtomicBool, Ordering};

/// Classification of a compilation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// No generator is registered for the syntactic category.
    UnsupportedSyntacticCategory,
    /// Operand types not accepted by a binary operator.
    UnsupportedBinaryOperator,
    /// Operand type not accepted by a unary operator.
    UnsupportedUnaryOperator,
    /// Assignment or argument coercion failed.
    TypeMismatch,
    /// Assignment to a non-assignable value.
    ReadOnlyTarget,
    /// Identifier without a slot; indicates an upstream resolver bug.
    UnresolvedSymbol,
    /// `break`/`continue`/`return` in an illegal position.
    UnstructuredControlFlow,
    /// The SSA verifier rejected an emitted function.
    MalformedFunction,
    /// Duplicate extern declaration with an incompatible signature.
    ExternSignatureConflict,
    /// Unexpected builder or emission failure.
    Internal,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::UnsupportedSyntacticCategory => "unsupported syntactic category",
            DiagnosticKind::UnsupportedBinaryOperator => "unsupported binary operator",
            DiagnosticKind::UnsupportedUnaryOperator => "unsupported unary operator",
            DiagnosticKind::TypeMismatch => "type mismatch",
            DiagnosticKind::ReadOnlyTarget => "read-only target",
            DiagnosticKind::UnresolvedSymbol => "unresolved symbol",
            DiagnosticKind::UnstructuredControlFlow => "unstructured control flow",
            DiagnosticKind::MalformedFunction => "malformed function",
            DiagnosticKind::ExternSignatureConflict => "extern signature conflict",
            DiagnosticKind::Internal => "internal error",
        }
    }
}

/// A single compilation error.
///
/// The optional `span_start` is a byte offset into the source text; when
/// present and source text is supplied to `emit_diagnostic`, the error is
/// rendered with a caret pointing at the offending column.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub file: Option<String>,
    pub note: Option<String>,
    pub span_start: Option<usize>,
}

/// Result alias used by every code generator.
pub type DiagnosticResult<T> = Result<T, Diagnostic>;

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, msg: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            message: msg.into(),
            file: None,
            note: None,
            span_start: None,
        }
    }

    pub fn with_span(kind: DiagnosticKind, msg: impl Into<String>, span_start: usize) -> Self {
        Diagnostic {
            kind,
            message: msg.into(),
            file: None,
            note: None,
            span_start: Some(span_start),
        }
    }

    /// Shorthand for unexpected builder failures.
    pub fn internal(msg: impl Into<String>) -> Self {
        Diagnostic::new(DiagnosticKind::Internal, msg)
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

static DIAGNOSTICS_ENABLED: AtomicBool = AtomicBool::new(true);

/// Globally enables or disables diagnostic printing (used by tests that
/// exercise error paths on purpose).
pub fn set_diagnostics_enabled(enabled: bool) {
    DIAGNOSTICS_ENABLED.store(enabled, Ordering::SeqCst);
}

/// Prints a compact, rustc-style diagnostic to stderr.
pub fn report_error(file: Option<&str>, source: Option<&str>, message: &str, note: Option<&str>) {
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    eprintln!("{}error{}: {}", red, reset, message);
    if let Some(path) = file {
        eprintln!("  --> {}", path);
    }

    if let Some(src) = source {
        // print up to first 6 lines for quick context
        for (i, line) in src.lines().enumerate().take(6) {
            eprintln!("{:4} | {}", i + 1, line);
        }
    }

    if let Some(note) = note {
        let blue = "\x1b[34m";
        eprintln!("{}note{}: {}", blue, reset, note);
    }
}

/// Prints a span-aware diagnostic with a caret pointing at the column of
/// `span_start` (a byte offset into `source`).
pub fn report_error_span(
    file: Option<&str>,
    source: &str,
    span_start: usize,
    message: &str,
    note: Option<&str>,
) {
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    // Compute line/column from the byte offset
    let mut byte_idx = 0usize;
    let mut line_no = 1usize;
    let mut col = 0usize;
    let mut found = false;
    for (lineno, line) in source.lines().enumerate() {
        let line_len = line.len() + 1; // include newline
        if span_start >= byte_idx && span_start < byte_idx + line_len {
            line_no = lineno + 1;
            col = span_start - byte_idx;
            found = true;
            break;
        }
        byte_idx += line_len;
    }
    if !found {
        line_no = source.lines().count().max(1);
        col = 0;
    }

    eprintln!("{}error{}: {}", red, reset, message);
    if let Some(path) = file {
        eprintln!("  --> {}:{}:{}", path, line_no, col + 1);
    }

    let lines: Vec<&str> = source.lines().collect();
    if !lines.is_empty() {
        let idx = line_no - 1;
        let start = idx.saturating_sub(1);
        let end = (idx + 1).min(lines.len() - 1);
        for i in start..=end {
            eprintln!("{:4} | {}", i + 1, lines[i]);
            if i == idx {
                let mut caret = String::new();
                for _ in 0..col {
                    caret.push(' ');
                }
                caret.push('^');
                eprintln!("     | {}", caret);
            }
        }
    }

    if let Some(note) = note {
        let blue = "\x1b[34m";
        eprintln!("{}note{}: {}", blue, reset, note);
    }
}

/// Emits a diagnostic, choosing span-aware rendering when both a span and
/// source text are available.
pub fn emit_diagnostic(d: &Diagnostic, source: Option<&str>) {
    if !DIAGNOSTICS_ENABLED.load(Ordering::SeqCst) {
        return;
    }
    let message = format!("{}: {}", d.kind.as_str(), d.message);
    if let (Some(span), Some(src)) = (d.span_start, source) {
        report_error_span(d.file.as_deref(), src, span, &message, d.note.as_deref());
    } else {
        report_error(d.file.as_deref(), source, &message, d.note.as_deref());
    }
}
