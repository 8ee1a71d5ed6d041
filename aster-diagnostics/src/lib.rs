// Diagnostic system for the Aster semantic core
// Carries source locations and categorized, ordered error reports

use colored::Colorize;
use serde::Serialize;
use std::fmt;

/// Source code location: file, line, column and absolute byte offset.
/// Immutable; copied by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: usize, column: usize, offset: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
            offset,
        }
    }

    /// Derive line/column from a byte span over the source text.
    pub fn from_source(file: &str, source: &str, offset: usize) -> Self {
        let clamped = offset.min(source.len());
        let before = &source[..clamped];
        let line = before.chars().filter(|&c| c == '\n').count() + 1;
        let column = before
            .rfind('\n')
            .map_or(before.len() + 1, |pos| before.len() - pos);

        Self {
            file: file.to_string(),
            line,
            column,
            offset: clamped,
        }
    }

    pub fn unknown() -> Self {
        Self {
            file: "<unknown>".to_string(),
            line: 0,
            column: 0,
            offset: 0,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Diagnostic severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Note,
    Help,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "{}", "error".red().bold()),
            Severity::Warning => write!(f, "{}", "warning".yellow().bold()),
            Severity::Note => write!(f, "{}", "note".cyan().bold()),
            Severity::Help => write!(f, "{}", "help".green().bold()),
        }
    }
}

/// Closed set of diagnostic categories used across the semantic core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticKind {
    InvalidOperation,
    InvalidType,
    InvalidAnnotation,
    DuplicateSymbol,
    UndefinedSymbol,
    TypeMismatch,
    IncompatibleTypes,
    TypeInferenceFailed,
    ImmutableModification,
    OwnershipTransferViolation,
    OwnershipFfiBoundary,
    GenericArgMismatch,
    CyclicInstantiation,
}

impl DiagnosticKind {
    /// Stable code string for IDEs and downstream tooling.
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::InvalidOperation => "A0001",
            DiagnosticKind::InvalidType => "A0002",
            DiagnosticKind::InvalidAnnotation => "A0003",
            DiagnosticKind::DuplicateSymbol => "A0428",
            DiagnosticKind::UndefinedSymbol => "A0425",
            DiagnosticKind::TypeMismatch => "A0308",
            DiagnosticKind::IncompatibleTypes => "A0309",
            DiagnosticKind::TypeInferenceFailed => "A0282",
            DiagnosticKind::ImmutableModification => "A0594",
            DiagnosticKind::OwnershipTransferViolation => "A0712",
            DiagnosticKind::OwnershipFfiBoundary => "A0713",
            DiagnosticKind::GenericArgMismatch => "A0107",
            DiagnosticKind::CyclicInstantiation => "A0391",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            DiagnosticKind::InvalidOperation => "INVALID_OPERATION",
            DiagnosticKind::InvalidType => "INVALID_TYPE",
            DiagnosticKind::InvalidAnnotation => "INVALID_ANNOTATION",
            DiagnosticKind::DuplicateSymbol => "DUPLICATE_SYMBOL",
            DiagnosticKind::UndefinedSymbol => "UNDEFINED_SYMBOL",
            DiagnosticKind::TypeMismatch => "TYPE_MISMATCH",
            DiagnosticKind::IncompatibleTypes => "INCOMPATIBLE_TYPES",
            DiagnosticKind::TypeInferenceFailed => "TYPE_INFERENCE_FAILED",
            DiagnosticKind::ImmutableModification => "IMMUTABLE_MODIFICATION",
            DiagnosticKind::OwnershipTransferViolation => "OWNERSHIP_TRANSFER_VIOLATION",
            DiagnosticKind::OwnershipFfiBoundary => "OWNERSHIP_FFI_BOUNDARY",
            DiagnosticKind::GenericArgMismatch => "GENERIC_ARG_MISMATCH",
            DiagnosticKind::CyclicInstantiation => "CYCLIC_INSTANTIATION",
        };
        write!(f, "{}", name)
    }
}

/// A single categorized report with location and formatted message.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    pub location: SourceLocation,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        kind: DiagnosticKind,
        message: String,
        location: SourceLocation,
    ) -> Self {
        Self {
            severity,
            kind,
            message,
            location,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn error(kind: DiagnosticKind, message: String, location: SourceLocation) -> Self {
        Self::new(Severity::Error, kind, message, location)
    }

    pub fn warning(kind: DiagnosticKind, message: String, location: SourceLocation) -> Self {
        Self::new(Severity::Warning, kind, message, location)
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    fn render(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{}[{}]: {}\n",
            self.severity,
            self.kind.code(),
            self.message.bold()
        ));

        output.push_str(&format!(" {} {}\n", "-->".cyan().bold(), self.location));

        for note in &self.notes {
            output.push_str(&format!(" {} {}\n", "=".cyan().bold(), note.cyan()));
        }

        if let Some(help) = &self.help {
            output.push_str(&format!(" {} {}\n", "help:".green().bold(), help));
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// Ordered diagnostic accumulator. Emission never aborts analysis.
#[derive(Debug, Default)]
pub struct DiagnosticEngine {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
}

impl DiagnosticEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
            _ => {}
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn emit_error(&mut self, kind: DiagnosticKind, message: String, location: SourceLocation) {
        self.emit(Diagnostic::error(kind, message, location));
    }

    pub fn emit_warning(
        &mut self,
        kind: DiagnosticKind,
        message: String,
        location: SourceLocation,
    ) {
        self.emit(Diagnostic::warning(kind, message, location));
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Print all diagnostics to stderr in source order.
    pub fn print_all(&self) {
        for diag in &self.diagnostics {
            eprintln!("{}", diag);
        }
    }

    /// Export diagnostics as JSON for IDEs and tooling.
    pub fn to_json(&self) -> String {
        #[derive(Serialize)]
        struct Report<'a> {
            diagnostics: &'a [Diagnostic],
            errors: usize,
            warnings: usize,
        }

        serde_json::to_string(&Report {
            diagnostics: &self.diagnostics,
            errors: self.error_count,
            warnings: self.warning_count,
        })
        .unwrap_or_else(|_| "{\"diagnostics\":[]}".to_string())
    }

    pub fn clear(&mut self) {
        self.diagnostics.clear();
        self.error_count = 0;
        self.warning_count = 0;
    }
}

/// Helpers for the recurring report shapes in the analyzer.
impl DiagnosticEngine {
    pub fn type_mismatch(&mut self, expected: &str, found: &str, location: SourceLocation) {
        self.emit(
            Diagnostic::error(
                DiagnosticKind::TypeMismatch,
                "mismatched types".to_string(),
                location,
            )
            .with_note(format!("expected `{}`, found `{}`", expected, found)),
        );
    }

    pub fn undefined_symbol(&mut self, name: &str, location: SourceLocation, candidates: &[String]) {
        let mut diag = Diagnostic::error(
            DiagnosticKind::UndefinedSymbol,
            format!("cannot find `{}` in this scope", name),
            location,
        );

        let suggestions = fuzzy::find_similar_names(name, candidates, 0.7, 3);
        if !suggestions.is_empty() {
            diag = diag.with_help(format!("did you mean `{}`?", suggestions.join("`, `")));
        }

        self.emit(diag);
    }

    pub fn immutable_modification(&mut self, name: &str, location: SourceLocation) {
        self.emit(
            Diagnostic::error(
                DiagnosticKind::ImmutableModification,
                format!("cannot assign to immutable variable `{}`", name),
                location,
            )
            .with_help(format!("declare with `mut` to allow assignment: `let mut {}`", name)),
        );
    }

    pub fn argument_count_mismatch(
        &mut self,
        fn_name: &str,
        expected: usize,
        found: usize,
        location: SourceLocation,
    ) {
        self.emit(
            Diagnostic::error(
                DiagnosticKind::InvalidOperation,
                format!(
                    "function `{}` takes {} argument{} but {} {} supplied",
                    fn_name,
                    expected,
                    if expected == 1 { "" } else { "s" },
                    found,
                    if found == 1 { "was" } else { "were" }
                ),
                location,
            ),
        );
    }

    pub fn unused_symbol(&mut self, name: &str, location: SourceLocation) {
        self.emit(
            Diagnostic::warning(
                DiagnosticKind::InvalidOperation,
                format!("unused variable: `{}`", name),
                location,
            )
            .with_help(format!("prefix with `_` to silence: `_{}`", name)),
        );
    }
}

/// Fuzzy matching for "did you mean?" suggestions
pub mod fuzzy {
    use strsim::jaro_winkler;

    /// Find names similar to `target` with similarity above `threshold`,
    /// best matches first.
    pub fn find_similar_names(
        target: &str,
        candidates: &[String],
        threshold: f64,
        max_suggestions: usize,
    ) -> Vec<String> {
        let mut scored: Vec<(String, f64)> = candidates
            .iter()
            .map(|candidate| (candidate.clone(), jaro_winkler(target, candidate)))
            .filter(|(_, score)| *score > threshold)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(max_suggestions)
            .map(|(name, _)| name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_from_source() {
        let source = "pub fn f(none) -> void {\n    let x: i32 = 1;\n}";
        let loc = SourceLocation::from_source("test.ast", source, source.find("let").unwrap_or(0));
        assert_eq!(loc.line, 2);
        assert_eq!(loc.column, 5);
    }

    #[test]
    fn test_engine_counts_and_order() {
        let mut engine = DiagnosticEngine::new();
        engine.emit_error(
            DiagnosticKind::TypeMismatch,
            "mismatched types".to_string(),
            SourceLocation::unknown(),
        );
        engine.emit_warning(
            DiagnosticKind::InvalidOperation,
            "unused variable: `x`".to_string(),
            SourceLocation::unknown(),
        );

        assert!(engine.has_errors());
        assert_eq!(engine.error_count(), 1);
        assert_eq!(engine.warning_count(), 1);
        assert_eq!(engine.diagnostics()[0].kind, DiagnosticKind::TypeMismatch);
    }

    #[test]
    fn test_kind_codes_are_stable() {
        assert_eq!(DiagnosticKind::TypeMismatch.code(), "A0308");
        assert_eq!(DiagnosticKind::ImmutableModification.code(), "A0594");
        assert_eq!(format!("{}", DiagnosticKind::OwnershipFfiBoundary), "OWNERSHIP_FFI_BOUNDARY");
    }

    #[test]
    fn test_json_export() {
        let mut engine = DiagnosticEngine::new();
        engine.emit_error(
            DiagnosticKind::UndefinedSymbol,
            "cannot find `foo` in this scope".to_string(),
            SourceLocation::new("main.ast", 3, 9, 41),
        );

        let json = engine.to_json();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["errors"], 1);
        assert_eq!(parsed["diagnostics"][0]["kind"], "UNDEFINED_SYMBOL");
        assert_eq!(parsed["diagnostics"][0]["location"]["line"], 3);
    }

    #[test]
    fn test_fuzzy_suggestions() {
        let candidates = vec![
            "counter".to_string(),
            "count".to_string(),
            "unrelated".to_string(),
        ];
        let found = fuzzy::find_similar_names("cuont", &candidates, 0.7, 3);
        assert!(found.contains(&"count".to_string()));
        assert!(!found.contains(&"unrelated".to_string()));
    }
}
