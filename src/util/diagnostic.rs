//! Coded diagnostics sink.
//!
//! Every free-form diagnostic carries a stable `<letter><number>` code
//! (`M204`, `XML113`, ...) mapped to a parameterized message template.
//! `DiagnosticContext` is an explicit object threaded through the pipeline
//! — not a singleton — so a fresh run starts with a clean counter and
//! suppress list.
//!
//! A handful of error *types* that need rich rendering (pack version
//! conflicts, SVD field overlaps) stay `thiserror`+`miette` structured
//! errors rather than going through the coded sink.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use miette::{Diagnostic as MietteDiagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// A single location-tagged diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl Diagnostic {
    pub fn format(&self, color: bool) -> String {
        let severity_str = if color {
            match self.severity {
                Severity::Info => "\x1b[1;36minfo\x1b[0m",
                Severity::Warning => "\x1b[1;33mwarning\x1b[0m",
                Severity::Error => "\x1b[1;31merror\x1b[0m",
                Severity::Critical => "\x1b[1;35mcritical\x1b[0m",
            }
        } else {
            match self.severity {
                Severity::Info => "info",
                Severity::Warning => "warning",
                Severity::Error => "error",
                Severity::Critical => "critical",
            }
        };

        let mut out = format!("{} {}: {}", severity_str, self.code, self.message);
        if let Some(file) = &self.file {
            out.push_str(&format!("\n  --> {}", file.display()));
            if let Some(line) = self.line {
                out.push_str(&format!(":{line}"));
                if let Some(col) = self.column {
                    out.push_str(&format!(":{col}"));
                }
            }
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Codes that strict mode promotes from warning to error.
const STRICT_PROMOTED_CODES: &[&str] = &["M351", "M352", "M353", "CV_H001"];

/// Codes that cannot be suppressed; attempting to suppress one emits a
/// one-time `M017` meta-diagnostic instead (resolved Open Question, see
/// DESIGN.md).
const NON_SUPPRESSIBLE_CODES: &[&str] = &["M001", "M002"];

/// The diagnostic sink for one pipeline run.
#[derive(Debug, Default)]
pub struct DiagnosticContext {
    diagnostics: Vec<Diagnostic>,
    suppressed: HashSet<String>,
    strict: bool,
    error_count: u32,
    warning_count: u32,
}

impl DiagnosticContext {
    pub fn new(strict: bool) -> Self {
        DiagnosticContext {
            strict,
            ..Default::default()
        }
    }

    /// Suppress a code for the remainder of this run. `!<code>` un-suppresses
    /// a code suppressed by an earlier, broader entry.
    pub fn set_suppress(&mut self, entry: &str) {
        if let Some(code) = entry.strip_prefix('!') {
            self.suppressed.remove(code);
            return;
        }
        if NON_SUPPRESSIBLE_CODES.contains(&entry) {
            self.emit(Diagnostic {
                code: "M017".to_string(),
                severity: Severity::Info,
                message: format!("diagnostic '{entry}' cannot be suppressed, ignoring"),
                file: None,
                line: None,
                column: None,
            });
            return;
        }
        self.suppressed.insert(entry.to_string());
    }

    fn effective_severity(&self, code: &str, requested: Severity) -> Severity {
        if self.strict && requested == Severity::Warning && STRICT_PROMOTED_CODES.contains(&code) {
            Severity::Error
        } else {
            requested
        }
    }

    fn record(&mut self, code: &str, severity: Severity, message: String, location: Location) {
        if self.suppressed.contains(code) {
            return;
        }
        let severity = self.effective_severity(code, severity);
        match severity {
            Severity::Error | Severity::Critical => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
            Severity::Info => {}
        }
        self.diagnostics.push(Diagnostic {
            code: code.to_string(),
            severity,
            message,
            file: location.file,
            line: location.line,
            column: location.column,
        });
    }

    /// Emit a fully-formed diagnostic (used for the `M017` meta-diagnostic
    /// and by callers that already built the message text).
    pub fn emit(&mut self, diag: Diagnostic) {
        self.record(&diag.code.clone(), diag.severity, diag.message, Location {
            file: diag.file,
            line: diag.line,
            column: diag.column,
        });
    }

    /// Variadic-free message call: a code, a key-value parameter slice, and
    /// an optional location, instead of a combinatorial set of
    /// positional-overload message builders.
    pub fn error(&mut self, code: &str, params: &[(&str, &str)], location: Location) {
        self.record(code, Severity::Error, render_template(code, params), location);
    }

    pub fn warn(&mut self, code: &str, params: &[(&str, &str)], location: Location) {
        self.record(code, Severity::Warning, render_template(code, params), location);
    }

    pub fn info(&mut self, code: &str, params: &[(&str, &str)], location: Location) {
        self.record(code, Severity::Info, render_template(code, params), location);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn warning_count(&self) -> u32 {
        self.warning_count
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Process exit code: 0 clean, 1 errors, 2 warnings-only in strict mode.
    pub fn exit_code(&self) -> i32 {
        if self.has_errors() {
            1
        } else if self.strict && self.warning_count > 0 {
            2
        } else {
            0
        }
    }

    pub fn emit_all(&self, color: bool) {
        for diag in &self.diagnostics {
            eprintln!("{}", diag.format(color));
        }
    }
}

/// A source location for a diagnostic.
#[derive(Debug, Clone, Default)]
pub struct Location {
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl Location {
    pub fn none() -> Self {
        Location::default()
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Location {
            file: Some(path.into()),
            line: None,
            column: None,
        }
    }

    pub fn at(path: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        Location {
            file: Some(path.into()),
            line: Some(line),
            column: Some(column),
        }
    }
}

fn render_template(code: &str, params: &[(&str, &str)]) -> String {
    let template = message_template(code);
    let mut out = template.to_string();
    for (key, value) in params {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

/// The message-template table. Unknown codes render as their own name so a
/// missing catalog entry is visible rather than silently dropped.
fn message_template(code: &str) -> &'static str {
    match code {
        "M017" => "diagnostic '{code}' cannot be suppressed, ignoring",
        "M204" => "pack '{pack}' version '{version}' not found in any installed repository",
        "M205" => "filter '{pattern}' matched no context",
        "M206" => "component resolution failed for context '{context}': {detail}",
        "M207" => "layer file could not be loaded: {detail}",
        "M208" => "layer '{consumer}' could not satisfy connection '{key}'",
        "M240" => "tag '{tag}' is not allowed at this dimension level",
        "M241" => "'{node}' has a cyclic derivedFrom reference",
        "M242" => "'{node}' derivedFrom reference '{reference}' could not be resolved",
        "M250" => "duplicate name '{name}' in this scope",
        "M260" => "peripheral '{peripheral}' address block overlaps peripheral '{other}'",
        "M261" => "register '{register}' address offset overlaps register '{other}' in peripheral '{peripheral}'",
        "M270" => "enumerated value '{name}' exceeds the bit width of field '{field}'",
        "M280" => "'{name}' is a reserved word and may not be used as an identifier",
        "M281" => "'{name}' may not start with an underscore",
        "M282" => "'{name}' is longer than 32 characters",
        "M283" => "'{name}' contains '%' outside a dim-expansion template",
        "M284" => "'{name}' contains a backslash; use forward slashes",
        "M290" => "'{name}' has an invalid disableCondition expression: {detail}",
        "XML113" => "malformed XML document: {detail}",
        "CV_H001" => "field '{field}' overlaps a previously defined field in register '{register}'",
        _ => "{message}",
    }
}

/// Common suggestion text, kept for the rare boundary error that still
/// needs a human-facing hint alongside its coded diagnostic.
pub mod suggestions {
    pub const NO_SOLUTION: &str = "help: pass --solution <file> or run from a directory containing one *.csolution.yml file";
    pub const PACK_NOT_INSTALLED: &str = "help: install the pack into CMSIS_PACK_ROOT or relax the version constraint";
    pub const STALE_INDEX: &str = "help: re-run with --update-idx to refresh the pack index";
}

/// Pack version conflict: no installed version satisfies every constraint.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("version conflict for pack `{pack}`")]
#[diagnostic(
    code(csolution::resolve::version_conflict),
    help("narrow one of the conflicting constraints, or install an additional pack version")
)]
pub struct VersionConflictError {
    pub pack: String,
    #[source_code]
    pub src: Option<NamedSource<String>>,
    #[label("required here")]
    pub span: Option<SourceSpan>,
    pub requirements: Vec<String>,
}

/// Component selector matched no catalog entry.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("could not find component `{selector}` in any loaded pack")]
#[diagnostic(code(csolution::resolve::component_not_found))]
pub struct ComponentNotFoundError {
    pub selector: String,
    #[help]
    pub suggestion: Option<String>,
}

/// SVD field bit-range overlap.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("field `{field}` overlaps field `{other}` in register `{register}`")]
#[diagnostic(
    code(csolution::svd::field_overlap),
    help("adjust bitOffset/bitWidth so the two fields no longer share bits")
)]
pub struct FieldOverlapError {
    pub register: String,
    pub field: String,
    pub other: String,
}

/// Layer connection resolution found no consistent assignment.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("no combination of layers satisfies every consumed connection")]
#[diagnostic(code(csolution::layers::unsatisfiable))]
pub struct LayerConnectionError {
    pub unsatisfied: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppressed_code_is_dropped() {
        let mut ctx = DiagnosticContext::new(false);
        ctx.set_suppress("M204");
        ctx.error("M204", &[("pack", "ARM::CMSIS"), ("version", "9.9.9")], Location::none());
        assert_eq!(ctx.diagnostics().len(), 0);
        assert_eq!(ctx.error_count(), 0);
    }

    #[test]
    fn non_suppressible_code_emits_meta_diagnostic() {
        let mut ctx = DiagnosticContext::new(false);
        ctx.set_suppress("M001");
        assert_eq!(ctx.diagnostics().len(), 1);
        assert_eq!(ctx.diagnostics()[0].code, "M017");
    }

    #[test]
    fn strict_mode_promotes_listed_warnings_to_errors() {
        let mut ctx = DiagnosticContext::new(true);
        ctx.warn("M351", &[], Location::none());
        assert_eq!(ctx.error_count(), 1);
        assert_eq!(ctx.warning_count(), 0);
    }

    #[test]
    fn exit_code_reflects_counters() {
        let mut clean = DiagnosticContext::new(false);
        assert_eq!(clean.exit_code(), 0);

        let mut with_error = DiagnosticContext::new(false);
        with_error.error("M204", &[], Location::none());
        assert_eq!(with_error.exit_code(), 1);

        let mut strict_warn = DiagnosticContext::new(true);
        strict_warn.warn("XML113", &[("detail", "x")], Location::none());
        assert_eq!(strict_warn.exit_code(), 0);
    }

    #[test]
    fn template_substitution_fills_named_placeholders() {
        let mut ctx = DiagnosticContext::new(false);
        ctx.error(
            "M204",
            &[("pack", "ARM::CMSIS"), ("version", "9.9.9")],
            Location::none(),
        );
        assert_eq!(
            ctx.diagnostics()[0].message,
            "pack 'ARM::CMSIS' version '9.9.9' not found in any installed repository"
        );
    }
}
