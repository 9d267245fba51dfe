//! Formatting `Diagnostic`s and `CodegenError`s for display (§6/§7).
//!
//! A `Diagnostic` only carries a `SourceLoc`, which has no literal file
//! path of its own, `module`/`func` are ids into the `Program` being
//! compiled. Resolving the `file:line:` prefix therefore needs the
//! `Program` alongside the diagnostic: the module's own `name` stands in
//! for its source file, matching the legacy compiler's one-module-per-file
//! convention.

use crate::ir::program::Program;
use crate::result::{CodegenError, Diagnostic, DiagnosticSink, Severity};
use std::fmt;
use std::fmt::Write;

/// The file name a diagnostic's location is reported against, falling
/// back to `<unknown>` for a `SourceLoc` that was never attached to a
/// module (a bug in this crate, not something a real diagnostic should
/// hit, but `fmt::Display` can't fail so we don't want to panic here).
fn file_name<'a>(program: &'a Program, diag: &Diagnostic) -> &'a str {
    match diag.loc.module {
        Some(id) => program.modules.get(id).map(|m| &*m.name).unwrap_or("<unknown>"),
        None => "<unknown>",
    }
}

/// Formats one diagnostic as `file:line: error: message` (or `warning:`),
/// the format described in §6/§7.
pub fn format_diagnostic(program: &Program, diag: &Diagnostic) -> String {
    let tag = match diag.severity {
        Severity::Warning => "warning",
        Severity::Error => "error",
    };
    format!("{}:{}: {}: {}", file_name(program, diag), diag.loc.line, tag, diag.error)
}

/// Writes every diagnostic in `sink`, one per line, in the order they were
/// recorded. Returns the combined text; callers decide whether that goes
/// to stderr, a log file, or an IDE's problem list.
pub fn format_diagnostics(program: &Program, sink: &DiagnosticSink) -> String {
    let mut out = String::new();
    for diag in sink.diagnostics() {
        let _ = writeln!(out, "{}", format_diagnostic(program, diag));
    }
    out
}

/// Writes every diagnostic in `sink` to `w`, one per line.
pub fn write_diagnostics(w: &mut dyn fmt::Write, program: &Program, sink: &DiagnosticSink) -> fmt::Result {
    for diag in sink.diagnostics() {
        writeln!(w, "{}", format_diagnostic(program, diag))?;
    }
    Ok(())
}

/// Formats an internal `CodegenError`. Unlike `Diagnostic`, these have no
/// source location worth reporting, they mean this crate's own
/// invariants broke, not that the input program was invalid, so this is
/// just `err.to_string()` under a name that matches the rest of this
/// module's vocabulary.
pub fn pretty_error(err: &CodegenError) -> String {
    err.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::entities::ModuleId;
    use crate::ir::module::Module;
    use crate::result::{LowerError, SourceLoc};
    use p1bc_entity::EntityRef;

    #[test]
    fn formats_file_line_severity_message() {
        let mut program = Program::new();
        program.add_module(Module::new("foo.spin"));
        let mut sink = DiagnosticSink::new();
        sink.error(SourceLoc { module: Some(ModuleId::new(0)), func: None, line: 42 }, LowerError::TooManyMethods);
        let text = format_diagnostics(&program, &sink);
        assert_eq!(text, "foo.spin:42: error: module has too many public+private methods (max 256)\n");
    }

    #[test]
    fn warning_severity_uses_warning_tag() {
        let mut program = Program::new();
        program.add_module(Module::new("bar.spin"));
        let mut sink = DiagnosticSink::new();
        sink.warning(SourceLoc { module: Some(ModuleId::new(0)), func: None, line: 7 }, LowerError::TooManySubObjects);
        let text = format_diagnostics(&program, &sink);
        assert!(text.starts_with("bar.spin:7: warning:"));
    }

    #[test]
    fn missing_module_falls_back_to_unknown() {
        let program = Program::new();
        let mut sink = DiagnosticSink::new();
        sink.error(SourceLoc { module: None, func: None, line: 1 }, LowerError::TooManyMethods);
        let text = format_diagnostics(&program, &sink);
        assert!(text.starts_with("<unknown>:1: error:"));
    }
}
