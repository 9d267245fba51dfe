//! Error types for this crate's two failure domains: internal invariant
//! violations (`CodegenError`, always a bug in this crate) and
//! user-visible semantic/capacity errors discovered while lowering a
//! program (`LowerError`). Kept separate because callers handle them
//! differently, a `CodegenError` should never reach a user, while a
//! `LowerError` is exactly the kind of thing a diagnostic gets printed
//! for.

use crate::ir::{FuncId, ModuleId};
use failure_derive::Fail;
use std::fmt;

/// An invariant this crate itself is supposed to maintain was violated.
/// Always fatal; there is no sensible way to keep compiling once one of
/// these fires.
#[derive(Fail, Debug)]
pub enum CodegenError {
    #[fail(display = "record size mismatch: encoded {} bytes, expected {}", encoded, expected)]
    SizeMismatch { encoded: u32, expected: u32 },

    #[fail(display = "negative jump distance where an unsigned encoding was selected")]
    NegativeUnsignedDistance,

    #[fail(display = "no relocation function registered for this reference kind")]
    MissingRelocationFunction,

    #[fail(display = "function body still has unresolved pending records at size-resolution time")]
    PendingRecordsUnresolved,

    #[fail(display = "dangling jump target: op references a label no longer in its function")]
    DanglingJumpTarget,

    #[fail(display = "size resolution did not converge after {} iterations", iterations)]
    SizeResolutionDidNotConverge { iterations: u32 },

    #[fail(display = "optimizer pass did not converge after {} iterations", iterations)]
    OptimizerDidNotConverge { iterations: u32 },
}

pub type CodegenResult<T> = Result<T, CodegenError>;

/// A semantic or resource-limit error discovered while lowering a
/// function or module. These are the errors a front-end driver would
/// format and show to a user via `Diagnostic`.
#[derive(Fail, Debug)]
pub enum LowerError {
    #[fail(display = "module has too many public+private methods (max 256)")]
    TooManyMethods,

    #[fail(display = "module has too many sub-objects (max 256)")]
    TooManySubObjects,

    #[fail(display = "duplicate case value {} in case statement", value)]
    DuplicateCaseValue { value: i32 },

    #[fail(display = "jump to label '{}' crosses hidden-variable depth from a conditional jump", label)]
    ConditionalDepthMismatch { label: String },

    #[fail(display = "goto to undefined label '{}'", label)]
    UndefinedLabel { label: String },

    #[fail(display = "value out of range for its target encoding: {}", value)]
    ValueOutOfRange { value: i64 },

    #[fail(display = "string literal exceeds maximum length ({} bytes)", len)]
    StringTooLong { len: usize },
}

pub type LowerResult<T> = Result<T, LowerError>;

/// `compile`'s error type: either lowering reported user-visible
/// diagnostics, or a later pass (optimizer, emission) hit a
/// `CodegenError`. Both are real, reachable outcomes for some input —
/// optimizer non-convergence on a pathological-but-valid function body is
/// not an invariant violation this crate can rule out ahead of time — so
/// `compile` returns this instead of panicking on either.
#[derive(Fail, Debug)]
pub enum CompileError {
    #[fail(display = "compilation failed: {}", _0)]
    Diagnostics(#[fail(cause)] DiagnosticsError),
    #[fail(display = "{}", _0)]
    Codegen(#[fail(cause)] CodegenError),
}

impl CompileError {
    /// The collected diagnostics, if lowering is why `compile` failed.
    pub fn diagnostics(&self) -> Option<&DiagnosticSink> {
        match self {
            CompileError::Diagnostics(d) => Some(&d.0),
            CompileError::Codegen(_) => None,
        }
    }
}

impl From<DiagnosticSink> for CompileError {
    fn from(sink: DiagnosticSink) -> Self {
        CompileError::Diagnostics(DiagnosticsError(sink))
    }
}

impl From<CodegenError> for CompileError {
    fn from(e: CodegenError) -> Self {
        CompileError::Codegen(e)
    }
}

/// Wraps `DiagnosticSink` so `CompileError::Diagnostics` can carry it as a
/// `#[fail(cause)]` (which needs its inner type to implement `Fail`,
/// `DiagnosticSink` itself has no `Display`/`Error` impl of its own).
#[derive(Debug)]
pub struct DiagnosticsError(pub DiagnosticSink);

impl fmt::Display for DiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} error(s)", self.0.error_count())
    }
}

impl std::error::Error for DiagnosticsError {}

/// Identifies where a diagnostic originated, for the `file:line:` prefix
/// `print_errors` formats (§6/§7).
#[derive(Copy, Clone, Debug, Default)]
pub struct SourceLoc {
    pub module: Option<ModuleId>,
    pub func: Option<FuncId>,
    pub line: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One accumulated diagnostic: a `LowerError` plus the source location it
/// was raised at. Distinct from `CodegenError` because many of these can
/// be collected across a whole compilation before the driver decides
/// whether to stop.
#[derive(Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub loc: SourceLoc,
    pub error: LowerError,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let tag = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}: {}: {}", self.loc.line, tag, self.error)
    }
}

/// An accumulating error channel, mirroring the legacy `gl_errors` counter:
/// lowering keeps going after a recoverable `LowerError` so a single
/// compile reports every problem it can find instead of stopping at the
/// first one.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
    error_count: u32,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        DiagnosticSink::default()
    }

    pub fn error(&mut self, loc: SourceLoc, error: LowerError) {
        self.error_count += 1;
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            loc,
            error,
        });
    }

    pub fn warning(&mut self, loc: SourceLoc, error: LowerError) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            loc,
            error,
        });
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_tracks_error_count_separately_from_warnings() {
        let mut sink = DiagnosticSink::new();
        sink.warning(SourceLoc::default(), LowerError::TooManyMethods);
        assert!(!sink.has_errors());
        sink.error(SourceLoc::default(), LowerError::TooManySubObjects);
        assert!(sink.has_errors());
        assert_eq!(sink.error_count(), 1);
        assert_eq!(sink.diagnostics().len(), 2);
    }
}
