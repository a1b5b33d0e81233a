//! Compile error types and source framing.
//!
//! Every failure is fatal: the pipeline stops, the error is framed
//! against the source text and the process exits non-zero. There is no
//! local recovery.

use crate::ast::{Node, SourceSpan};
use std::fmt;
use std::fmt::Write as _;

/// What went wrong. One variant per failure class the compiler can hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A node kind with no visitor at all.
    UnimplementedNode,
    /// A recognized node kind used in an unsupported shape.
    UnimplementedFeature,
    /// A binary/unary/assignment operator outside the supported set.
    UnsupportedOperator,
    /// The same name declared twice within one function.
    DuplicateDeclaration,
    /// `this` used where no register-variables context is in scope.
    ThisOutsideFunction,
    /// An initializer on a variable declared outside any function.
    GlobalsUnsupported,
    /// A call to an intrinsic the target has no equivalent for.
    UnsupportedIntrinsic,
    /// An intrinsic called with the wrong number of arguments.
    WrongArity,
    /// All 254 usable registers of the frame are taken.
    OutOfRegisters,
    /// A specific register id was requested but is already held.
    RegisterConflict,
    /// `break` with no enclosing loop.
    BreakOutsideLoop,
    /// A compiler directive with bad arguments.
    DirectiveMalformed,
    /// A compiler directive in a context where it is not allowed.
    DirectiveMisplaced,
    /// The stack simulator caught an impossible stack at `return`.
    StackInvariantViolation,
    /// The AST input could not be parsed at all.
    InvalidAst,
    /// A broken internal invariant; always a compiler bug.
    Internal,
}

impl ErrorKind {
    /// Short human label used as the error message prefix.
    pub fn describe(&self) -> &'static str {
        match self {
            ErrorKind::UnimplementedNode => "unsupported syntax",
            ErrorKind::UnimplementedFeature => "unsupported feature",
            ErrorKind::UnsupportedOperator => "unsupported operator",
            ErrorKind::DuplicateDeclaration => "duplicate declaration",
            ErrorKind::ThisOutsideFunction => "'this' outside a function",
            ErrorKind::GlobalsUnsupported => "global initializers unsupported",
            ErrorKind::UnsupportedIntrinsic => "unsupported intrinsic",
            ErrorKind::WrongArity => "wrong number of arguments",
            ErrorKind::OutOfRegisters => "out of registers",
            ErrorKind::RegisterConflict => "register conflict",
            ErrorKind::BreakOutsideLoop => "break outside a loop",
            ErrorKind::DirectiveMalformed => "malformed directive",
            ErrorKind::DirectiveMisplaced => "misplaced directive",
            ErrorKind::StackInvariantViolation => "stack invariant violation",
            ErrorKind::InvalidAst => "invalid AST input",
            ErrorKind::Internal => "internal compiler error",
        }
    }
}

/// A fatal compile error with the offending node's source location when
/// one is known.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Option<SourceSpan>,
}

impl CompileError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        CompileError {
            kind,
            message: message.into(),
            span: None,
        }
    }

    /// An error anchored to a specific AST node.
    pub fn at_node(kind: ErrorKind, message: impl Into<String>, node: &Node) -> Self {
        CompileError {
            kind,
            message: message.into(),
            span: Some(node.loc),
        }
    }

    /// Attach a location if the error does not carry one yet. Errors
    /// raised below the visitor layer (allocator, frames) gain their
    /// node's span this way.
    pub fn with_span(mut self, span: SourceSpan) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    /// Render the error as a framed snippet against the source text:
    ///
    /// ```text
    /// error: unsupported intrinsic: trace() has no runtime equivalent
    ///   --> input.js:3:5
    ///    |
    ///  3 |     trace('hi');
    ///    |     ^^^^^^^^^^^^
    /// ```
    pub fn frame(&self, file: &str, source: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "error: {}: {}", self.kind.describe(), self.message);
        let Some(span) = self.span else {
            return out;
        };
        let line_number = span.start.line;
        let _ = writeln!(out, "  --> {}:{}:{}", file, line_number, span.start.column + 1);
        let Some(text) = (line_number > 0)
            .then(|| source.lines().nth(line_number - 1))
            .flatten()
        else {
            return out;
        };
        let gutter = line_number.to_string().len().max(2);
        let _ = writeln!(out, "{:>width$} |", "", width = gutter);
        let _ = writeln!(out, "{:>width$} | {}", line_number, text, width = gutter);
        let underline_len = if span.end.line == span.start.line {
            span.end.column.saturating_sub(span.start.column).max(1)
        } else {
            text.chars().count().saturating_sub(span.start.column).max(1)
        };
        let _ = writeln!(
            out,
            "{:>width$} | {}{}",
            "",
            " ".repeat(span.start.column),
            "^".repeat(underline_len),
            width = gutter
        );
        out
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.describe(), self.message)?;
        if let Some(span) = &self.span {
            write!(
                f,
                " at line {}, column {}",
                span.start.line,
                span.start.column + 1
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}
