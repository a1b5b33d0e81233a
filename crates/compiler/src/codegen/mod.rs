//! AST-directed emission of AS2 stack-machine assembly.
//!
//! The generator walks the AST depth-first with one visitor per node
//! kind and appends indented instruction lines to a buffer. Two
//! invariants govern every visitor: an expression leaves exactly one
//! value on the stack, and a statement leaves zero. Indentation follows
//! function nesting, never statement syntax.

mod expressions;
mod functions;
mod state;
mod statements;

pub use state::CodeGen;
pub(crate) use state::{Access, FunctionFrame, LoopFrame, RegisterScope, StackEffect, ValueUse};

use crate::ast::{Node, NodeKind};
use crate::error::{CompileError, ErrorKind};
use tracing::warn;

const INDENT: &str = "  ";

impl CodeGen<'_> {
    /// Generate instructions for a whole parse result (`File` or a bare
    /// `Program`).
    pub fn generate(&mut self, ast: &Node) -> Result<(), CompileError> {
        match &ast.kind {
            NodeKind::File { program } => self.generate(program),
            NodeKind::Program { body } => self.emit_statements(body),
            _ => Err(CompileError::at_node(
                ErrorKind::Internal,
                format!("expected File or Program at the top, got {}", ast.variant_name()),
                ast,
            )),
        }
    }

    /// Append one instruction line at the current depth.
    pub(crate) fn emit(&mut self, text: impl AsRef<str>) {
        self.lines
            .push(format!("{}{}", INDENT.repeat(self.depth), text.as_ref()));
    }

    /// Append a label line. Labels sit one indent level outside the code
    /// they precede.
    pub(crate) fn emit_label(&mut self, label: &str) {
        self.lines.push(format!(
            "{}{}:",
            INDENT.repeat(self.depth.saturating_sub(1)),
            label
        ));
    }

    pub(crate) fn indent(&mut self) {
        self.depth += 1;
    }

    pub(crate) fn deindent(&mut self) {
        if self.depth == 0 {
            warn!("indentation underflow clamped at zero");
            return;
        }
        self.depth -= 1;
    }

    pub(crate) fn fresh_label(&mut self, prefix: &str) -> String {
        let label = format!("{}{}", prefix, self.label_counter);
        self.label_counter += 1;
        label
    }
}

/// The operand text a literal compiles to, if the node is a literal that
/// becomes exactly one side-effect-free `push` (the `undefined`
/// identifier included).
pub(crate) fn literal_operand(node: &Node) -> Option<String> {
    match &node.kind {
        NodeKind::NumericLiteral { value } => Some(render_number(*value)),
        NodeKind::StringLiteral { value } => Some(quote_string(value)),
        NodeKind::BooleanLiteral { value } => {
            Some(if *value { "TRUE" } else { "FALSE" }.to_string())
        }
        NodeKind::NullLiteral => Some("NULL".to_string()),
        NodeKind::BigIntLiteral { value } => Some(value.clone()),
        NodeKind::RegExpLiteral { pattern, flags } => {
            Some(quote_string(&format!("/{}/{}", pattern, flags)))
        }
        NodeKind::Identifier { name } if name == "undefined" => Some("UNDEF".to_string()),
        _ => None,
    }
}

/// Render a numeric literal: whole values print without a fraction.
pub(crate) fn render_number(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() && value.abs() < 9_007_199_254_740_992.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Single-quote a string for the assembler, escaping control characters
/// and the quote/backslash.
pub(crate) fn quote_string(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('\'');
    for c in text.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '\u{0008}' => quoted.push_str("\\b"),
            '\u{000C}' => quoted.push_str("\\f"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            _ => quoted.push(c),
        }
    }
    quoted.push('\'');
    quoted
}
