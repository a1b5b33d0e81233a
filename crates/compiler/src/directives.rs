//! Comment-embedded compiler directives.
//!
//! Code meant to be pasted into an externally defined function can tell
//! the compiler which VM registers that function provides:
//!
//! ```text
//! // @js2f/push-register-context: r:1=velocity r:2=steering
//! velocity = velocity + 1;
//! // @js2f/pop-register-context
//! ```
//!
//! Directives ride on line comments around statements and only
//! manipulate the register-variables contexts; they never emit code.

use crate::ast::{Comment, CommentKind};
use crate::codegen::{CodeGen, RegisterScope};
use crate::error::{CompileError, ErrorKind};
use crate::registers::{MAX_REGISTER, MIN_REGISTER, Register};
use std::collections::HashMap;

/// Namespace shared by all directives.
pub const DIRECTIVE_PREFIX: &str = "@js2f/";

const PUSH_REGISTER_CONTEXT: &str = "push-register-context";
const POP_REGISTER_CONTEXT: &str = "pop-register-context";

impl CodeGen<'_> {
    /// Apply any directives in `comments`. The parser hands the same
    /// comment to two neighbouring nodes, so each one is applied at most
    /// once, keyed by its start offset.
    pub(crate) fn process_directives(
        &mut self,
        comments: &[Comment],
    ) -> Result<(), CompileError> {
        for comment in comments {
            if comment.kind != CommentKind::CommentLine {
                continue;
            }
            let text = comment.value.trim();
            if !text.starts_with(DIRECTIVE_PREFIX) {
                continue;
            }
            if !self.processed_comments.insert(comment.start) {
                continue;
            }
            self.apply_directive(comment, &text[DIRECTIVE_PREFIX.len()..])?;
        }
        Ok(())
    }

    fn apply_directive(&mut self, comment: &Comment, body: &str) -> Result<(), CompileError> {
        if let Some(arguments) = body.strip_prefix(PUSH_REGISTER_CONTEXT) {
            let Some(arguments) = arguments.strip_prefix(':') else {
                return Err(directive_error(
                    ErrorKind::DirectiveMalformed,
                    format!(
                        "expected '{}{}: r:<id>=<name> ...'",
                        DIRECTIVE_PREFIX, PUSH_REGISTER_CONTEXT
                    ),
                    comment,
                ));
            };
            if self.inside_function() {
                return Err(directive_error(
                    ErrorKind::DirectiveMisplaced,
                    "register contexts cannot be pushed inside a function",
                    comment,
                ));
            }
            let bindings = parse_register_bindings(arguments, comment)?;
            self.scopes.push(RegisterScope::Explicit(bindings));
            return Ok(());
        }
        if body == POP_REGISTER_CONTEXT {
            return match self.scopes.last() {
                Some(RegisterScope::Explicit(_)) => {
                    self.scopes.pop();
                    Ok(())
                }
                Some(RegisterScope::Function) => Err(directive_error(
                    ErrorKind::DirectiveMisplaced,
                    "cannot pop a function's own register context",
                    comment,
                )),
                None => Err(directive_error(
                    ErrorKind::DirectiveMisplaced,
                    "no register context to pop",
                    comment,
                )),
            };
        }
        Err(directive_error(
            ErrorKind::DirectiveMalformed,
            format!("unknown directive '{}{}'", DIRECTIVE_PREFIX, body),
            comment,
        ))
    }
}

fn directive_error(
    kind: ErrorKind,
    message: impl Into<String>,
    comment: &Comment,
) -> CompileError {
    CompileError::new(kind, message).with_span(comment.loc)
}

/// Parse `r:<id>=<name>` bindings, one per whitespace-separated entry.
fn parse_register_bindings(
    arguments: &str,
    comment: &Comment,
) -> Result<HashMap<String, Register>, CompileError> {
    let mut bindings = HashMap::new();
    let mut used_ids = Vec::new();
    for entry in arguments.split_whitespace() {
        let Some(rest) = entry.strip_prefix("r:") else {
            return Err(directive_error(
                ErrorKind::DirectiveMalformed,
                format!("'{}' is not of the form r:<id>=<name>", entry),
                comment,
            ));
        };
        let Some((id_text, name)) = rest.split_once('=') else {
            return Err(directive_error(
                ErrorKind::DirectiveMalformed,
                format!("'{}' is not of the form r:<id>=<name>", entry),
                comment,
            ));
        };
        let id: u8 = id_text.parse().map_err(|_| {
            directive_error(
                ErrorKind::DirectiveMalformed,
                format!("'{}' is not a register id", id_text),
                comment,
            )
        })?;
        if !(MIN_REGISTER..=MAX_REGISTER).contains(&id) {
            return Err(directive_error(
                ErrorKind::DirectiveMalformed,
                format!(
                    "register id {} is outside the usable range {}..{}",
                    id, MIN_REGISTER, MAX_REGISTER
                ),
                comment,
            ));
        }
        if name.is_empty() {
            return Err(directive_error(
                ErrorKind::DirectiveMalformed,
                format!("'{}' is missing a variable name", entry),
                comment,
            ));
        }
        if bindings.contains_key(name) {
            return Err(directive_error(
                ErrorKind::DirectiveMalformed,
                format!("'{}' is bound twice", name),
                comment,
            ));
        }
        if used_ids.contains(&id) {
            return Err(directive_error(
                ErrorKind::DirectiveMalformed,
                format!("register r:{} is bound twice", id),
                comment,
            ));
        }
        used_ids.push(id);
        bindings.insert(
            name.to_string(),
            Register::from_parts(id, Some(name.to_string()), None),
        );
    }
    if bindings.is_empty() {
        return Err(directive_error(
            ErrorKind::DirectiveMalformed,
            "at least one r:<id>=<name> binding is required",
            comment,
        ));
    }
    Ok(bindings)
}
