//! Symbolic stack annotation for the emitted assembly.
//!
//! Re-executes the coalesced instruction stream with one symbolic stack
//! per function and appends the stack contents to each instruction line
//! as a trailing comment, for eyeballing stack balance:
//!
//! ```text
//! push 'x', r:v, 1    // 'x'|r:v|1
//! add                 // 'x'|r:v+1
//! add                 // 'x'+(r:v+1)
//! return              // --<empty>
//! ```
//!
//! This is a debugging aid, not a verifier: on the first branch in a
//! function the reconstruction gives up for that function and its
//! remaining lines pass through untouched until the matching `end`.

use crate::error::{CompileError, ErrorKind};

/// Columns of padding between the longest instruction and its comment.
const ANNOTATION_GAP: usize = 4;

struct Frame {
    stack: Vec<String>,
    suppressed: bool,
}

impl Frame {
    fn new() -> Self {
        Frame {
            stack: Vec::new(),
            suppressed: false,
        }
    }
}

/// The annotator. One instance walks one instruction stream.
pub struct StackSimulator {
    frames: Vec<Frame>,
    in_block_comment: bool,
}

impl Default for StackSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl StackSimulator {
    pub fn new() -> Self {
        StackSimulator {
            frames: vec![Frame::new()],
            in_block_comment: false,
        }
    }

    /// Annotate every instruction line with the stack state after it.
    /// Comments, labels, `function2` and `end` lines pass through
    /// unchanged.
    pub fn annotate(mut self, lines: &[String]) -> Result<Vec<String>, CompileError> {
        let column = annotation_column(lines);
        let mut annotated = Vec::with_capacity(lines.len());
        for (index, line) in lines.iter().enumerate() {
            annotated.push(self.annotate_line(line, index, column)?);
        }
        Ok(annotated)
    }

    fn annotate_line(
        &mut self,
        line: &str,
        index: usize,
        column: usize,
    ) -> Result<String, CompileError> {
        let trimmed = line.trim();
        if self.in_block_comment {
            if trimmed.contains("*/") {
                self.in_block_comment = false;
            }
            return Ok(line.to_string());
        }
        if trimmed.is_empty() || trimmed.starts_with("//") {
            return Ok(line.to_string());
        }
        if trimmed.starts_with("/*") {
            if !trimmed[2..].contains("*/") {
                self.in_block_comment = true;
            }
            return Ok(line.to_string());
        }
        if trimmed.ends_with(':') {
            return Ok(line.to_string());
        }
        if let Some(header) = trimmed.strip_prefix("function2") {
            self.enter_function(header);
            return Ok(line.to_string());
        }
        if trimmed == "end" || trimmed.starts_with("end ") {
            self.leave_function();
            return Ok(line.to_string());
        }

        let Some(frame) = self.frames.last_mut() else {
            return Err(CompileError::new(
                ErrorKind::Internal,
                "the frame stack of the annotator is empty",
            ));
        };
        if frame.suppressed {
            return Ok(line.to_string());
        }

        let (opcode, operands) = match trimmed.split_once(char::is_whitespace) {
            Some((opcode, rest)) => (opcode, rest.trim_start()),
            None => (trimmed, ""),
        };

        match opcode {
            "push" => {
                for operand in split_push_operands(operands) {
                    frame.stack.push(operand);
                }
            }
            "pop" => {
                frame.stack.pop();
            }
            "getVariable" => {
                if let Some(token) = frame.stack.pop() {
                    frame.stack.push(unquote(&token).unwrap_or(token));
                }
            }
            "getMember" => {
                let property = frame.stack.pop().unwrap_or_default();
                let object = frame.stack.pop().unwrap_or_default();
                let access = match quoted_identifier(&property) {
                    Some(name) => format!("{}.{}", object, name),
                    None => format!("{}[{}]", object, property),
                };
                frame.stack.push(access);
            }
            "new" => {
                let class = frame.stack.pop().unwrap_or_default();
                let class = unquote(&class).unwrap_or(class);
                let arguments = splice_arguments(&mut frame.stack);
                frame
                    .stack
                    .push(format!("new {}({})", class, arguments.join(", ")));
            }
            "callFunction" => {
                let name = frame.stack.pop().unwrap_or_default();
                let name = unquote(&name).unwrap_or(name);
                let arguments = splice_arguments(&mut frame.stack);
                frame.stack.push(format!("{}({})", name, arguments.join(", ")));
            }
            "callMethod" => {
                let name = frame.stack.pop().unwrap_or_default();
                let name = unquote(&name).unwrap_or(name);
                let object = frame.stack.pop().unwrap_or_default();
                let arguments = splice_arguments(&mut frame.stack);
                frame
                    .stack
                    .push(format!("{}.{}({})", object, name, arguments.join(", ")));
            }
            "setRegister" => {}
            "setVariable" => {
                frame.stack.pop();
                frame.stack.pop();
            }
            "setMember" => {
                frame.stack.pop();
                frame.stack.pop();
                frame.stack.pop();
            }
            "not" => {
                let value = frame.stack.pop().unwrap_or_default();
                frame.stack.push(format!("!({})", value));
            }
            "increment" | "decrement" => {
                let symbol = if opcode == "increment" { "+" } else { "-" };
                let value = frame.stack.pop().unwrap_or_default();
                frame
                    .stack
                    .push(format!("{} {} 1", parenthesize(&value, symbol), symbol));
            }
            "int" => {
                let value = frame.stack.pop().unwrap_or_default();
                frame.stack.push(format!("int({})", value));
            }
            "initArray" => {
                let elements = splice_arguments(&mut frame.stack);
                frame.stack.push(format!("[{}]", elements.join(", ")));
            }
            "branchIfTrue" => {
                frame.stack.pop();
                frame.suppressed = true;
            }
            "branch" => {
                frame.suppressed = true;
            }
            "return" => {
                if frame.stack.len() > 1 {
                    return Err(CompileError::new(
                        ErrorKind::StackInvariantViolation,
                        format!(
                            "line {}: return with {} values on the stack: {}",
                            index + 1,
                            frame.stack.len(),
                            frame.stack.join("|")
                        ),
                    ));
                }
                frame.stack.pop();
            }
            _ => {
                if let Some(symbol) = binary_symbol(opcode) {
                    let right = frame.stack.pop().unwrap_or_default();
                    let left = frame.stack.pop().unwrap_or_default();
                    let search = symbol.trim();
                    frame.stack.push(format!(
                        "{}{}{}",
                        parenthesize(&left, search),
                        symbol,
                        parenthesize(&right, search)
                    ));
                } else {
                    // Opcode the annotator does not model.
                    return Ok(line.to_string());
                }
            }
        }

        let contents = if frame.stack.is_empty() {
            "--<empty>".to_string()
        } else {
            frame.stack.join("|")
        };
        Ok(format!("{:<column$}// {}", line, contents))
    }

    /// A `function2` header opens a fresh stack; an anonymous one also
    /// leaves the function value on the enclosing stack.
    fn enter_function(&mut self, header: &str) {
        let named = header.trim_start().starts_with('\'');
        if !named && let Some(outer) = self.frames.last_mut() {
            outer.stack.push("function".to_string());
        }
        self.frames.push(Frame::new());
    }

    /// `end` drops the function's stack (and its suppression) and
    /// resumes the enclosing one.
    fn leave_function(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }
}

/// Pad column: a fixed gap past the longest non-comment, non-`function2`
/// line.
fn annotation_column(lines: &[String]) -> usize {
    lines
        .iter()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.starts_with("//")
                && !trimmed.starts_with("/*")
                && !trimmed.starts_with("--]]*/")
                && !trimmed.starts_with("function2")
        })
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0)
        + ANNOTATION_GAP
}

/// Split a (possibly coalesced) push operand list on commas, respecting
/// quotes and backslash escapes, and dropping `/*...*/` debug tags.
fn split_push_operands(text: &str) -> Vec<String> {
    let mut operands = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in text.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if quote.is_some() => {
                current.push(c);
                escaped = true;
            }
            '\'' | '"' => {
                current.push(c);
                quote = match quote {
                    Some(open) if open == c => None,
                    Some(open) => Some(open),
                    None => Some(c),
                };
            }
            ',' if quote.is_none() => {
                push_operand(&mut operands, &mut current);
            }
            _ => current.push(c),
        }
    }
    push_operand(&mut operands, &mut current);
    operands
}

fn push_operand(operands: &mut Vec<String>, current: &mut String) {
    let mut operand = current.trim().to_string();
    current.clear();
    if operand.is_empty() {
        return;
    }
    // Register operands may carry a trailing debug tag.
    if !operand.starts_with('\'')
        && operand.ends_with("*/")
        && let Some(index) = operand.find("/*")
    {
        operand.truncate(index);
        operand = operand.trim_end().to_string();
    }
    operands.push(operand);
}

/// The inner text of a single-quoted token.
fn unquote(token: &str) -> Option<String> {
    let rest = token.strip_prefix('\'')?;
    let inner = rest.strip_suffix('\'')?;
    Some(inner.to_string())
}

/// The inner name of a quoted token that looks like a plain identifier.
fn quoted_identifier(token: &str) -> Option<String> {
    let name = unquote(token)?;
    if !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
    {
        Some(name)
    } else {
        None
    }
}

/// Pop an argument count, then drain that many values. The values were
/// pushed in reverse, so reversing the drained tail restores source
/// order.
fn splice_arguments(stack: &mut Vec<String>) -> Vec<String> {
    let count = stack
        .pop()
        .and_then(|token| token.parse::<usize>().ok())
        .unwrap_or(0);
    let kept = stack.len().saturating_sub(count);
    let mut arguments: Vec<String> = stack.drain(kept..).collect();
    arguments.reverse();
    arguments
}

fn binary_symbol(opcode: &str) -> Option<&'static str> {
    Some(match opcode {
        "add" => "+",
        "subtract" => "-",
        "multiply" => "*",
        "divide" => "/",
        "modulo" => "%",
        "equals" => "==",
        "strictEquals" => "===",
        "lessThan" => "<",
        "greaterThan" => ">",
        "shiftLeft" => "<<",
        "shiftRight" => ">>",
        "shiftRight2" => ">>>",
        "bitwiseAnd" => "&",
        "bitwiseOr" => "|",
        "bitwiseXor" => "^",
        "instanceOf" => " instanceof ",
        _ => return None,
    })
}

/// Wrap `operand` in parentheses when `symbol` occurs in it outside
/// quotes and outside any bracketed part, which would read with the
/// wrong associativity otherwise.
fn parenthesize(operand: &str, symbol: &str) -> String {
    if contains_top_level(operand, symbol) {
        format!("({})", operand)
    } else {
        operand.to_string()
    }
}

fn contains_top_level(text: &str, symbol: &str) -> bool {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (index, c) in text.char_indices() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == open {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            _ => {
                if depth == 0 && text[index..].starts_with(symbol) {
                    return true;
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotate(lines: &[&str]) -> Vec<String> {
        let lines: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        StackSimulator::new().annotate(&lines).unwrap()
    }

    fn stack_comment(line: &str) -> &str {
        line.split_once("// ").map(|(_, c)| c).unwrap_or("")
    }

    #[test]
    fn test_push_and_pop_annotations() {
        let annotated = annotate(&["push 'a', 'b', 123", "pop", "pop", "pop"]);
        assert_eq!(stack_comment(&annotated[0]), "'a'|'b'|123");
        assert_eq!(stack_comment(&annotated[1]), "'a'|'b'");
        assert_eq!(stack_comment(&annotated[2]), "'a'");
        assert_eq!(stack_comment(&annotated[3]), "--<empty>");
    }

    #[test]
    fn test_pad_column_is_longest_plus_gap() {
        let annotated = annotate(&["push 1", "setVariable"]);
        // "setVariable" is 11 chars, so comments start at column 15.
        assert!(annotated[0].starts_with("push 1         // "));
        assert_eq!(annotated[0], format!("{:<15}// 1", "push 1"));
    }

    #[test]
    fn test_get_variable_unquotes() {
        let annotated = annotate(&["push 'velocity'", "getVariable"]);
        assert_eq!(stack_comment(&annotated[1]), "velocity");
    }

    #[test]
    fn test_get_member_renders_dotted_or_indexed() {
        let annotated = annotate(&["push 'atv'", "getVariable", "push 'bar'", "getMember"]);
        assert_eq!(stack_comment(&annotated[3]), "atv.bar");
        let indexed = annotate(&["push 'xs'", "getVariable", "push 3", "getMember"]);
        assert_eq!(stack_comment(&indexed[3]), "xs[3]");
    }

    #[test]
    fn test_call_function_restores_argument_order() {
        let annotated = annotate(&["push 2, 1, 2, 'update'", "callFunction"]);
        assert_eq!(stack_comment(&annotated[1]), "update(1, 2)");
    }

    #[test]
    fn test_call_method() {
        let annotated = annotate(&[
            "push 5, 1, 'atv'",
            "getVariable",
            "push 'move'",
            "callMethod",
        ]);
        assert_eq!(stack_comment(&annotated[3]), "atv.move(5)");
    }

    #[test]
    fn test_new_expression() {
        let annotated = annotate(&["push 2, 1, 2, 'Point'", "new"]);
        assert_eq!(stack_comment(&annotated[1]), "new Point(1, 2)");
    }

    #[test]
    fn test_init_array() {
        let annotated = annotate(&["push 3, 2, 1, 3", "initArray"]);
        assert_eq!(stack_comment(&annotated[1]), "[1, 2, 3]");
    }

    #[test]
    fn test_set_register_keeps_stack() {
        let annotated = annotate(&["push 9", "setRegister r:2 /*local:x*/", "pop"]);
        assert_eq!(stack_comment(&annotated[1]), "9");
        assert_eq!(stack_comment(&annotated[2]), "--<empty>");
    }

    #[test]
    fn test_set_variable_and_member_consume() {
        let annotated = annotate(&["push 'a', 1", "setVariable"]);
        assert_eq!(stack_comment(&annotated[1]), "--<empty>");
        let member = annotate(&["push 'o'", "getVariable", "push 'f', 1", "setMember"]);
        assert_eq!(stack_comment(&member[3]), "--<empty>");
    }

    #[test]
    fn test_binary_operator_parenthesizes_same_symbol() {
        let annotated = annotate(&["push 'x', r:v, 1", "add", "add"]);
        assert_eq!(stack_comment(&annotated[1]), "'x'|r:v+1");
        assert_eq!(stack_comment(&annotated[2]), "'x'+(r:v+1)");
    }

    #[test]
    fn test_quoted_operators_do_not_force_parens() {
        let annotated = annotate(&["push 'a+b', 1", "add"]);
        assert_eq!(stack_comment(&annotated[1]), "'a+b'+1");
    }

    #[test]
    fn test_not_and_int() {
        let annotated = annotate(&["push 'go'", "getVariable", "not", "int"]);
        assert_eq!(stack_comment(&annotated[2]), "!(go)");
        assert_eq!(stack_comment(&annotated[3]), "int(!(go))");
    }

    #[test]
    fn test_increment_wraps_compound_operands() {
        let annotated = annotate(&["push 1, 2", "add", "increment"]);
        assert_eq!(stack_comment(&annotated[2]), "(1+2) + 1");
    }

    #[test]
    fn test_passthrough_lines_are_unchanged() {
        let lines = [
            "// plain comment",
            "//-- a = 1;",
            "whileTest0:",
            "/*--[[ while (n) {",
            "  break;",
            "--]]*/",
            "push 1",
        ];
        let annotated = annotate(&lines);
        for (index, line) in lines.iter().enumerate().take(6) {
            assert_eq!(&annotated[index], line);
        }
        assert!(annotated[6].contains("// 1"));
    }

    #[test]
    fn test_bailout_on_branch_until_end() {
        let annotated = annotate(&[
            "function2 'f' () (r:1='this')",
            "  push 'n'",
            "  getVariable",
            "  not",
            "  branchIfTrue whileEnd1",
            "  push 'leftover'",
            "end // of function f",
            "push 1",
        ]);
        // The branch line is still annotated (its pop happened)...
        assert!(annotated[4].contains("// --<empty>"));
        // ...everything after it in the function passes through...
        assert_eq!(annotated[5], "  push 'leftover'");
        // ...and annotation resumes outside the function.
        assert!(annotated[7].contains("// 1"));
    }

    #[test]
    fn test_plain_branch_also_bails_out() {
        let annotated = annotate(&["branch whileEnd0", "push 1"]);
        assert!(annotated[0].contains("// --<empty>"));
        assert_eq!(annotated[1], "push 1");
    }

    #[test]
    fn test_function2_opens_a_fresh_stack() {
        let annotated = annotate(&[
            "push 'outer'",
            "function2 'f' () (r:1='this')",
            "  push 1",
            "end // of function f",
            "pop",
        ]);
        assert_eq!(stack_comment(&annotated[2]), "1");
        assert_eq!(stack_comment(&annotated[4]), "--<empty>");
    }

    #[test]
    fn test_anonymous_function_pushes_value_on_outer_stack() {
        let annotated = annotate(&[
            "function2 (r:2='x') (r:1='this')",
            "  push UNDEF",
            "  return",
            "end",
            "setRegister r:2 /*local:f*/",
            "pop",
        ]);
        assert_eq!(annotated[0], "function2 (r:2='x') (r:1='this')");
        assert_eq!(stack_comment(&annotated[4]), "function");
        assert_eq!(stack_comment(&annotated[5]), "--<empty>");
    }

    #[test]
    fn test_return_with_single_value() {
        let annotated = annotate(&["push 5", "return"]);
        assert_eq!(stack_comment(&annotated[1]), "--<empty>");
    }

    #[test]
    fn test_return_with_extra_values_fails() {
        let lines: Vec<String> = ["push 1, 2", "return"]
            .iter()
            .map(|l| l.to_string())
            .collect();
        let error = StackSimulator::new().annotate(&lines).unwrap_err();
        assert_eq!(error.kind, ErrorKind::StackInvariantViolation);
        assert!(error.message.contains("line 2"));
    }

    #[test]
    fn test_unknown_opcode_passes_through() {
        let annotated = annotate(&["push 1", "swap", "pop"]);
        assert_eq!(annotated[1], "swap");
        assert_eq!(stack_comment(&annotated[2]), "--<empty>");
    }

    #[test]
    fn test_split_push_operands_respects_quotes_and_escapes() {
        assert_eq!(
            split_push_operands(r"'a,b', 'c\'d', 12, r:velocity"),
            vec![r"'a,b'", r"'c\'d'", "12", "r:velocity"]
        );
        assert_eq!(split_push_operands("''"), vec!["''"]);
        assert_eq!(
            split_push_operands("r:3 /*temp*/, 1"),
            vec!["r:3", "1"]
        );
    }
}
