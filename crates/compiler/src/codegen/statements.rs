//! Statement and control-flow visitors. Every statement leaves the
//! stack exactly as it found it.

use super::{CodeGen, StackEffect, ValueUse};
use crate::ast::{Node, NodeKind};
use crate::error::{CompileError, ErrorKind};

impl CodeGen<'_> {
    pub(crate) fn emit_statements(&mut self, body: &[Node]) -> Result<(), CompileError> {
        for statement in body {
            self.emit_statement_with_directives(statement)?;
        }
        Ok(())
    }

    /// Directives ride on the comments around a statement; they are
    /// applied before and after the statement itself.
    pub(crate) fn emit_statement_with_directives(
        &mut self,
        statement: &Node,
    ) -> Result<(), CompileError> {
        self.process_directives(&statement.leading_comments)?;
        if self.options.source_comments {
            self.emit_source_echo(statement);
        }
        self.emit_statement(statement)?;
        self.process_directives(&statement.trailing_comments)?;
        Ok(())
    }

    fn emit_statement(&mut self, node: &Node) -> Result<(), CompileError> {
        match &node.kind {
            NodeKind::ExpressionStatement { expression } => {
                if self.emit_expression(expression, ValueUse::Discarded)? == StackEffect::Value {
                    self.emit("pop");
                }
                Ok(())
            }
            NodeKind::BlockStatement { body } => self.emit_statements(body),
            NodeKind::VariableDeclaration { kind, declarations } => {
                self.emit_variable_declaration(node, kind, declarations)
            }
            NodeKind::IfStatement {
                test,
                consequent,
                alternate,
            } => self.emit_if(test, consequent, alternate.as_deref()),
            NodeKind::WhileStatement { test, body } => self.emit_while(test, body),
            NodeKind::BreakStatement { label } => self.emit_break(node, label.as_deref()),
            NodeKind::ReturnStatement { argument } => self.emit_return(argument.as_deref()),
            NodeKind::FunctionDeclaration { id, params, body } => {
                self.emit_function2(node, id.as_deref(), params, body)
            }
            _ => Err(CompileError::at_node(
                ErrorKind::UnimplementedNode,
                format!("no code generation for {}", node.variant_name()),
                node,
            )),
        }
    }

    fn emit_variable_declaration(
        &mut self,
        node: &Node,
        kind: &str,
        declarations: &[Node],
    ) -> Result<(), CompileError> {
        if kind != "var" {
            return Err(CompileError::at_node(
                ErrorKind::UnimplementedFeature,
                format!("'{}' declarations are not supported; use 'var'", kind),
                node,
            ));
        }
        for declarator in declarations {
            self.emit_variable_declarator(declarator)?;
        }
        Ok(())
    }

    /// Locals are reserved lazily here, not in the `function2` header.
    fn emit_variable_declarator(&mut self, node: &Node) -> Result<(), CompileError> {
        let NodeKind::VariableDeclarator { id, init } = &node.kind else {
            return Err(CompileError::at_node(
                ErrorKind::Internal,
                format!("expected VariableDeclarator, got {}", node.variant_name()),
                node,
            ));
        };
        let Some(name) = id.identifier_name() else {
            return Err(CompileError::at_node(
                ErrorKind::UnimplementedFeature,
                format!("{} declarations are not supported", id.variant_name()),
                id,
            ));
        };
        if self.inside_function() {
            let name = name.to_string();
            self.current_function_mut()?
                .declare_variable(&name)
                .map_err(|error| error.with_span(node.loc))?;
            if let Some(init) = init {
                self.emit_expression(init, ValueUse::Needed)?;
                if let Some(register) = self.resolve_register(&name) {
                    self.emit(format!("setRegister {}", register));
                    self.emit("pop");
                }
            }
            Ok(())
        } else if init.is_some() {
            Err(CompileError::at_node(
                ErrorKind::GlobalsUnsupported,
                format!(
                    "cannot initialize '{}' at the top level; globals belong to the host movie",
                    name
                ),
                node,
            ))
        } else {
            Ok(())
        }
    }

    fn emit_if(
        &mut self,
        test: &Node,
        consequent: &Node,
        alternate: Option<&Node>,
    ) -> Result<(), CompileError> {
        let true_label = self.fresh_label("ifTrue");
        let false_label = self.fresh_label("ifFalse");
        let end_label = self.fresh_label("ifEnd");
        self.emit_expression(test, ValueUse::Needed)?;
        self.emit("not");
        self.emit(format!("branchIfTrue {}", false_label));
        self.emit_label(&true_label);
        self.emit_statement_with_directives(consequent)?;
        self.emit(format!("branch {}", end_label));
        self.emit_label(&false_label);
        if let Some(alternate) = alternate {
            self.emit_statement_with_directives(alternate)?;
        }
        self.emit_label(&end_label);
        Ok(())
    }

    fn emit_while(&mut self, test: &Node, body: &Node) -> Result<(), CompileError> {
        let test_label = self.fresh_label("whileTest");
        let end_label = self.fresh_label("whileEnd");
        self.emit_label(&test_label);
        self.emit_expression(test, ValueUse::Needed)?;
        self.emit("not");
        self.emit(format!("branchIfTrue {}", end_label));
        self.with_loop(end_label.clone(), |generator| {
            generator.emit_statement_with_directives(body)
        })?;
        self.emit(format!("branch {}", test_label));
        self.emit_label(&end_label);
        Ok(())
    }

    fn emit_break(&mut self, node: &Node, label: Option<&Node>) -> Result<(), CompileError> {
        if label.is_some() {
            return Err(CompileError::at_node(
                ErrorKind::UnimplementedFeature,
                "labeled break is not supported",
                node,
            ));
        }
        let Some(frame) = self.loops.last() else {
            return Err(CompileError::at_node(
                ErrorKind::BreakOutsideLoop,
                "break used outside of a loop",
                node,
            ));
        };
        let end_label = frame.end_label.clone();
        self.emit(format!("branch {}", end_label));
        Ok(())
    }

    fn emit_return(&mut self, argument: Option<&Node>) -> Result<(), CompileError> {
        match argument {
            Some(argument) => {
                self.emit_expression(argument, ValueUse::Needed)?;
            }
            None => self.emit("push UNDEF"),
        }
        self.emit("return");
        Ok(())
    }

    /// Echo the statement's own source as a comment: single-line
    /// statements as `//--`, multi-line ones fenced by `/*--[[` and
    /// `--]]*/` so the annotator passes the body through untouched.
    fn emit_source_echo(&mut self, node: &Node) {
        let text = node.source_text(self.source);
        if text.is_empty() {
            return;
        }
        if let Some((first, rest)) = text.split_once('\n') {
            self.emit(format!("/*--[[ {}", first.trim_end()));
            for line in rest.lines() {
                self.lines.push(line.to_string());
            }
            self.lines.push("--]]*/".to_string());
        } else {
            self.emit(format!("//-- {}", text));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerOptions;

    fn node(kind: NodeKind) -> Node {
        Node::synthetic(kind)
    }

    fn num(value: f64) -> Node {
        node(NodeKind::NumericLiteral { value })
    }

    fn ident(name: &str) -> Node {
        node(NodeKind::Identifier {
            name: name.to_string(),
        })
    }

    fn expression_statement(expression: Node) -> Node {
        node(NodeKind::ExpressionStatement {
            expression: Box::new(expression),
        })
    }

    fn call(callee: Node, arguments: Vec<Node>) -> Node {
        node(NodeKind::CallExpression {
            callee: Box::new(callee),
            arguments,
        })
    }

    fn var_declaration(name: &str, init: Option<Node>) -> Node {
        node(NodeKind::VariableDeclaration {
            kind: "var".to_string(),
            declarations: vec![node(NodeKind::VariableDeclarator {
                id: Box::new(ident(name)),
                init: init.map(Box::new),
            })],
        })
    }

    fn block(body: Vec<Node>) -> Node {
        node(NodeKind::BlockStatement { body })
    }

    fn statement_lines(statement: &Node) -> Vec<String> {
        let mut generator = CodeGen::new("", CompilerOptions::default());
        generator.emit_statement_with_directives(statement).unwrap();
        generator.into_lines()
    }

    fn statement_error(statement: &Node) -> CompileError {
        let mut generator = CodeGen::new("", CompilerOptions::default());
        generator
            .emit_statement_with_directives(statement)
            .unwrap_err()
    }

    #[test]
    fn test_expression_statement_pops_unused_value() {
        let lines = statement_lines(&expression_statement(call(ident("b"), vec![])));
        assert_eq!(
            lines,
            vec!["push 0", "push 'b'", "callFunction", "pop"]
        );
    }

    #[test]
    fn test_let_declaration_is_rejected() {
        let declaration = node(NodeKind::VariableDeclaration {
            kind: "let".to_string(),
            declarations: vec![],
        });
        assert_eq!(
            statement_error(&declaration).kind,
            ErrorKind::UnimplementedFeature
        );
    }

    #[test]
    fn test_global_declaration_with_initializer_is_rejected() {
        let error = statement_error(&var_declaration("x", Some(num(1.0))));
        assert_eq!(error.kind, ErrorKind::GlobalsUnsupported);
    }

    #[test]
    fn test_global_declaration_without_initializer_is_silent() {
        assert!(statement_lines(&var_declaration("x", None)).is_empty());
    }

    #[test]
    fn test_if_else_shape() {
        let statement = node(NodeKind::IfStatement {
            test: Box::new(node(NodeKind::BinaryExpression {
                operator: ">".to_string(),
                left: Box::new(ident("a")),
                right: Box::new(num(0.0)),
            })),
            consequent: Box::new(block(vec![expression_statement(call(ident("b"), vec![]))])),
            alternate: Some(Box::new(block(vec![expression_statement(call(
                ident("c"),
                vec![],
            ))]))),
        });
        assert_eq!(
            statement_lines(&statement),
            vec![
                "push 'a'",
                "getVariable",
                "push 0",
                "greaterThan",
                "not",
                "branchIfTrue ifFalse1",
                "ifTrue0:",
                "push 0",
                "push 'b'",
                "callFunction",
                "pop",
                "branch ifEnd2",
                "ifFalse1:",
                "push 0",
                "push 'c'",
                "callFunction",
                "pop",
                "ifEnd2:",
            ]
        );
    }

    #[test]
    fn test_if_without_else_still_emits_both_labels() {
        let statement = node(NodeKind::IfStatement {
            test: Box::new(ident("go")),
            consequent: Box::new(block(vec![])),
            alternate: None,
        });
        assert_eq!(
            statement_lines(&statement),
            vec![
                "push 'go'",
                "getVariable",
                "not",
                "branchIfTrue ifFalse1",
                "ifTrue0:",
                "branch ifEnd2",
                "ifFalse1:",
                "ifEnd2:",
            ]
        );
    }

    #[test]
    fn test_while_with_break() {
        let statement = node(NodeKind::WhileStatement {
            test: Box::new(ident("n")),
            body: Box::new(block(vec![node(NodeKind::BreakStatement { label: None })])),
        });
        assert_eq!(
            statement_lines(&statement),
            vec![
                "whileTest0:",
                "push 'n'",
                "getVariable",
                "not",
                "branchIfTrue whileEnd1",
                "branch whileEnd1",
                "branch whileTest0",
                "whileEnd1:",
            ]
        );
    }

    #[test]
    fn test_break_outside_loop_is_rejected() {
        let error = statement_error(&node(NodeKind::BreakStatement { label: None }));
        assert_eq!(error.kind, ErrorKind::BreakOutsideLoop);
    }

    #[test]
    fn test_labeled_break_is_rejected() {
        let error = statement_error(&node(NodeKind::BreakStatement {
            label: Some(Box::new(ident("outer"))),
        }));
        assert_eq!(error.kind, ErrorKind::UnimplementedFeature);
    }

    #[test]
    fn test_return_without_argument_pushes_undef() {
        let lines = statement_lines(&node(NodeKind::ReturnStatement { argument: None }));
        assert_eq!(lines, vec!["push UNDEF", "return"]);
    }

    #[test]
    fn test_return_with_argument() {
        let lines = statement_lines(&node(NodeKind::ReturnStatement {
            argument: Some(Box::new(num(5.0))),
        }));
        assert_eq!(lines, vec!["push 5", "return"]);
    }

    #[test]
    fn test_unknown_statement_is_rejected() {
        let error = statement_error(&node(NodeKind::Unknown));
        assert_eq!(error.kind, ErrorKind::UnimplementedNode);
    }

    #[test]
    fn test_source_echo_single_line() {
        let source = "a = 1;";
        let mut options = CompilerOptions::default();
        options.source_comments = true;
        let mut generator = CodeGen::new(source, options);
        let mut statement = expression_statement(node(NodeKind::AssignmentExpression {
            operator: "=".to_string(),
            left: Box::new(ident("a")),
            right: Box::new(num(1.0)),
        }));
        statement.end = source.len();
        generator.emit_statement_with_directives(&statement).unwrap();
        let lines = generator.into_lines();
        assert_eq!(lines[0], "//-- a = 1;");
    }

    #[test]
    fn test_source_echo_multi_line_is_fenced() {
        let source = "while (n) {\n  break;\n}";
        let mut options = CompilerOptions::default();
        options.source_comments = true;
        let mut generator = CodeGen::new(source, options);
        let mut statement = node(NodeKind::WhileStatement {
            test: Box::new(ident("n")),
            body: Box::new(block(vec![node(NodeKind::BreakStatement { label: None })])),
        });
        statement.end = source.len();
        generator.emit_statement_with_directives(&statement).unwrap();
        let lines = generator.into_lines();
        assert_eq!(lines[0], "/*--[[ while (n) {");
        assert_eq!(lines[1], "  break;");
        assert_eq!(lines[2], "}");
        assert_eq!(lines[3], "--]]*/");
        assert_eq!(lines[4], "whileTest0:");
    }
}
