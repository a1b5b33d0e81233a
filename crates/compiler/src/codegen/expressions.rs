//! Expression visitors. Every visitor leaves exactly one value on the
//! stack unless the parent offered to discard it and the visitor reports
//! [`StackEffect::Clean`].

use super::{Access, CodeGen, StackEffect, ValueUse, literal_operand, quote_string};
use crate::ast::{Node, NodeKind, TemplateElement};
use crate::error::{CompileError, ErrorKind};

impl CodeGen<'_> {
    pub(crate) fn emit_expression(
        &mut self,
        node: &Node,
        usage: ValueUse,
    ) -> Result<StackEffect, CompileError> {
        if let Some(operand) = literal_operand(node) {
            self.emit(format!("push {}", operand));
            return Ok(StackEffect::Value);
        }
        match &node.kind {
            NodeKind::Identifier { .. } => {
                self.emit_identifier(node, Access::Read)?;
                Ok(StackEffect::Value)
            }
            NodeKind::TemplateLiteral {
                quasis,
                expressions,
            } => self.emit_template_literal(quasis, expressions),
            NodeKind::MemberExpression { .. } => {
                self.emit_member_expression(node, Access::Read)?;
                Ok(StackEffect::Value)
            }
            NodeKind::ThisExpression => self.emit_this(node),
            NodeKind::ArrayExpression { elements } => self.emit_array(node, elements),
            NodeKind::NewExpression { callee, arguments } => {
                self.emit_new(node, callee, arguments)
            }
            NodeKind::CallExpression { callee, arguments } => {
                self.emit_call(node, callee, arguments)
            }
            NodeKind::BinaryExpression {
                operator,
                left,
                right,
            } => self.emit_binary(node, operator, left, right),
            NodeKind::UnaryExpression {
                operator, argument, ..
            } => self.emit_unary(node, operator, argument),
            NodeKind::UpdateExpression {
                operator,
                argument,
                prefix,
            } => self.emit_update(node, operator, argument, *prefix),
            NodeKind::AssignmentExpression { .. } => self.emit_assignment(node, usage),
            NodeKind::FunctionExpression { id, params, body } => {
                self.emit_function2(node, id.as_deref(), params, body)?;
                Ok(StackEffect::Value)
            }
            _ => Err(CompileError::at_node(
                ErrorKind::UnimplementedNode,
                format!("no code generation for {}", node.variant_name()),
                node,
            )),
        }
    }

    /// Identifiers resolve through the innermost register-variables
    /// context first; everything else is a named variable in the
    /// movie's scope chain.
    pub(crate) fn emit_identifier(
        &mut self,
        node: &Node,
        access: Access,
    ) -> Result<(), CompileError> {
        let Some(name) = node.identifier_name() else {
            return Err(CompileError::at_node(
                ErrorKind::Internal,
                format!("expected Identifier, got {}", node.variant_name()),
                node,
            ));
        };
        if let Some(register) = self.resolve_register(name) {
            self.emit(format!("push {}", register));
            return Ok(());
        }
        self.emit(format!("push {}", quote_string(name)));
        if access == Access::Read {
            self.emit("getVariable");
        }
        Ok(())
    }

    /// Builds the result left-to-right in an accumulator that starts as
    /// the empty string, folding each chunk (and its interpolated value,
    /// when present) in with `add`.
    fn emit_template_literal(
        &mut self,
        quasis: &[TemplateElement],
        expressions: &[Node],
    ) -> Result<StackEffect, CompileError> {
        self.emit("push ''");
        for (index, chunk) in quasis.iter().enumerate() {
            self.emit(format!("push {}", quote_string(chunk.value.text())));
            if let Some(expression) = expressions.get(index) {
                self.emit_expression(expression, ValueUse::Needed)?;
                self.emit("add");
            }
            self.emit("add");
        }
        Ok(StackEffect::Value)
    }

    pub(crate) fn emit_member_expression(
        &mut self,
        node: &Node,
        access: Access,
    ) -> Result<(), CompileError> {
        let NodeKind::MemberExpression {
            object,
            property,
            computed,
        } = &node.kind
        else {
            return Err(CompileError::at_node(
                ErrorKind::Internal,
                format!("expected MemberExpression, got {}", node.variant_name()),
                node,
            ));
        };
        match &object.kind {
            NodeKind::Identifier { .. } => self.emit_identifier(object, Access::Read)?,
            NodeKind::NewExpression { .. }
            | NodeKind::MemberExpression { .. }
            | NodeKind::ThisExpression => {
                self.emit_expression(object, ValueUse::Needed)?;
            }
            _ => {
                return Err(CompileError::at_node(
                    ErrorKind::UnimplementedFeature,
                    format!("member access on a {} object", object.variant_name()),
                    object,
                ));
            }
        }
        if *computed {
            self.emit_expression(property, ValueUse::Needed)?;
        } else {
            let Some(name) = property.identifier_name() else {
                return Err(CompileError::at_node(
                    ErrorKind::UnimplementedFeature,
                    format!("{} property access", property.variant_name()),
                    property,
                ));
            };
            self.emit(format!("push {}", quote_string(name)));
        }
        if access == Access::Read {
            self.emit("getMember");
        }
        Ok(())
    }

    fn emit_this(&mut self, node: &Node) -> Result<StackEffect, CompileError> {
        match self.resolve_register("this") {
            Some(register) => {
                self.emit(format!("push {}", register));
                Ok(StackEffect::Value)
            }
            None if self.inside_function() => Err(CompileError::at_node(
                ErrorKind::Internal,
                "function frame has no register bound to 'this'",
                node,
            )),
            None => Err(CompileError::at_node(
                ErrorKind::ThisOutsideFunction,
                "'this' used outside a function or register context",
                node,
            )),
        }
    }

    /// Elements go on in reverse so the first element ends up on top for
    /// `initArray`.
    fn emit_array(
        &mut self,
        node: &Node,
        elements: &[Option<Node>],
    ) -> Result<StackEffect, CompileError> {
        for element in elements.iter().rev() {
            let Some(element) = element else {
                return Err(CompileError::at_node(
                    ErrorKind::UnimplementedFeature,
                    "array holes are not supported",
                    node,
                ));
            };
            self.emit_expression(element, ValueUse::Needed)?;
        }
        self.emit(format!("push {}", elements.len()));
        self.emit("initArray");
        Ok(StackEffect::Value)
    }

    fn emit_new(
        &mut self,
        node: &Node,
        callee: &Node,
        arguments: &[Node],
    ) -> Result<StackEffect, CompileError> {
        let Some(class_name) = callee.identifier_name() else {
            return Err(CompileError::at_node(
                ErrorKind::UnimplementedFeature,
                format!("new with a {} callee", callee.variant_name()),
                node,
            ));
        };
        let class_name = class_name.to_string();
        for argument in arguments.iter().rev() {
            self.emit_expression(argument, ValueUse::Needed)?;
        }
        self.emit(format!("push {}", arguments.len()));
        self.emit(format!("push {}", quote_string(&class_name)));
        self.emit("new");
        Ok(StackEffect::Value)
    }

    fn emit_call(
        &mut self,
        node: &Node,
        callee: &Node,
        arguments: &[Node],
    ) -> Result<StackEffect, CompileError> {
        if let Some(name) = callee.identifier_name() {
            match name {
                "trace" => {
                    return Err(CompileError::at_node(
                        ErrorKind::UnsupportedIntrinsic,
                        "trace() has no runtime equivalent in the target player",
                        node,
                    ));
                }
                "int" => {
                    if arguments.len() != 1 {
                        return Err(CompileError::at_node(
                            ErrorKind::WrongArity,
                            format!("int() takes exactly 1 argument, got {}", arguments.len()),
                            node,
                        ));
                    }
                    self.emit_expression(&arguments[0], ValueUse::Needed)?;
                    self.emit("int");
                    return Ok(StackEffect::Value);
                }
                _ => {}
            }
        }
        for argument in arguments.iter().rev() {
            self.emit_expression(argument, ValueUse::Needed)?;
        }
        self.emit(format!("push {}", arguments.len()));
        match &callee.kind {
            NodeKind::Identifier { .. } => {
                self.emit_identifier(callee, Access::Target)?;
                self.emit("callFunction");
            }
            NodeKind::MemberExpression { .. } => {
                self.emit_member_expression(callee, Access::Target)?;
                self.emit("callMethod");
            }
            _ => {
                return Err(CompileError::at_node(
                    ErrorKind::UnimplementedFeature,
                    format!("call of a {} callee", callee.variant_name()),
                    node,
                ));
            }
        }
        Ok(StackEffect::Value)
    }

    fn emit_binary(
        &mut self,
        node: &Node,
        operator: &str,
        left: &Node,
        right: &Node,
    ) -> Result<StackEffect, CompileError> {
        // `|` and `&` are crossed here on purpose: the assembler's
        // bitwiseAnd/bitwiseOr mnemonics disagree with the player docs
        // for these two operators.
        // TODO: verify the pair against the assembler's opcode reference.
        let opcodes: &[&str] = match operator {
            "==" => &["equals"],
            "!=" => &["equals", "not"],
            "===" => &["strictEquals"],
            "!==" => &["strictEquals", "not"],
            "<" => &["lessThan"],
            ">" => &["greaterThan"],
            "<=" => &["greaterThan", "not"],
            ">=" => &["lessThan", "not"],
            "<<" => &["shiftLeft"],
            ">>" => &["shiftRight"],
            ">>>" => &["shiftRight2"],
            "+" => &["add"],
            "-" => &["subtract"],
            "*" => &["multiply"],
            "/" => &["divide"],
            "%" => &["modulo"],
            "|" => &["bitwiseAnd"],
            "^" => &["bitwiseXor"],
            "&" => &["bitwiseOr"],
            "instanceof" => &["instanceOf"],
            _ => {
                return Err(CompileError::at_node(
                    ErrorKind::UnsupportedOperator,
                    format!("binary operator '{}'", operator),
                    node,
                ));
            }
        };
        self.emit_expression(left, ValueUse::Needed)?;
        self.emit_expression(right, ValueUse::Needed)?;
        for opcode in opcodes {
            self.emit(*opcode);
        }
        Ok(StackEffect::Value)
    }

    fn emit_unary(
        &mut self,
        node: &Node,
        operator: &str,
        argument: &Node,
    ) -> Result<StackEffect, CompileError> {
        if operator != "!" {
            return Err(CompileError::at_node(
                ErrorKind::UnsupportedOperator,
                format!("unary operator '{}'", operator),
                node,
            ));
        }
        self.emit_expression(argument, ValueUse::Needed)?;
        self.emit("not");
        Ok(StackEffect::Value)
    }

    /// Postfix `++`/`--`. The emitted sequence replaces the stack top
    /// with the updated value instead of keeping the pre-update one, so
    /// the result of the expression is not ECMAScript-conformant.
    fn emit_update(
        &mut self,
        node: &Node,
        operator: &str,
        argument: &Node,
        prefix: bool,
    ) -> Result<StackEffect, CompileError> {
        let opcode = match operator {
            "++" => "increment",
            "--" => "decrement",
            _ => {
                return Err(CompileError::at_node(
                    ErrorKind::UnsupportedOperator,
                    format!("update operator '{}'", operator),
                    node,
                ));
            }
        };
        if prefix {
            return Err(CompileError::at_node(
                ErrorKind::UnimplementedFeature,
                format!("prefix {} is not supported; use the postfix form", operator),
                node,
            ));
        }
        let Some(name) = argument.identifier_name() else {
            return Err(CompileError::at_node(
                ErrorKind::UnimplementedFeature,
                format!("postfix {} on a {}", operator, argument.variant_name()),
                node,
            ));
        };
        if let Some(register) = self.resolve_register(name) {
            self.emit(format!("push {}", register));
            self.emit(opcode);
            self.emit(format!("setRegister {}", register));
        } else {
            self.emit(format!("push {}", quote_string(name)));
            self.emit(format!("push {}", quote_string(name)));
            self.emit("getVariable");
            self.emit(opcode);
            self.emit("setVariable");
        }
        Ok(StackEffect::Value)
    }

    /// Plain `=` assignment. Five shapes, in precedence order:
    ///
    /// 1. register target: `setRegister` keeps the value on the stack;
    /// 2. discarded value: let the set instruction consume it (the
    ///    cleanup is only acknowledged inside a function; at the root
    ///    the statement still pops);
    /// 3. literal right-hand side: store, then push the literal again;
    /// 4. inside a function: duplicate the value through a temporary
    ///    register around the store;
    /// 5. at the root: borrow r:1 to carry the value across the store,
    ///    restoring it from the copy saved at the start.
    fn emit_assignment(
        &mut self,
        node: &Node,
        usage: ValueUse,
    ) -> Result<StackEffect, CompileError> {
        let NodeKind::AssignmentExpression {
            operator,
            left,
            right,
        } = &node.kind
        else {
            return Err(CompileError::at_node(
                ErrorKind::Internal,
                format!("expected AssignmentExpression, got {}", node.variant_name()),
                node,
            ));
        };
        if operator != "=" {
            return Err(CompileError::at_node(
                ErrorKind::UnsupportedOperator,
                format!("compound assignment '{}'", operator),
                node,
            ));
        }

        if let Some(name) = left.identifier_name()
            && let Some(register) = self.resolve_register(name)
        {
            self.emit_expression(right, ValueUse::Needed)?;
            self.emit(format!("setRegister {}", register));
            if usage == ValueUse::Discarded {
                self.emit("pop");
                return Ok(StackEffect::Clean);
            }
            return Ok(StackEffect::Value);
        }

        let set_opcode = match &left.kind {
            NodeKind::Identifier { .. } => "setVariable",
            NodeKind::MemberExpression { .. } => "setMember",
            _ => {
                return Err(CompileError::at_node(
                    ErrorKind::UnimplementedFeature,
                    format!("assignment to a {}", left.variant_name()),
                    node,
                ));
            }
        };

        if usage == ValueUse::Discarded {
            self.emit_assignment_target(left)?;
            self.emit_expression(right, ValueUse::Needed)?;
            self.emit(set_opcode);
            if self.inside_function() {
                return Ok(StackEffect::Clean);
            }
            // At the root the cleanup stays with the statement's pop.
            return Ok(StackEffect::Value);
        }

        if literal_operand(right).is_some() {
            self.emit_assignment_target(left)?;
            self.emit_expression(right, ValueUse::Needed)?;
            self.emit(set_opcode);
            self.emit_expression(right, ValueUse::Needed)?;
            return Ok(StackEffect::Value);
        }

        if self.inside_function() {
            self.emit_assignment_target(left)?;
            self.emit_expression(right, ValueUse::Needed)?;
            let temporary = self.current_function_mut()?.alloc_temporary()?;
            self.emit(format!("setRegister {}", temporary));
            self.emit(set_opcode);
            self.emit(format!("push {}", temporary));
            self.current_function_mut()?.free_temporary(temporary);
            return Ok(StackEffect::Value);
        }

        self.emit("push r:1");
        self.emit_assignment_target(left)?;
        self.emit_expression(right, ValueUse::Needed)?;
        self.emit("setRegister r:1");
        self.emit(set_opcode);
        self.emit("setRegister r:1");
        Ok(StackEffect::Value)
    }

    fn emit_assignment_target(&mut self, left: &Node) -> Result<(), CompileError> {
        match &left.kind {
            NodeKind::Identifier { .. } => self.emit_identifier(left, Access::Target),
            NodeKind::MemberExpression { .. } => self.emit_member_expression(left, Access::Target),
            _ => Err(CompileError::at_node(
                ErrorKind::Internal,
                format!("unexpected assignment target {}", left.variant_name()),
                left,
            )),
        }
    }
}
