//! `function2` emission. Each function gets a fresh register file:
//! `this` is claimed first as a meta register, parameters follow by
//! name, and locals are reserved lazily as their declarations are
//! visited (so they never appear in the header).

use super::{CodeGen, FunctionFrame};
use crate::ast::{Node, NodeKind};
use crate::error::{CompileError, ErrorKind};
use crate::registers::Register;

/// `r:<id>='<name>'` as it appears in the header's args/meta lists.
fn header_binding(register: &Register) -> String {
    format!("r:{}='{}'", register.id(), register.name().unwrap_or(""))
}

fn header_list(registers: &[&Register]) -> String {
    let mut sorted: Vec<&Register> = registers.to_vec();
    sorted.sort_by_key(|register| register.id());
    sorted
        .iter()
        .map(|register| header_binding(register))
        .collect::<Vec<_>>()
        .join(", ")
}

impl CodeGen<'_> {
    /// Emit a function declaration or expression. A function expression
    /// is simply a declaration without a name: its header omits the
    /// quoted name and its `end` carries no trailer.
    pub(crate) fn emit_function2(
        &mut self,
        node: &Node,
        id: Option<&Node>,
        params: &[Node],
        body: &Node,
    ) -> Result<(), CompileError> {
        let name = match id {
            Some(id) => match id.identifier_name() {
                Some(name) => Some(name.to_string()),
                None => {
                    return Err(CompileError::at_node(
                        ErrorKind::Internal,
                        format!("function name is a {}", id.variant_name()),
                        id,
                    ));
                }
            },
            None => None,
        };

        let mut frame = FunctionFrame::new();
        let this_register = frame
            .allocator
            .allocate(Some("this"), None)
            .map_err(|error| error.with_span(node.loc))?;
        frame.meta.insert("this".to_string(), this_register.clone());

        let mut parameter_registers = Vec::with_capacity(params.len());
        for param in params {
            let Some(param_name) = param.identifier_name() else {
                return Err(CompileError::at_node(
                    ErrorKind::UnimplementedFeature,
                    format!("{} parameters are not supported", param.variant_name()),
                    param,
                ));
            };
            if frame.args.contains_key(param_name) || frame.meta.contains_key(param_name) {
                return Err(CompileError::at_node(
                    ErrorKind::DuplicateDeclaration,
                    format!("parameter '{}' is declared twice", param_name),
                    param,
                ));
            }
            let register = frame
                .allocator
                .allocate(Some(param_name), None)
                .map_err(|error| error.with_span(param.loc))?;
            frame.args.insert(param_name.to_string(), register.clone());
            parameter_registers.push(register);
        }

        let args_list = header_list(&parameter_registers.iter().collect::<Vec<_>>());
        let meta_list = header_list(&[&this_register]);
        match &name {
            Some(name) => self.emit(format!("function2 '{}' ({}) ({})", name, args_list, meta_list)),
            None => self.emit(format!("function2 ({}) ({})", args_list, meta_list)),
        }

        self.indent();
        let body_result = self.with_function_frame(frame, |generator| {
            generator.emit_statement_with_directives(body)
        });
        self.deindent();
        body_result?;

        match &name {
            Some(name) => self.emit(format!("end // of function {}", name)),
            None => self.emit("end"),
        }
        Ok(())
    }
}
