//! Code generator state: the emitter, its context frames, and the
//! cross-visitor hints.

use crate::config::CompilerOptions;
use crate::error::{CompileError, ErrorKind};
use crate::registers::{Register, RegisterAllocator};
use std::collections::{HashMap, HashSet};

/// Whether the parent has a use for the value an expression produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueUse {
    /// The value must be left on the stack.
    Needed,
    /// The parent will discard the value; the expression may consume it
    /// itself and report the stack already clean.
    Discarded,
}

/// What an expression actually left on the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StackEffect {
    /// One value left on the stack.
    Value,
    /// Nothing left; the expression honored [`ValueUse::Discarded`].
    Clean,
}

/// How an identifier or member expression is being accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    /// Finish with `getVariable`/`getMember` so the value ends up on the
    /// stack.
    Read,
    /// Stop after pushing the reference parts; the parent emits the
    /// consuming instruction (`setVariable`, `callFunction`, ...).
    Target,
}

/// Register bookkeeping for one function being compiled: its allocator
/// and the name→register maps for meta registers (`this`), declared
/// parameters, and lazily declared locals.
#[derive(Debug, Default)]
pub(crate) struct FunctionFrame {
    pub allocator: RegisterAllocator,
    pub meta: HashMap<String, Register>,
    pub args: HashMap<String, Register>,
    pub locals: HashMap<String, Register>,
}

impl FunctionFrame {
    pub fn new() -> Self {
        FunctionFrame::default()
    }

    /// Reserve a local register for `var name`. The register is unnamed
    /// in the frame header, so it renders by id with a `local:` tag.
    pub fn declare_variable(&mut self, name: &str) -> Result<Register, CompileError> {
        if self.locals.contains_key(name)
            || self.args.contains_key(name)
            || self.meta.contains_key(name)
        {
            return Err(CompileError::new(
                ErrorKind::DuplicateDeclaration,
                format!("'{}' is already declared in this function", name),
            ));
        }
        let register = self
            .allocator
            .allocate(None, Some(&format!("local:{}", name)))?;
        self.locals.insert(name.to_string(), register.clone());
        Ok(register)
    }

    /// Claim a short-lived scratch register; pair with
    /// [`FunctionFrame::free_temporary`].
    pub fn alloc_temporary(&mut self) -> Result<Register, CompileError> {
        self.allocator.allocate(None, Some("temp"))
    }

    pub fn free_temporary(&mut self, register: Register) {
        self.allocator.free(&register);
    }

    /// Locals shadow args, args shadow meta.
    pub fn resolve(&self, name: &str) -> Option<&Register> {
        self.locals
            .get(name)
            .or_else(|| self.args.get(name))
            .or_else(|| self.meta.get(name))
    }
}

/// One entry on the register-variables stack. A function pushes its own
/// frame's view; a directive pushes explicit bindings.
#[derive(Debug)]
pub(crate) enum RegisterScope {
    /// Resolve through the innermost [`FunctionFrame`].
    Function,
    /// Explicit name→register bindings from a
    /// `@js2f/push-register-context` directive.
    Explicit(HashMap<String, Register>),
}

/// The enclosing loop's break target.
#[derive(Debug)]
pub(crate) struct LoopFrame {
    pub end_label: String,
}

/// The emitter. Walks the AST depth-first and accumulates indented
/// instruction lines; all three context stacks live here and are pushed
/// and popped structurally around the subtree that introduces them.
pub struct CodeGen<'src> {
    pub(crate) source: &'src str,
    pub(crate) options: CompilerOptions,
    pub(crate) lines: Vec<String>,
    pub(crate) depth: usize,
    pub(crate) label_counter: usize,
    pub(crate) functions: Vec<FunctionFrame>,
    pub(crate) scopes: Vec<RegisterScope>,
    pub(crate) loops: Vec<LoopFrame>,
    /// Start offsets of comments already handled, since the parser
    /// attaches one comment to two neighbouring nodes.
    pub(crate) processed_comments: HashSet<usize>,
}

impl<'src> CodeGen<'src> {
    pub fn new(source: &'src str, options: CompilerOptions) -> Self {
        CodeGen {
            source,
            options,
            lines: Vec::new(),
            depth: 0,
            label_counter: 0,
            functions: Vec::new(),
            scopes: Vec::new(),
            loops: Vec::new(),
            processed_comments: HashSet::new(),
        }
    }

    /// The finished (pre-coalescing) instruction lines.
    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    pub(crate) fn inside_function(&self) -> bool {
        !self.functions.is_empty()
    }

    pub(crate) fn current_function_mut(&mut self) -> Result<&mut FunctionFrame, CompileError> {
        self.functions.last_mut().ok_or_else(|| {
            CompileError::new(ErrorKind::Internal, "no function frame on the stack")
        })
    }

    /// Resolve a variable name against the innermost register-variables
    /// context only; outer contexts are other frames' register files.
    pub(crate) fn resolve_register(&self, name: &str) -> Option<Register> {
        match self.scopes.last()? {
            RegisterScope::Function => self.functions.last()?.resolve(name).cloned(),
            RegisterScope::Explicit(bindings) => bindings.get(name).cloned(),
        }
    }

    /// Run `body` with `frame` as the innermost function and register
    /// context. Both stacks are popped again even when `body` fails.
    pub(crate) fn with_function_frame<T>(
        &mut self,
        frame: FunctionFrame,
        body: impl FnOnce(&mut Self) -> Result<T, CompileError>,
    ) -> Result<T, CompileError> {
        self.functions.push(frame);
        self.scopes.push(RegisterScope::Function);
        let result = body(self);
        self.scopes.pop();
        self.functions.pop();
        result
    }

    /// Run `body` with a loop context whose break jumps to `end_label`.
    pub(crate) fn with_loop<T>(
        &mut self,
        end_label: String,
        body: impl FnOnce(&mut Self) -> Result<T, CompileError>,
    ) -> Result<T, CompileError> {
        self.loops.push(LoopFrame { end_label });
        let result = body(self);
        self.loops.pop();
        result
    }
}
