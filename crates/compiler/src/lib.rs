//! js2f compiler library
//!
//! Compiles a restricted JavaScript subset to textual stack-machine
//! assembly for the Flash Player 8 (AS2) VM, ready for an external
//! assembler. Parsing stays outside the compiler: the input is the
//! source text plus the JSON AST a mainstream JavaScript parser
//! produced for it.
//!
//! The pipeline is three passes over one list of instruction lines:
//! generation ([`CodeGen`]), push coalescing ([`peephole`]), and the
//! symbolic stack annotation ([`StackSimulator`]).
//!
//! ```rust,ignore
//! use js2fc::{CompilerOptions, compile_source};
//!
//! let assembly = compile_source(source, ast_json, &CompilerOptions::default())?;
//! std::fs::write("out.flm", assembly)?;
//! ```

pub mod ast;
pub mod codegen;
pub mod config;
pub mod directives;
pub mod error;
pub mod peephole;
pub mod registers;
pub mod simulator;

pub use codegen::CodeGen;
pub use config::{CompilerOptions, ProjectConfig};
pub use error::{CompileError, ErrorKind};
pub use registers::{Register, RegisterAllocator};
pub use simulator::StackSimulator;

use ast::Node;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Compile source text plus its parsed AST (JSON) to assembly text.
pub fn compile_source(
    source: &str,
    ast_json: &str,
    options: &CompilerOptions,
) -> Result<String, CompileError> {
    let ast: Node = parse_ast(ast_json)?;
    compile_ast(source, &ast, options)
}

/// Compile an already-deserialized AST to assembly text.
pub fn compile_ast(
    source: &str,
    ast: &Node,
    options: &CompilerOptions,
) -> Result<String, CompileError> {
    let mut generator = CodeGen::new(source, options.clone());
    generator.generate(ast)?;
    let lines = generator.into_lines();
    debug!(lines = lines.len(), "generation done");
    let lines = peephole::coalesce_pushes(lines);
    debug!(lines = lines.len(), "push coalescing done");
    let lines = if options.annotate {
        StackSimulator::new().annotate(&lines)?
    } else {
        lines
    };
    Ok(render(&lines))
}

/// Deserialize the parser's JSON output.
pub fn parse_ast(ast_json: &str) -> Result<Node, CompileError> {
    serde_json::from_str(ast_json).map_err(|e| {
        CompileError::new(
            ErrorKind::InvalidAst,
            format!("could not read the parser output: {}", e),
        )
    })
}

/// Compile one source file with its AST sidecar into `output_path`.
///
/// Errors come back framed against the source. With
/// [`CompilerOptions::debug_output`] set, the instructions emitted
/// before a failure land in `<output>.partial.flm`.
pub fn compile_file(
    source_path: &Path,
    ast_path: &Path,
    output_path: &Path,
    options: &CompilerOptions,
) -> Result<(), String> {
    let source = fs::read_to_string(source_path)
        .map_err(|e| format!("Failed to read {}: {}", source_path.display(), e))?;
    let ast_json = fs::read_to_string(ast_path)
        .map_err(|e| format!("Failed to read {}: {}", ast_path.display(), e))?;
    let ast = parse_ast(&ast_json)
        .map_err(|error| error.frame(&ast_path.display().to_string(), ""))?;

    let mut generator = CodeGen::new(&source, options.clone());
    let generated = generator.generate(&ast);
    let lines = generator.into_lines();
    if let Err(error) = generated {
        dump_partial(&lines, output_path, options);
        return Err(error.frame(&source_path.display().to_string(), &source));
    }

    let lines = peephole::coalesce_pushes(lines);
    let lines = if options.annotate {
        match StackSimulator::new().annotate(&lines) {
            Ok(annotated) => annotated,
            Err(error) => {
                dump_partial(&lines, output_path, options);
                return Err(error.frame(&source_path.display().to_string(), &source));
            }
        }
    } else {
        lines
    };

    fs::write(output_path, render(&lines))
        .map_err(|e| format!("Failed to write {}: {}", output_path.display(), e))
}

fn dump_partial(lines: &[String], output_path: &Path, options: &CompilerOptions) {
    if !options.debug_output || lines.is_empty() {
        return;
    }
    let partial_path = output_path.with_extension("partial.flm");
    if fs::write(&partial_path, render(lines)).is_ok() {
        debug!(path = %partial_path.display(), "wrote partial output");
    }
}

fn render(lines: &[String]) -> String {
    let mut text = lines.join("\n");
    text.push('\n');
    text
}
