//! js2f Compiler CLI
//!
//! Command-line interface for compiling .js sources (with the JSON AST
//! sidecars an external parser produced) into .flm assembly files.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

#[derive(ClapParser)]
#[command(name = "js2fc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "js2f compiler - compile a JavaScript subset to AS2 assembly", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile .js files (or directories of them) to .flm assembly
    Build {
        /// Input .js files or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// AST sidecar path (single file input only; defaults to
        /// <input>.ast.json)
        #[arg(long)]
        ast: Option<PathBuf>,

        /// Output path (single file input only; defaults to <stem>.flm)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory for compiled output (defaults to each input's
        /// directory)
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Explicit js2f.toml (defaults to the one next to each input)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Skip the stack-annotation pass
        #[arg(long)]
        no_annotate: bool,

        /// Echo statement source text into the output as comments
        #[arg(long)]
        source_comments: bool,

        /// Keep whatever was emitted before a failure in
        /// <output>.partial.flm
        #[arg(long)]
        debug_output: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            inputs,
            ast,
            output,
            out_dir,
            config,
            no_annotate,
            source_comments,
            debug_output,
        } => {
            run_build(BuildArgs {
                inputs,
                ast,
                output,
                out_dir,
                config,
                no_annotate,
                source_comments,
                debug_output,
            });
        }
        Commands::Completions { shell } => {
            run_completions(shell);
        }
    }
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "js2fc", &mut io::stdout());
}

struct BuildArgs {
    inputs: Vec<PathBuf>,
    ast: Option<PathBuf>,
    output: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    config: Option<PathBuf>,
    no_annotate: bool,
    source_comments: bool,
    debug_output: bool,
}

fn run_build(args: BuildArgs) {
    let sources = collect_sources(&args.inputs);
    if sources.is_empty() {
        eprintln!("Error: no .js inputs found");
        process::exit(1);
    }
    if sources.len() > 1 && (args.ast.is_some() || args.output.is_some()) {
        eprintln!("Error: --ast and --output only apply to a single input file");
        process::exit(1);
    }

    for source_path in &sources {
        let config = load_config(args.config.as_deref(), source_path);
        let mut options = config
            .as_ref()
            .map(js2fc::ProjectConfig::options)
            .unwrap_or_default();
        if args.no_annotate {
            options.annotate = false;
        }
        if args.source_comments {
            options.source_comments = true;
        }
        if args.debug_output {
            options.debug_output = true;
        }

        let ast_path = args
            .ast
            .clone()
            .unwrap_or_else(|| sidecar_ast_path(source_path));
        let out_dir = args
            .out_dir
            .clone()
            .or_else(|| config.as_ref().and_then(|c| c.build.out_dir.clone()));
        let output_path = args
            .output
            .clone()
            .unwrap_or_else(|| output_path_for(source_path, out_dir.as_deref()));
        if let Some(parent) = output_path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            eprintln!("Error: could not create {}: {}", parent.display(), e);
            process::exit(1);
        }

        match js2fc::compile_file(source_path, &ast_path, &output_path, &options) {
            Ok(()) => {
                println!(
                    "Compiled {} -> {}",
                    source_path.display(),
                    output_path.display()
                );
            }
            Err(message) => {
                eprintln!("{}", message.trim_end());
                process::exit(1);
            }
        }
    }
}

fn load_config(explicit: Option<&Path>, source_path: &Path) -> Option<js2fc::ProjectConfig> {
    let loaded = match explicit {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(content) => js2fc::ProjectConfig::from_toml(&content).map(Some),
            Err(e) => Err(format!("Failed to read {}: {}", path.display(), e)),
        },
        None => js2fc::ProjectConfig::load_near(source_path),
    };
    match loaded {
        Ok(config) => config,
        Err(message) => {
            eprintln!("Error: {}", message);
            process::exit(1);
        }
    }
}

/// The AST the external parser wrote next to the source:
/// `game.js` -> `game.js.ast.json`.
fn sidecar_ast_path(source_path: &Path) -> PathBuf {
    let mut sidecar = OsString::from(source_path.as_os_str());
    sidecar.push(".ast.json");
    PathBuf::from(sidecar)
}

fn output_path_for(source_path: &Path, out_dir: Option<&Path>) -> PathBuf {
    let file_name = source_path.with_extension("flm");
    match (out_dir, file_name.file_name()) {
        (Some(directory), Some(name)) => directory.join(name),
        _ => file_name,
    }
}

/// Gather .js files from the inputs, walking directories recursively.
/// Sidecar .ast.json files are never inputs themselves.
fn collect_sources(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut sources = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in walkdir(input) {
                if entry.extension().is_some_and(|e| e == "js") {
                    sources.push(entry);
                }
            }
        } else if input.exists() {
            sources.push(input.clone());
        } else {
            eprintln!("Warning: {} does not exist", input.display());
        }
    }
    sources.sort();
    sources
}

/// Simple recursive directory walker with error logging.
fn walkdir(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    match std::fs::read_dir(dir) {
        Ok(entries) => {
            for entry in entries {
                match entry {
                    Ok(entry) => {
                        let path = entry.path();
                        if path.is_dir() {
                            files.extend(walkdir(&path));
                        } else {
                            files.push(path);
                        }
                    }
                    Err(e) => {
                        eprintln!(
                            "Warning: could not read directory entry in {}: {}",
                            dir.display(),
                            e
                        );
                    }
                }
            }
        }
        Err(e) => {
            eprintln!("Warning: could not read {}: {}", dir.display(), e);
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidecar_ast_path() {
        assert_eq!(
            sidecar_ast_path(Path::new("scripts/game.js")),
            PathBuf::from("scripts/game.js.ast.json")
        );
    }

    #[test]
    fn test_output_path_defaults_next_to_source() {
        assert_eq!(
            output_path_for(Path::new("scripts/game.js"), None),
            PathBuf::from("scripts/game.flm")
        );
    }

    #[test]
    fn test_output_path_honors_out_dir() {
        assert_eq!(
            output_path_for(Path::new("scripts/game.js"), Some(Path::new("build"))),
            PathBuf::from("build/game.flm")
        );
    }

    #[test]
    fn test_collect_sources_walks_directories() {
        let directory = tempfile::tempdir().unwrap();
        let nested = directory.path().join("level");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(directory.path().join("a.js"), "").unwrap();
        std::fs::write(directory.path().join("a.js.ast.json"), "{}").unwrap();
        std::fs::write(nested.join("b.js"), "").unwrap();
        std::fs::write(nested.join("notes.txt"), "").unwrap();

        let sources = collect_sources(&[directory.path().to_path_buf()]);
        let names: Vec<String> = sources
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.js", "b.js"]);
    }
}
