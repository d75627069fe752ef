//! CLI entry point: a two-mode (interpret / `--compile`) driver over
//! the lex → parse → load → type-check → run-or-emit pipeline, with a
//! `-v`/`--verbose` log level and a process exit code policy.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use clap::{Parser, ValueEnum};
use log::{debug, error, info};

use oxc::{emitter, interpreter, lexer, loader, parser, typechecker};

/// Compiler/interpreter for the `.0x` source language.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Path to the `.0x` source file.
    source: PathBuf,

    /// Emit C and invoke an external C compiler instead of interpreting.
    #[arg(long)]
    compile: bool,

    /// Output path for the generated C file (compile mode only).
    output: Option<PathBuf>,

    /// Print the token stream and exit without type checking or running.
    #[arg(long)]
    dump_tokens: bool,

    /// Print the parsed AST and exit without type checking or running.
    #[arg(long)]
    dump_ast: bool,

    /// Render `--dump-tokens`/`--dump-ast` as JSON instead of `Debug` text.
    #[arg(long)]
    json: bool,

    /// Log verbosity.
    #[arg(value_enum, short, long, default_value_t = LogLevel::default())]
    verbosity: LogLevel,
}

#[derive(ValueEnum, Clone, Default, Debug)]
enum LogLevel {
    #[default]
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<&LogLevel> for log::Level {
    fn from(value: &LogLevel) -> Self {
        match value {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

const C_COMPILERS: [&str; 3] = ["gcc", "clang", "cl"];

fn main() {
    let cli = Cli::parse();
    simple_logger::init_with_level(log::Level::from(&cli.verbosity))
        .expect("logger should initialize exactly once");

    if let Err(err) = run(&cli) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    debug!("reading source file '{}'", cli.source.display());
    let source = fs::read_to_string(&cli.source)
        .map_err(|e| format!("could not read '{}': {e}", cli.source.display()))?;

    let tokens = lexer::lex(&source)?;
    if cli.dump_tokens {
        dump(&tokens, cli.json)?;
        return Ok(());
    }

    let program = parser::parse(tokens, source.as_str())?;
    if cli.dump_ast {
        dump(&program, cli.json)?;
        return Ok(());
    }

    let std_dir = std::env::current_dir()?.join("src").join("std");
    let program = loader::resolve(program, &std_dir)?;

    let (class_table, errors) = typechecker::check(&program, &source);
    if !errors.is_empty() {
        return Err(Box::new(errors));
    }

    if cli.compile {
        compile(&program, &class_table, &cli.source, cli.output.as_deref())
    } else {
        info!("interpreting '{}'", cli.source.display());
        interpreter::interpret(&program, &class_table, &mut std::io::stdout())?;
        Ok(())
    }
}

fn compile(
    program: &oxc::ast::Program,
    class_table: &typechecker::ClassTable,
    source_path: &Path,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let c_path = output
        .map(PathBuf::from)
        .unwrap_or_else(|| source_path.with_extension("c"));

    info!("emitting C to '{}'", c_path.display());
    let c_source = emitter::emit(program, class_table);
    fs::write(&c_path, c_source)?;

    let exe_path = c_path.with_extension("");

    for cc in C_COMPILERS {
        if which(cc).is_none() {
            continue;
        }

        let status = if cc == "cl" {
            Command::new(cc)
                .arg(format!("/Fe{}.exe", exe_path.display()))
                .arg(&c_path)
                .status()
        } else {
            Command::new(cc)
                .arg("-o")
                .arg(&exe_path)
                .arg(&c_path)
                .status()
        };

        match status {
            Ok(status) if status.success() => {
                info!("built '{}' with {cc}", exe_path.display());
                return Ok(());
            }
            Ok(status) => {
                return Err(format!("{cc} exited with {status}").into());
            }
            Err(e) => {
                error!("failed to invoke {cc}: {e}");
                continue;
            }
        }
    }

    Err("no C compiler found (tried gcc, clang, cl)".into())
}

fn dump(
    value: &(impl std::fmt::Debug + serde::Serialize),
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{value:#?}");
    }
    Ok(())
}

fn which(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
