//! CD25 Compiler
//!
//! Command-line driver: reads a CD25 source file and writes SM code, the
//! constant pool and a program listing next to it.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use cd25c::frontend::printer::{print_tokens, print_tree};
use cd25c::{compile, CompileOptions, Compilation};

/// CD25 Compiler
#[derive(Parser, Debug)]
#[command(name = "cd25c")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CD25 compiler - translates CD25 programs to SM stack machine code")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input source file
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    #[command(flatten)]
    build: BuildArgs,
}

#[derive(clap::Args, Debug, Clone)]
struct BuildArgs {
    /// Output file for the generated code (default: <stem>.asm)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Print the program listing
    #[arg(long)]
    listing: bool,

    /// Print the token stream
    #[arg(long)]
    emit_tokens: bool,

    /// Print the syntax tree
    #[arg(long)]
    emit_ast: bool,

    /// Diagnostic output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Maximum nesting depth accepted by the parser
    #[arg(long, default_value_t = cd25c::frontend::parser::DEFAULT_MAX_DEPTH)]
    max_depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a source file
    Build {
        /// Input source file
        input: PathBuf,

        #[command(flatten)]
        args: BuildArgs,
    },
    /// Check a source file for errors
    Check {
        /// Input source file
        input: PathBuf,

        /// Diagnostic output format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Print version information
    Version,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Build { input, args }) => build_file(&input, &args),
        Some(Commands::Check { input, format }) => check_file(&input, format),
        Some(Commands::Version) => {
            println!("cd25c {}", env!("CARGO_PKG_VERSION"));
            println!("CD25 Compiler");
            Ok(true)
        }
        None => match cli.input {
            Some(input) => build_file(&input, &cli.build),
            None => {
                eprintln!("Error: No input file specified");
                eprintln!("Usage: cd25c <FILE> or cd25c build <FILE>");
                process::exit(1);
            }
        },
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn read_source(input: &Path) -> Result<String> {
    fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

/// Report diagnostics; `true` when there were none
fn report(compilation: &Compilation, input: &Path, format: Format) -> bool {
    match format {
        Format::Json => println!("{}", compilation.feedback(&input.display().to_string()).to_json()),
        Format::Text => {
            for diagnostic in compilation.diagnostics.iter() {
                eprintln!("{}: {}", input.display(), diagnostic);
            }
        }
    }
    compilation.is_success()
}

/// Compile a source file; `Ok(false)` when it had diagnostics
fn build_file(input: &Path, args: &BuildArgs) -> Result<bool> {
    let source = read_source(input)?;
    let options = CompileOptions {
        max_depth: args.max_depth,
    };
    let compilation = compile(&source, &options).context("code generation failed")?;

    if args.emit_tokens {
        print!("{}", print_tokens(&compilation.tokens));
    }
    if args.emit_ast {
        print!("{}", print_tree(&compilation.ast));
    }

    let listing = compilation.render_listing();
    write_file(&input.with_extension("lst"), &listing)?;
    if args.listing {
        print!("{}", listing);
    }

    let ok = report(&compilation, input, args.format);
    if let Some(module) = &compilation.module {
        let asm_path = args.output.clone().unwrap_or_else(|| input.with_extension("asm"));
        write_file(&asm_path, &module.code)?;

        let pool = serde_json::to_string_pretty(&module.constants).context("failed to encode constant pool")?;
        write_file(&input.with_extension("pool.json"), &pool)?;

        if args.format == Format::Text {
            println!("Output: {}", asm_path.display());
        }
    }
    Ok(ok)
}

/// Check a source file for errors without writing anything
fn check_file(input: &Path, format: Format) -> Result<bool> {
    let source = read_source(input)?;
    let compilation = compile(&source, &CompileOptions::default()).context("code generation failed")?;
    let ok = report(&compilation, input, format);
    if ok && format == Format::Text {
        println!("No errors found");
    }
    Ok(ok)
}
