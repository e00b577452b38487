//! Artemis compiler CLI.
//!
//! Command-line interface for compiling `.arx` programs to textual LLVM
//! IR. All user-facing output goes through `println!`/`eprintln!` here;
//! the library crate itself never prints.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use std::process;

use arxc::CompilerConfig;

#[derive(ClapParser)]
#[command(name = "arxc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Artemis compiler - compile .arx programs to LLVM IR", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a .arx file to LLVM IR
    Build {
        /// Input .arx source file
        input: PathBuf,

        /// Output .ll path (defaults to input filename with a .ll extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Additional directories to search for .map files
        #[arg(long = "map-path", value_name = "DIR")]
        map_paths: Vec<PathBuf>,
    },

    /// Print the compiler version
    Version,

    /// Check that configured map-file search paths exist
    Environment {
        #[arg(long = "map-path", value_name = "DIR")]
        map_paths: Vec<PathBuf>,
    },

    /// Lex and parse a .arx file, printing its AST (debugging aid only)
    Insight {
        input: PathBuf,
    },

    /// Toolchain bootstrap (not yet implemented)
    Install,

    /// Toolchain bootstrap (not yet implemented)
    Site,

    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, map_paths } => run_build(&input, output, &map_paths),
        Commands::Version => println!("arxc {}", env!("CARGO_PKG_VERSION")),
        Commands::Environment { map_paths } => run_environment(&map_paths),
        Commands::Insight { input } => run_insight(&input),
        Commands::Install | Commands::Site => {
            eprintln!("not yet implemented");
            process::exit(1);
        }
        Commands::Completions { shell } => run_completions(shell),
    }
}

fn run_build(input: &std::path::Path, output: Option<PathBuf>, map_paths: &[PathBuf]) {
    let output = output.unwrap_or_else(|| input.with_extension("ll"));

    let mut config = CompilerConfig::new();
    for path in map_paths {
        config = config.with_map_path(path.clone());
    }

    match arxc::compile_file(input, &config) {
        Ok(ir) => {
            if let Err(e) = std::fs::write(&output, ir) {
                eprintln!("Error: failed to write {}: {e}", output.display());
                process::exit(1);
            }
            println!("Compiled {} -> {}", input.display(), output.display());
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn run_environment(map_paths: &[PathBuf]) {
    if map_paths.is_empty() {
        println!("No extra map-file search paths configured.");
        return;
    }
    for path in map_paths {
        if path.is_dir() {
            println!("OK   {}", path.display());
        } else {
            println!("MISS {}", path.display());
        }
    }
}

fn run_insight(input: &std::path::Path) {
    let source = match std::fs::read_to_string(input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: failed to read {}: {e}", input.display());
            process::exit(1);
        }
    };
    match arxc::parser::parse(&source) {
        Ok(program) => println!("{program:#?}"),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "arxc", &mut io::stdout());
}
