// File: src/main.rs
//
// Main entry point for the MacroCalc interpreter.
// Handles command-line argument parsing and dispatches to the appropriate
// subcommand (run, repl, test or ast).

use clap::{Parser as ClapParser, Subcommand};
use macrocalc::config::{ColorChoice, Config};
use macrocalc::errors::{CalcError, CalcResult};
use macrocalc::interpreter::Interpreter;
use macrocalc::logging;
use macrocalc::program::{run_source, Program};
use macrocalc::repl::Repl;
use macrocalc::test_runner::TestRunner;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

#[derive(ClapParser)]
#[command(
    name = "macrocalc",
    about = "MacroCalc: a tiny scripting language for numeric calculations",
    version = env!("CARGO_PKG_VERSION"),
    long_about = None
)]
struct Cli {
    /// Configuration file (defaults to ./macrocalc.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// When to use colored diagnostics
    #[arg(long, global = true, value_enum)]
    color: Option<ColorChoice>,

    /// Significant digits used when printing numbers
    #[arg(long, global = true)]
    precision: Option<usize>,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
#[command(arg_required_else_help = true)]
enum Commands {
    /// Run a MacroCalc script file
    Run {
        /// Path to the .mc file
        file: PathBuf,
    },

    /// Launch the interactive REPL
    Repl,

    /// Run every .mc script in a directory against its .out snapshot
    Test {
        /// Directory holding the scripts
        #[arg(default_value = "tests/scripts")]
        dir: PathBuf,

        /// Regenerate all .out files based on actual output
        #[arg(long)]
        update: bool,
    },

    /// Print the resolved syntax tree of a script as JSON
    Ast {
        /// Path to the .mc file
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = match Config::load(cli.config.as_deref())
        .and_then(|config| config.with_precision(cli.precision))
        .map(|config| config.with_color(cli.color))
    {
        Ok(config) => config,
        Err(err) => {
            eprint!("{}", err);
            process::exit(1);
        }
    };
    config.diagnostics.color.apply();

    let code = match cli.command {
        Commands::Run { file } => report(run_file(&file, &config), &config),
        Commands::Repl => match Repl::new(config.output.precision).and_then(|mut repl| repl.run()) {
            Ok(()) => 0,
            Err(err) => {
                eprintln!("Error: {}", err);
                1
            }
        },
        Commands::Test { dir, update } => {
            let mut runner = TestRunner::new(update, config.output.precision);
            match runner.collect_tests(&dir) {
                Ok(()) => {
                    let report = runner.run_all();
                    report.print();
                    report.exit_code()
                }
                Err(e) => report::<()>(
                    Err(CalcError::io(format!("Failed to read {}: {}", dir.display(), e))),
                    &config,
                ),
            }
        }
        Commands::Ast { file } => report(print_ast(&file), &config),
    };

    process::exit(code);
}

fn read_script(path: &Path) -> CalcResult<String> {
    fs::read_to_string(path).map_err(|e| CalcError::io(format!("Failed to read {}: {}", path.display(), e)))
}

fn run_file(path: &Path, config: &Config) -> CalcResult<()> {
    let source = read_script(path)?;
    tracing::debug!(path = %path.display(), bytes = source.len(), "running script");
    let mut interpreter = Interpreter::new();
    interpreter.set_precision(config.output.precision);
    run_source(&source, &mut interpreter)
}

fn print_ast(path: &Path) -> CalcResult<()> {
    let source = read_script(path)?;
    let program = Program::compile(&source).map_err(|err| err.with_source_from(&source))?;
    let json = serde_json::to_string_pretty(program.root())
        .map_err(|e| CalcError::internal(format!("Failed to serialize tree: {}", e)))?;
    println!("{}", json);
    Ok(())
}

/// Prints a failed result as a diagnostic and turns it into an exit code
fn report<T>(result: CalcResult<T>, config: &Config) -> i32 {
    match result {
        Ok(_) => 0,
        Err(mut err) => {
            if !config.diagnostics.show_source {
                err.source_line = None;
            }
            eprint!("{}", err);
            1
        }
    }
}
