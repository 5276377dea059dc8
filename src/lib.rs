// File: src/lib.rs
//
// Library interface for the MacroCalc interpreter.
// Exposes modules for integration testing and external use.

pub mod ast;
pub mod config;
pub mod errors;
pub mod interpolation;
pub mod interpreter;
pub mod lexer;
pub mod logging;
pub mod parser;
pub mod program;
pub mod repl;
pub mod stack;
pub mod symbol_table;
pub mod test_runner;

pub use errors::{CalcError, CalcResult, ErrorKind};
pub use interpreter::Interpreter;
pub use program::{run_source, Program};
