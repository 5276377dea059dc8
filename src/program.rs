// File: src/program.rs
//
// A compiled MacroCalc program: the resolved tree together with the symbol
// table its identifier ids point into.

use crate::ast::Node;
use crate::errors::CalcResult;
use crate::interpreter::Interpreter;
use crate::lexer;
use crate::parser::Parser;
use crate::symbol_table::SymbolTable;
use std::time::Instant;

pub struct Program {
    root: Node,
    symbols: SymbolTable,
}

impl Program {
    /// Lex and parse `source` into a root Scope, resolving every name.
    pub fn compile(source: &str) -> CalcResult<Self> {
        let tokens = lexer::tokenize(source)?;
        let mut symbols = SymbolTable::new();
        let root = Parser::new(tokens, &mut symbols).parse_program()?;
        tracing::debug!(variables = symbols.len(), "compiled program");
        Ok(Program { root, symbols })
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Run the program from a clean table. Running twice gives the same output.
    pub fn run(&mut self, interpreter: &mut Interpreter) -> CalcResult<()> {
        self.symbols.reset();
        let start = Instant::now();
        let result = interpreter.evaluate(&self.root, &mut self.symbols);
        tracing::debug!(elapsed = ?start.elapsed(), ok = result.is_ok(), "program finished");
        result.map(|_| ())
    }
}

/// Compile and run `source` once. Errors come back with the offending source
/// line attached.
pub fn run_source(source: &str, interpreter: &mut Interpreter) -> CalcResult<()> {
    Program::compile(source)
        .and_then(|mut program| program.run(interpreter))
        .map_err(|err| err.with_source_from(source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_compile_reports_parse_errors() {
        let err = Program::compile("print(1)").err().unwrap();
        assert_eq!(err.kind, ErrorKind::ParseError);
    }

    #[test]
    fn test_run_resets_state_between_runs() {
        let mut program = Program::compile("var n; print(1); n = 2; print(n);").unwrap();
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let mut interp = Interpreter::new();
        interp.set_output(buffer.clone());

        program.run(&mut interp).unwrap();
        program.run(&mut interp).unwrap();
        let out = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert_eq!(out, "1\n2\n1\n2\n");
        assert_eq!(program.symbols().depth(), 1);
    }

    #[test]
    fn test_run_source_attaches_source_line() {
        let mut interp = Interpreter::new();
        interp.set_output(Arc::new(Mutex::new(Vec::new())));
        let err = run_source("var a = 1;\nprint(a / 0);", &mut interp).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DivisionByZero);
        assert_eq!(err.source_line.as_deref(), Some("print(a / 0);"));
    }
}
