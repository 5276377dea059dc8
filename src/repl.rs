// File: src/repl.rs
//
// Interactive REPL for MacroCalc.
// Declarations persist across inputs in the outermost scope, bare expressions
// echo their value, and errors are reported without ending the session.
// Multi-line input continues while braces or parentheses are unclosed.

use crate::ast::Node;
use crate::errors::CalcResult;
use crate::interpreter::Interpreter;
use crate::lexer;
use crate::parser::Parser;
use crate::symbol_table::SymbolTable;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::{Arc, Mutex};

/// Interpreter state shared by every input of one REPL session
pub struct ReplSession {
    interpreter: Interpreter,
    symbols: SymbolTable,
}

impl ReplSession {
    pub fn new(precision: usize) -> Self {
        let mut interpreter = Interpreter::new();
        interpreter.set_precision(precision);
        ReplSession { interpreter, symbols: SymbolTable::new() }
    }

    /// Redirects `print` output into a buffer instead of stdout
    pub fn set_output(&mut self, output: Arc<Mutex<Vec<u8>>>) {
        self.interpreter.set_output(output);
    }

    /// Parses and runs one complete input. Returns the values of its bare
    /// expression statements, in order. A failed input leaves none of its
    /// declarations behind, so the names can be declared again.
    pub fn eval(&mut self, input: &str) -> CalcResult<Vec<f64>> {
        let checkpoint = self.symbols.checkpoint();
        let result = self.eval_statements(input);
        if result.is_err() {
            self.symbols.rollback(checkpoint);
        }
        result
    }

    fn eval_statements(&mut self, input: &str) -> CalcResult<Vec<f64>> {
        let tokens = lexer::tokenize(input)?;
        let stmts = Parser::new(tokens, &mut self.symbols).parse_statements()?;

        let mut echoed = Vec::new();
        for stmt in &stmts {
            let value = self.interpreter.evaluate(stmt, &mut self.symbols)?;
            if let (Some(value), false) = (value, matches!(stmt, Node::Assign { .. })) {
                echoed.push(value);
            }
        }
        Ok(echoed)
    }

    pub fn format_number(&self, value: f64) -> String {
        self.interpreter.format_number(value)
    }

    /// Visible variables with their values, `None` when uninitialized
    pub fn variables(&self) -> Vec<(String, Option<f64>)> {
        self.symbols
            .visible_variables()
            .into_iter()
            .map(|(_, var)| (var.name.clone(), var.initialized.then_some(var.value)))
            .collect()
    }

    /// Forgets every declaration
    pub fn reset(&mut self) {
        self.symbols = SymbolTable::new();
    }
}

/// REPL front end: line editing, commands and colored output
pub struct Repl {
    session: ReplSession,
    editor: DefaultEditor,
}

impl Repl {
    pub fn new(precision: usize) -> Result<Self, Box<dyn std::error::Error>> {
        let editor = DefaultEditor::new()?;
        Ok(Repl { session: ReplSession::new(precision), editor })
    }

    fn show_banner(&self) {
        println!("{}", format!("MacroCalc REPL v{}", env!("CARGO_PKG_VERSION")).bright_cyan().bold());
        println!(
            "  Type {} for commands or {} to exit. Unclosed braces continue on the next line.",
            ":help".bright_yellow(),
            ":quit".bright_yellow()
        );
        println!();
    }

    pub fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.show_banner();

        let mut buffer = String::new();

        loop {
            let prompt = if buffer.is_empty() {
                "mc> ".bright_green().to_string()
            } else {
                "..> ".bright_blue().to_string()
            };

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let _ = self.editor.add_history_entry(line.as_str());

                    if buffer.is_empty() && line.trim().starts_with(':') {
                        if self.handle_command(line.trim()) {
                            continue;
                        } else {
                            break;
                        }
                    }

                    buffer.push_str(&line);
                    buffer.push('\n');

                    if is_input_complete(&buffer) {
                        self.eval_input(&buffer);
                        buffer.clear();
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C (input discarded, :quit to exit)".bright_yellow());
                    buffer.clear();
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "Goodbye!".bright_cyan());
                    break;
                }
                Err(err) => {
                    eprintln!("{} {}", "Error:".bright_red(), err);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Returns false when the session should end
    fn handle_command(&mut self, cmd: &str) -> bool {
        match cmd {
            ":help" | ":h" => {
                self.show_help();
                true
            }
            ":quit" | ":q" | ":exit" => {
                println!("{}", "Goodbye!".bright_cyan());
                false
            }
            ":clear" | ":c" => {
                print!("\x1B[2J\x1B[1;1H");
                self.show_banner();
                true
            }
            ":vars" | ":v" => {
                self.show_variables();
                true
            }
            ":reset" | ":r" => {
                self.session.reset();
                println!("{}", "✓ Variables cleared".bright_green());
                true
            }
            _ => {
                println!(
                    "{} Unknown command: {}. Type {} for available commands.",
                    "Error:".bright_red(),
                    cmd.bright_yellow(),
                    ":help".bright_yellow()
                );
                true
            }
        }
    }

    fn show_help(&self) {
        println!();
        println!("{}", "REPL Commands:".bright_cyan().bold());
        println!("  {}{}  Display this help message", ":help".bright_yellow(), " or :h ".dimmed());
        println!("  {}{}  Exit the REPL", ":quit".bright_yellow(), " or :q ".dimmed());
        println!("  {}{}  Clear the screen", ":clear".bright_yellow(), " or :c".dimmed());
        println!("  {}{}  Show declared variables", ":vars".bright_yellow(), " or :v ".dimmed());
        println!("  {}{}  Forget all variables", ":reset".bright_yellow(), " or :r".dimmed());
        println!();
        println!("{}", "Examples:".bright_cyan().bold());
        println!("  {}", "mc> var r = 2;".dimmed());
        println!("  {}", "mc> 3.14159 * r ** 2;".dimmed());
        println!("  {}", "=> 12.5664".dimmed());
        println!("  {}", "mc> print(\"area {3.14159 * r ** 2}\");".dimmed());
        println!();
    }

    fn show_variables(&self) {
        let vars = self.session.variables();
        if vars.is_empty() {
            println!("  {}", "(no variables declared)".dimmed());
            return;
        }
        for (name, value) in vars {
            let shown = match value {
                Some(value) => self.session.format_number(value).bright_white(),
                None => "<uninitialized>".dimmed(),
            };
            println!("  {} = {}", name.bright_yellow(), shown);
        }
    }

    fn eval_input(&mut self, input: &str) {
        if input.trim().is_empty() {
            return;
        }

        match self.session.eval(input) {
            Ok(values) => {
                for value in values {
                    println!("{} {}", "=>".bright_blue(), self.session.format_number(value).bright_white());
                }
            }
            Err(err) => {
                tracing::debug!(kind = %err.kind, "repl input failed");
                println!("{} {}", "Error:".bright_red().bold(), err.summary().bright_red());
            }
        }
    }
}

/// True when every brace and parenthesis outside strings and comments is
/// closed and no string is left open.
pub fn is_input_complete(input: &str) -> bool {
    let mut brace_count = 0i32;
    let mut paren_count = 0i32;
    let mut in_string = false;
    let mut escape_next = false;
    let mut in_comment = false;

    for ch in input.chars() {
        if in_comment {
            if ch == '\n' {
                in_comment = false;
            }
            continue;
        }

        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '#' if !in_string => in_comment = true,
            '{' if !in_string => brace_count += 1,
            '}' if !in_string => brace_count -= 1,
            '(' if !in_string => paren_count += 1,
            ')' if !in_string => paren_count -= 1,
            _ => {}
        }
    }

    // Over-closed input is "complete" so the parser can report it.
    !in_string && brace_count <= 0 && paren_count <= 0
}
