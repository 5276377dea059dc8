// File: src/interpreter/mod.rs
//
// Tree-walking interpreter for MacroCalc.
// Executes programs by recursively evaluating the `Node` tree against a
// symbol table.
//
// Statements (Empty, Scope, Print, Conditional, While, String) evaluate to
// nothing; expressions (Assign, Identifier, Operation, Number) evaluate to a
// number. Conditions treat 0 as false and any other value, NaN included, as
// true. Logical and comparison operators produce 1 or 0.

mod number;

pub use number::{format_number, DEFAULT_PRECISION};

use crate::ast::{BinaryOp, Node, Operation, UnaryOp};
use crate::errors::{CalcError, CalcResult, ErrorKind, SourceLocation};
use crate::stack::ensure_sufficient_stack;
use crate::symbol_table::SymbolTable;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

fn truthy(value: f64) -> bool {
    value != 0.0
}

fn from_bool(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Applies a binary operator to two already evaluated operands.
///
/// `&&` and `||` are accepted for completeness, but `Interpreter::evaluate`
/// handles them itself so the right operand can be skipped.
pub fn apply_binary(op: BinaryOp, left: f64, right: f64, location: &SourceLocation) -> CalcResult<f64> {
    let result = match op {
        BinaryOp::And => from_bool(truthy(left) && truthy(right)),
        BinaryOp::Or => from_bool(truthy(left) || truthy(right)),
        BinaryOp::Pow => left.powf(right),
        BinaryOp::Mul => left * right,
        BinaryOp::Div => {
            if right == 0.0 {
                return Err(CalcError::new(ErrorKind::DivisionByZero, "Division by zero", location.clone()));
            }
            left / right
        }
        BinaryOp::Mod => {
            // operands are truncated toward zero before taking the remainder
            let divisor = right as i64;
            if divisor == 0 {
                return Err(CalcError::new(ErrorKind::ModulusByZero, "Modulus by zero", location.clone())
                    .with_note(format!("the divisor {} truncates to 0", format_number(right, DEFAULT_PRECISION))));
            }
            (left as i64).wrapping_rem(divisor) as f64
        }
        BinaryOp::Add => left + right,
        BinaryOp::Sub => left - right,
        BinaryOp::Less => from_bool(left < right),
        BinaryOp::Greater => from_bool(left > right),
        BinaryOp::LessEqual => from_bool(left <= right),
        BinaryOp::GreaterEqual => from_bool(left >= right),
        BinaryOp::Equal => from_bool(left == right),
        BinaryOp::NotEqual => from_bool(left != right),
    };
    Ok(result)
}

/// Main interpreter that executes MacroCalc programs
pub struct Interpreter {
    output: Option<Arc<Mutex<Vec<u8>>>>,
    precision: usize,
}

impl Interpreter {
    /// Creates an interpreter printing to stdout with the default precision
    pub fn new() -> Self {
        Interpreter { output: None, precision: DEFAULT_PRECISION }
    }

    /// Sets the output sink for print statements (used for testing and the golden runner)
    pub fn set_output(&mut self, output: Arc<Mutex<Vec<u8>>>) {
        self.output = Some(output);
    }

    /// Significant digits used when printing numbers
    pub fn set_precision(&mut self, precision: usize) {
        self.precision = precision.max(1);
    }

    pub fn precision(&self) -> usize {
        self.precision
    }

    pub fn format_number(&self, value: f64) -> String {
        format_number(value, self.precision)
    }

    /// Writes one printed line to either the output buffer or stdout
    fn write_output(&self, line: &str) -> CalcResult<()> {
        let written = if let Some(out) = &self.output {
            let mut buffer = out.lock().unwrap_or_else(PoisonError::into_inner);
            writeln!(&mut *buffer, "{}", line)
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", line)
        };
        written.map_err(|e| CalcError::io(format!("Failed to write output: {}", e)))
    }

    /// Evaluates a node, returning its numeric value for expressions and
    /// `None` for statements.
    pub fn evaluate(&mut self, node: &Node, symbols: &mut SymbolTable) -> CalcResult<Option<f64>> {
        ensure_sufficient_stack(|| self.evaluate_node(node, symbols))
    }

    fn evaluate_node(&mut self, node: &Node, symbols: &mut SymbolTable) -> CalcResult<Option<f64>> {
        match node {
            Node::Empty | Node::String(_) => Ok(None),
            Node::Scope(children) => {
                self.eval_scope(children, symbols)?;
                Ok(None)
            }
            Node::Print(parts) => {
                self.eval_print(parts, symbols)?;
                Ok(None)
            }
            Node::Assign { target, value } => {
                let value = self.evaluate_expect(value, symbols)?;
                symbols.set(target.id, value)?;
                Ok(Some(value))
            }
            Node::Identifier(identifier) => symbols.get(identifier.id, &identifier.location).map(Some),
            Node::Conditional { condition, then_branch, else_branch } => {
                if truthy(self.evaluate_expect(condition, symbols)?) {
                    self.evaluate(then_branch, symbols)?;
                } else if let Some(else_branch) = else_branch {
                    self.evaluate(else_branch, symbols)?;
                }
                Ok(None)
            }
            Node::Operation { operation, location } => self.eval_operation(operation, location, symbols).map(Some),
            Node::Number(value) => Ok(Some(*value)),
            Node::While { condition, body } => {
                self.eval_while(condition, body, symbols)?;
                Ok(None)
            }
        }
    }

    /// Evaluates a node that must produce a value.
    pub fn evaluate_expect(&mut self, node: &Node, symbols: &mut SymbolTable) -> CalcResult<f64> {
        self.evaluate(node, symbols)?.ok_or_else(|| {
            CalcError::internal(format!("{} node used where a value was expected", node.kind()))
        })
    }

    fn eval_scope(&mut self, children: &[Node], symbols: &mut SymbolTable) -> CalcResult<()> {
        let mut scope = symbols.enter_scope();
        for child in children {
            self.evaluate(child, &mut scope)?;
        }
        Ok(())
    }

    fn eval_print(&mut self, parts: &[Node], symbols: &mut SymbolTable) -> CalcResult<()> {
        let mut line = String::new();
        for part in parts {
            match part {
                Node::String(text) => line.push_str(text),
                expr => {
                    let value = self.evaluate_expect(expr, symbols)?;
                    line.push_str(&self.format_number(value));
                }
            }
        }
        self.write_output(&line)
    }

    fn eval_while(&mut self, condition: &Node, body: &Node, symbols: &mut SymbolTable) -> CalcResult<()> {
        let mut iterations: u64 = 0;
        while truthy(self.evaluate_expect(condition, symbols)?) {
            self.evaluate(body, symbols)?;
            iterations += 1;
        }
        tracing::trace!(iterations, "while loop finished");
        Ok(())
    }

    fn eval_operation(
        &mut self,
        operation: &Operation,
        location: &SourceLocation,
        symbols: &mut SymbolTable,
    ) -> CalcResult<f64> {
        match operation {
            Operation::Unary { op, operand } => {
                let value = self.evaluate_expect(operand, symbols)?;
                Ok(match op {
                    UnaryOp::Not => from_bool(!truthy(value)),
                    UnaryOp::Negate => -value,
                })
            }
            Operation::Binary { op, lhs, rhs } => {
                let left = self.evaluate_expect(lhs, symbols)?;
                match op {
                    BinaryOp::And if !truthy(left) => return Ok(0.0),
                    BinaryOp::Or if truthy(left) => return Ok(1.0),
                    BinaryOp::And | BinaryOp::Or => {
                        let right = self.evaluate_expect(rhs, symbols)?;
                        return Ok(from_bool(truthy(right)));
                    }
                    _ => {}
                }
                let right = self.evaluate_expect(rhs, symbols)?;
                apply_binary(*op, left, right, location)
            }
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Identifier, VarId};

    fn loc() -> SourceLocation {
        SourceLocation::new(1, 1)
    }

    fn num(value: f64) -> Node {
        Node::number(value)
    }

    fn bin(symbol: &str, lhs: Node, rhs: Node) -> Node {
        Node::binary(symbol, lhs, rhs, loc()).unwrap()
    }

    fn capture() -> (Interpreter, Arc<Mutex<Vec<u8>>>) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let mut interp = Interpreter::new();
        interp.set_output(buffer.clone());
        (interp, buffer)
    }

    fn text(buffer: &Arc<Mutex<Vec<u8>>>) -> String {
        String::from_utf8(buffer.lock().unwrap().clone()).unwrap()
    }

    fn eval(node: &Node) -> CalcResult<Option<f64>> {
        Interpreter::new().evaluate(node, &mut SymbolTable::new())
    }

    #[test]
    fn test_arithmetic_precedence_tree() {
        // 1 + 2 * 3
        let tree = bin("+", num(1.0), bin("*", num(2.0), num(3.0)));
        assert_eq!(eval(&tree).unwrap(), Some(7.0));

        // (1 + 2 * 3) == 7
        let eq = bin("==", tree, num(7.0));
        assert_eq!(eval(&eq).unwrap(), Some(1.0));

        // !((1 + 2 * 3) == 7)
        let not = Node::unary("!", eq, loc()).unwrap();
        assert_eq!(eval(&not).unwrap(), Some(0.0));
    }

    #[test]
    fn test_or_short_circuits_division_by_zero() {
        let lhs = bin("==", bin("+", num(1.0), bin("*", num(2.0), num(3.0))), num(7.0));
        let tree = bin("||", lhs, bin("/", num(1.0), num(0.0)));
        assert_eq!(eval(&tree).unwrap(), Some(1.0));
    }

    #[test]
    fn test_and_short_circuits_division_by_zero() {
        let tree = bin("&&", num(0.0), bin("/", num(1.0), num(0.0)));
        assert_eq!(eval(&tree).unwrap(), Some(0.0));
    }

    #[test]
    fn test_logical_results_are_normalized() {
        assert_eq!(eval(&bin("&&", num(2.0), num(-3.0))).unwrap(), Some(1.0));
        assert_eq!(eval(&bin("||", num(0.0), num(0.5))).unwrap(), Some(1.0));
        assert_eq!(eval(&bin("||", num(0.0), num(0.0))).unwrap(), Some(0.0));
        assert_eq!(eval(&Node::unary("!", num(0.25), loc()).unwrap()).unwrap(), Some(0.0));
    }

    #[test]
    fn test_non_short_circuit_operands_both_evaluated() {
        let tree = bin("*", num(0.0), bin("/", num(1.0), num(0.0)));
        assert_eq!(eval(&tree).unwrap_err().kind, ErrorKind::DivisionByZero);
    }

    #[test]
    fn test_division_and_modulus_errors_are_distinct() {
        let div = eval(&bin("/", num(5.0), num(0.0))).unwrap_err();
        let rem = eval(&bin("%", num(5.0), num(0.0))).unwrap_err();
        assert_eq!(div.kind, ErrorKind::DivisionByZero);
        assert_eq!(rem.kind, ErrorKind::ModulusByZero);
        assert_eq!(div.location, loc());
    }

    #[test]
    fn test_modulus_truncates_operands() {
        assert_eq!(eval(&bin("%", num(7.9), num(3.2))).unwrap(), Some(1.0));
        assert_eq!(eval(&bin("%", num(-7.0), num(3.0))).unwrap(), Some(-1.0));
        assert_eq!(eval(&bin("%", num(5.0), num(0.5))).unwrap_err().kind, ErrorKind::ModulusByZero);
    }

    #[test]
    fn test_remaining_binary_operators() {
        let cases = [
            ("**", 2.0, 10.0, 1024.0),
            ("-", 2.0, 10.0, -8.0),
            ("/", 7.0, 2.0, 3.5),
            ("<", 1.0, 2.0, 1.0),
            (">", 1.0, 2.0, 0.0),
            ("<=", 2.0, 2.0, 1.0),
            (">=", 1.0, 2.0, 0.0),
            ("!=", 1.0, 2.0, 1.0),
        ];
        for (symbol, left, right, expected) in cases {
            assert_eq!(eval(&bin(symbol, num(left), num(right))).unwrap(), Some(expected), "{symbol}");
        }
        assert_eq!(eval(&Node::unary("-", num(4.0), loc()).unwrap()).unwrap(), Some(-4.0));
    }

    #[test]
    fn test_statements_produce_no_value() {
        assert_eq!(eval(&Node::Empty).unwrap(), None);
        assert_eq!(eval(&Node::string("x")).unwrap(), None);
        assert_eq!(eval(&Node::Scope(vec![num(1.0)])).unwrap(), None);
        assert_eq!(eval(&Node::conditional(num(1.0), num(2.0), None)).unwrap(), None);
    }

    #[test]
    fn test_statement_in_value_position_is_internal_error() {
        let tree = bin("+", num(1.0), Node::Empty);
        let err = eval(&tree).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);

        let (mut interp, _) = capture();
        let print = Node::Print(vec![Node::Scope(vec![])]);
        let err = interp.evaluate(&print, &mut SymbolTable::new()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
    }

    #[test]
    fn test_assign_returns_value_and_initializes() {
        let mut symbols = SymbolTable::new();
        let id = symbols.declare("x", 1).unwrap();
        let mut interp = Interpreter::new();

        let read = Node::identifier(id, loc());
        assert_eq!(interp.evaluate(&read, &mut symbols).unwrap_err().kind, ErrorKind::UninitializedVariable);

        let assign = Node::assign(Identifier::new(id, loc()), bin("+", num(2.0), num(3.0)));
        assert_eq!(interp.evaluate(&assign, &mut symbols).unwrap(), Some(5.0));
        assert_eq!(interp.evaluate(&read, &mut symbols).unwrap(), Some(5.0));
    }

    #[test]
    fn test_failed_assignment_leaves_variable_untouched() {
        let mut symbols = SymbolTable::new();
        let id = symbols.declare("x", 1).unwrap();
        symbols.set(id, 9.0).unwrap();
        let assign = Node::assign(Identifier::new(id, loc()), bin("/", num(1.0), num(0.0)));
        assert!(Interpreter::new().evaluate(&assign, &mut symbols).is_err());
        assert_eq!(symbols.get(id, &loc()).unwrap(), 9.0);
    }

    #[test]
    fn test_print_mixes_text_and_numbers() {
        let (mut interp, buffer) = capture();
        let print = Node::Print(vec![
            Node::string("half = "),
            bin("/", num(1.0), num(2.0)),
            Node::string(", third = "),
            bin("/", num(1.0), num(3.0)),
        ]);
        interp.evaluate(&print, &mut SymbolTable::new()).unwrap();
        interp.evaluate(&Node::Print(vec![]), &mut SymbolTable::new()).unwrap();
        assert_eq!(text(&buffer), "half = 0.5, third = 0.333333\n\n");
    }

    #[test]
    fn test_failed_print_emits_nothing() {
        let (mut interp, buffer) = capture();
        let print = Node::Print(vec![Node::string("before "), bin("/", num(1.0), num(0.0))]);
        assert!(interp.evaluate(&print, &mut SymbolTable::new()).is_err());
        assert_eq!(text(&buffer), "");
    }

    #[test]
    fn test_conditional_runs_one_branch() {
        let mut symbols = SymbolTable::new();
        let id = symbols.declare("picked", 1).unwrap();
        let target = || Identifier::new(id, loc());
        let mut interp = Interpreter::new();

        let tree = Node::conditional(
            num(-0.5),
            Node::assign(target(), num(1.0)),
            Some(Node::assign(target(), num(2.0))),
        );
        interp.evaluate(&tree, &mut symbols).unwrap();
        assert_eq!(symbols.get(id, &loc()).unwrap(), 1.0);

        let tree = Node::conditional(
            num(0.0),
            Node::assign(target(), num(1.0)),
            Some(Node::assign(target(), num(2.0))),
        );
        interp.evaluate(&tree, &mut symbols).unwrap();
        assert_eq!(symbols.get(id, &loc()).unwrap(), 2.0);

        // false condition without else does nothing
        let tree = Node::conditional(num(0.0), bin("/", num(1.0), num(0.0)), None);
        interp.evaluate(&tree, &mut symbols).unwrap();
    }

    #[test]
    fn test_while_counts_up() {
        let mut symbols = SymbolTable::new();
        let i = symbols.declare("i", 1).unwrap();
        symbols.set(i, 0.0).unwrap();
        let read = || Node::identifier(i, loc());

        let tree = Node::while_loop(
            bin("<", read(), num(10.0)),
            Node::assign(Identifier::new(i, loc()), bin("+", read(), num(1.0))),
        );
        Interpreter::new().evaluate(&tree, &mut symbols).unwrap();
        assert_eq!(symbols.get(i, &loc()).unwrap(), 10.0);
    }

    #[test]
    fn test_while_with_false_condition_never_runs_body() {
        let tree = Node::while_loop(num(0.0), bin("/", num(1.0), num(0.0)));
        assert_eq!(eval(&tree).unwrap(), None);
    }

    #[test]
    fn test_scope_is_popped_when_child_fails() {
        let mut symbols = SymbolTable::new();
        let tree = Node::Scope(vec![
            Node::Scope(vec![bin("%", num(1.0), num(0.0))]),
        ]);
        let err = Interpreter::new().evaluate(&tree, &mut symbols).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ModulusByZero);
        assert_eq!(symbols.depth(), 1);
    }

    #[test]
    fn test_identifier_with_unknown_id_is_internal_error() {
        let err = eval(&Node::identifier(VarId(3), loc())).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
    }

    #[test]
    fn test_precision_setting_applies_to_print() {
        let (mut interp, buffer) = capture();
        interp.set_precision(3);
        interp.evaluate(&Node::Print(vec![num(3.14159)]), &mut SymbolTable::new()).unwrap();
        assert_eq!(text(&buffer), "3.14\n");
    }
}
