// File: src/ast.rs
//
// Abstract Syntax Tree (AST) definitions for MacroCalc.
//
// A program is a tree of `Node`s. Each variant carries exactly the payload and
// children its kind needs, so a node with the wrong number of children cannot
// be built. Identifiers are already resolved to symbol-table slots by the time
// a tree exists; the evaluator never looks names up.

use crate::errors::{CalcError, CalcResult, SourceLocation};
use serde::Serialize;
use std::fmt;

/// Stable handle to a variable's storage slot in the symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VarId(pub usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A resolved variable reference plus where it appeared, for diagnostics.
#[derive(Debug, PartialEq, Serialize)]
pub struct Identifier {
    pub id: VarId,
    pub location: SourceLocation,
}

impl Identifier {
    pub fn new(id: VarId, location: SourceLocation) -> Self {
        Self { id, location }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Not,
    Negate,
}

impl UnaryOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "!" => Some(UnaryOp::Not),
            "-" => Some(UnaryOp::Negate),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Negate => "-",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    And,
    Or,
    Pow,
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
}

impl BinaryOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            "**" => BinaryOp::Pow,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "<" => BinaryOp::Less,
            ">" => BinaryOp::Greater,
            "<=" => BinaryOp::LessEqual,
            ">=" => BinaryOp::GreaterEqual,
            "==" => BinaryOp::Equal,
            "!=" => BinaryOp::NotEqual,
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Pow => "**",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::LessEqual => "<=",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
        }
    }

    /// `&&` and `||` may skip their right operand.
    pub fn short_circuits(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

/// Operator application with one or two operands.
#[derive(Debug, PartialEq, Serialize)]
pub enum Operation {
    Unary { op: UnaryOp, operand: Box<Node> },
    Binary { op: BinaryOp, lhs: Box<Node>, rhs: Box<Node> },
}

impl Operation {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operation::Unary { op, .. } => op.symbol(),
            Operation::Binary { op, .. } => op.symbol(),
        }
    }
}

/// Discriminant of a `Node`, for diagnostics and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Empty,
    Scope,
    Print,
    Assign,
    Identifier,
    Conditional,
    Operation,
    Number,
    While,
    String,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A node in the program tree. Every node exclusively owns its children.
#[derive(Debug, PartialEq, Serialize)]
pub enum Node {
    /// Does nothing; produced by bare declarations and empty statements.
    Empty,
    /// Block with its own namespace; runs children in order.
    Scope(Vec<Node>),
    /// Emits String children verbatim and the other children as numbers, then a newline.
    Print(Vec<Node>),
    /// Evaluates `value`, stores it in `target`, and yields it.
    Assign { target: Identifier, value: Box<Node> },
    Identifier(Identifier),
    Conditional {
        condition: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Option<Box<Node>>,
    },
    Operation {
        operation: Operation,
        location: SourceLocation,
    },
    Number(f64),
    While { condition: Box<Node>, body: Box<Node> },
    /// Literal text; only meaningful as a Print child.
    String(String),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Empty => NodeKind::Empty,
            Node::Scope(_) => NodeKind::Scope,
            Node::Print(_) => NodeKind::Print,
            Node::Assign { .. } => NodeKind::Assign,
            Node::Identifier(_) => NodeKind::Identifier,
            Node::Conditional { .. } => NodeKind::Conditional,
            Node::Operation { .. } => NodeKind::Operation,
            Node::Number(_) => NodeKind::Number,
            Node::While { .. } => NodeKind::While,
            Node::String(_) => NodeKind::String,
        }
    }

    /// Whether evaluating this node yields a number.
    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            Node::Assign { .. } | Node::Identifier(_) | Node::Operation { .. } | Node::Number(_)
        )
    }

    pub fn number(value: f64) -> Node {
        Node::Number(value)
    }

    pub fn string(text: impl Into<String>) -> Node {
        Node::String(text.into())
    }

    pub fn identifier(id: VarId, location: SourceLocation) -> Node {
        Node::Identifier(Identifier::new(id, location))
    }

    pub fn assign(target: Identifier, value: Node) -> Node {
        Node::Assign { target, value: Box::new(value) }
    }

    pub fn conditional(condition: Node, then_branch: Node, else_branch: Option<Node>) -> Node {
        Node::Conditional {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        }
    }

    pub fn while_loop(condition: Node, body: Node) -> Node {
        Node::While { condition: Box::new(condition), body: Box::new(body) }
    }

    /// Builds a unary operation, rejecting symbols that are not unary operators.
    pub fn unary(symbol: &str, operand: Node, location: SourceLocation) -> CalcResult<Node> {
        let op = UnaryOp::from_symbol(symbol)
            .ok_or_else(|| CalcError::internal(format!("Unknown unary operator '{}'", symbol)))?;
        Ok(Node::Operation {
            operation: Operation::Unary { op, operand: Box::new(operand) },
            location,
        })
    }

    /// Builds a binary operation, rejecting symbols that are not binary operators.
    pub fn binary(symbol: &str, lhs: Node, rhs: Node, location: SourceLocation) -> CalcResult<Node> {
        let op = BinaryOp::from_symbol(symbol)
            .ok_or_else(|| CalcError::internal(format!("Unknown binary operator '{}'", symbol)))?;
        Ok(Node::Operation {
            operation: Operation::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) },
            location,
        })
    }

    /// Number of direct children, matching the per-kind child contracts.
    pub fn child_count(&self) -> usize {
        match self {
            Node::Empty | Node::Identifier(_) | Node::Number(_) | Node::String(_) => 0,
            Node::Scope(children) | Node::Print(children) => children.len(),
            Node::Assign { .. } | Node::While { .. } => 2,
            Node::Conditional { else_branch, .. } => 2 + usize::from(else_branch.is_some()),
            Node::Operation { operation: Operation::Unary { .. }, .. } => 1,
            Node::Operation { operation: Operation::Binary { .. }, .. } => 2,
        }
    }
}
