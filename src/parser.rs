// File: src/parser.rs
//
// Recursive descent parser for MacroCalc.
// Transforms a sequence of tokens into a `Node` tree.
//
// Besides building the tree, the parser owns name resolution: declarations
// are registered in the symbol table as they are parsed and every identifier
// is resolved to its `VarId` on the spot, mirroring the block structure with
// parse-time scope pushes and pops. The evaluator only ever sees ids.
//
// Precedence, lowest first: assignment (right assoc), ||, &&, == !=,
// < > <= >=, + -, * / %, ** (right assoc), unary - and !.

use crate::ast::{Identifier, Node};
use crate::errors::{CalcError, CalcResult, SourceLocation};
use crate::interpolation::{self, Segment};
use crate::lexer::{self, Token, TokenKind};
use crate::stack::ensure_sufficient_stack;
use crate::symbol_table::SymbolTable;

/// Parser maintains position in the token stream and the symbol table it
/// resolves names against
pub struct Parser<'t> {
    tokens: Vec<Token>,
    pos: usize,
    symbols: &'t mut SymbolTable,
}

impl<'t> Parser<'t> {
    /// Creates a new parser from a vector of tokens
    pub fn new(tokens: Vec<Token>, symbols: &'t mut SymbolTable) -> Self {
        Parser { tokens, pos: 0, symbols }
    }

    /// Peek at the current token without consuming it
    fn peek(&self) -> &TokenKind {
        self.tokens.get(self.pos).map(|t| &t.kind).unwrap_or(&TokenKind::Eof)
    }

    fn current_location(&self) -> SourceLocation {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(Token::location)
            .unwrap_or_else(SourceLocation::unknown)
    }

    /// Consume and return the current token, then advance to the next
    fn advance(&mut self) -> Token {
        let tok = self.tokens.get(self.pos).cloned().unwrap_or(Token {
            kind: TokenKind::Eof,
            line: self.current_location().line,
            column: 0,
        });
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn unexpected(&self, expected: &str) -> CalcError {
        CalcError::parse_error(
            format!("Expected {}, found {}", expected, self.peek()),
            self.current_location(),
        )
    }

    fn expect_punctuation(&mut self, c: char) -> CalcResult<Token> {
        if self.peek().is_punctuation(c) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("'{}'", c)))
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> CalcResult<Token> {
        if self.peek().is_keyword(kw) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("keyword '{}'", kw)))
        }
    }

    fn expect_identifier(&mut self) -> CalcResult<(String, SourceLocation)> {
        if let TokenKind::Identifier(name) = self.peek() {
            let name = name.clone();
            let token = self.advance();
            Ok((name, token.location()))
        } else {
            Err(self.unexpected("an identifier"))
        }
    }

    /// Parse a whole program into a root Scope node. Top-level declarations
    /// land in the table's current scope.
    pub fn parse_program(&mut self) -> CalcResult<Node> {
        Ok(Node::Scope(self.parse_statements()?))
    }

    /// Parse statements until end of input, dropping Empty nodes.
    pub fn parse_statements(&mut self) -> CalcResult<Vec<Node>> {
        let mut stmts = Vec::new();
        while !matches!(self.peek(), TokenKind::Eof) {
            let stmt = self.parse_stmt()?;
            if stmt != Node::Empty {
                stmts.push(stmt);
            }
        }
        tracing::debug!(statements = stmts.len(), "parsed program");
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> CalcResult<Node> {
        ensure_sufficient_stack(|| self.parse_stmt_kind())
    }

    fn parse_stmt_kind(&mut self) -> CalcResult<Node> {
        match self.peek() {
            TokenKind::Punctuation('{') => self.parse_scope(),
            TokenKind::Punctuation(';') => {
                self.advance();
                Ok(Node::Empty)
            }
            TokenKind::Keyword(k) if k == "var" => self.parse_declaration(),
            TokenKind::Keyword(k) if k == "print" => self.parse_print(),
            TokenKind::Keyword(k) if k == "if" => self.parse_if(),
            TokenKind::Keyword(k) if k == "while" => self.parse_while(),
            TokenKind::Keyword(k) if k == "else" => Err(self.unexpected("a statement")),
            TokenKind::Eof => Err(self.unexpected("a statement")),
            _ => {
                let expr = self.parse_expr()?;
                self.expect_punctuation(';')?;
                Ok(expr)
            }
        }
    }

    fn parse_scope(&mut self) -> CalcResult<Node> {
        self.expect_punctuation('{')?;
        self.symbols.push_scope();
        let body = self.parse_scope_body();
        // pop even when the body failed so a reused table stays balanced
        self.symbols.pop_scope()?;
        Ok(Node::Scope(body?))
    }

    fn parse_scope_body(&mut self) -> CalcResult<Vec<Node>> {
        let mut stmts = Vec::new();
        while !self.peek().is_punctuation('}') {
            if matches!(self.peek(), TokenKind::Eof) {
                return Err(self.unexpected("'}'"));
            }
            let stmt = self.parse_stmt()?;
            if stmt != Node::Empty {
                stmts.push(stmt);
            }
        }
        self.advance(); // }
        Ok(stmts)
    }

    fn parse_declaration(&mut self) -> CalcResult<Node> {
        self.expect_keyword("var")?;
        let (name, location) = self.expect_identifier()?;

        if self.peek().is_punctuation(';') {
            self.advance();
            self.symbols.declare(&name, location.line)?;
            return Ok(Node::Empty);
        }

        if !self.peek().is_operator("=") {
            return Err(self.unexpected("'=' or ';'"));
        }
        self.advance(); // =
        let value = self.parse_expr()?;
        self.expect_punctuation(';')?;

        // Declare only after the initializer is resolved: in `var x = x;` the
        // right-hand x refers to an enclosing x.
        let id = self.symbols.declare(&name, location.line)?;
        Ok(Node::assign(Identifier::new(id, location), value))
    }

    fn parse_print(&mut self) -> CalcResult<Node> {
        self.expect_keyword("print")?;
        self.expect_punctuation('(')?;

        let mut parts = Vec::new();
        if !self.peek().is_punctuation(')') {
            loop {
                if let TokenKind::String(raw) = self.peek() {
                    let raw = raw.clone();
                    let token = self.advance();
                    self.parse_interpolated(&raw, &token.location(), &mut parts)?;
                } else {
                    parts.push(self.parse_expr()?);
                }

                if self.peek().is_punctuation(',') {
                    self.advance();
                } else {
                    break;
                }
            }
        }

        self.expect_punctuation(')')?;
        self.expect_punctuation(';')?;
        Ok(Node::Print(parts))
    }

    /// Expand a string literal into String and expression children of a Print.
    fn parse_interpolated(
        &mut self,
        raw: &str,
        location: &SourceLocation,
        parts: &mut Vec<Node>,
    ) -> CalcResult<()> {
        for segment in interpolation::split(raw, location)? {
            match segment {
                Segment::Text(text) => parts.push(Node::String(text)),
                Segment::Expr { source, offset } => {
                    let (line, column) = placeholder_position(raw, offset, location);
                    let tokens = lexer::tokenize_at(&source, line, column)?;
                    let mut inner = Parser::new(tokens, &mut *self.symbols);
                    let expr = inner.parse_expr()?;
                    if !matches!(inner.peek(), TokenKind::Eof) {
                        return Err(inner.unexpected("'}' after placeholder expression"));
                    }
                    parts.push(expr);
                }
            }
        }
        Ok(())
    }

    fn parse_if(&mut self) -> CalcResult<Node> {
        self.expect_keyword("if")?;
        self.expect_punctuation('(')?;
        if self.peek().is_punctuation(')') {
            return Err(CalcError::parse_error(
                "Expected condition, found empty condition",
                self.current_location(),
            ));
        }
        let condition = self.parse_expr()?;
        self.expect_punctuation(')')?;

        let then_branch = self.parse_stmt()?;
        let else_branch = if self.peek().is_keyword("else") {
            self.advance();
            Some(self.parse_stmt()?)
        } else {
            None
        };

        Ok(Node::conditional(condition, then_branch, else_branch))
    }

    fn parse_while(&mut self) -> CalcResult<Node> {
        self.expect_keyword("while")?;
        self.expect_punctuation('(')?;
        if self.peek().is_punctuation(')') {
            return Err(CalcError::parse_error(
                "Expected condition, found empty condition",
                self.current_location(),
            ));
        }
        let condition = self.parse_expr()?;
        self.expect_punctuation(')')?;
        let body = self.parse_stmt()?;
        Ok(Node::while_loop(condition, body))
    }

    /// Parse an expression, starting at the lowest precedence (assignment)
    pub fn parse_expr(&mut self) -> CalcResult<Node> {
        ensure_sufficient_stack(|| self.parse_assignment())
    }

    fn parse_assignment(&mut self) -> CalcResult<Node> {
        let lhs = self.parse_or()?;
        if !self.peek().is_operator("=") {
            return Ok(lhs);
        }

        let target = match lhs {
            Node::Identifier(target) => target,
            _ => {
                return Err(CalcError::parse_error(
                    "Invalid assignment target; only variables can be assigned",
                    self.current_location(),
                ))
            }
        };
        self.advance(); // =
        let value = self.parse_assignment()?;
        Ok(Node::assign(target, value))
    }

    /// Left-associative chain of `ops` over `next`
    fn parse_left_assoc(
        &mut self,
        ops: &[&str],
        next: fn(&mut Self) -> CalcResult<Node>,
    ) -> CalcResult<Node> {
        let mut lhs = next(self)?;
        while let TokenKind::Operator(op) = self.peek() {
            if !ops.contains(&op.as_str()) {
                break;
            }
            let op = op.clone();
            let location = self.advance().location();
            let rhs = next(self)?;
            lhs = Node::binary(&op, lhs, rhs, location)?;
        }
        Ok(lhs)
    }

    /// At most one of `ops` over `next`; `a < b < c` is a parse error
    fn parse_non_assoc(
        &mut self,
        ops: &[&str],
        next: fn(&mut Self) -> CalcResult<Node>,
    ) -> CalcResult<Node> {
        let lhs = next(self)?;
        if let TokenKind::Operator(op) = self.peek() {
            if ops.contains(&op.as_str()) {
                let op = op.clone();
                let location = self.advance().location();
                let rhs = next(self)?;
                return Node::binary(&op, lhs, rhs, location);
            }
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> CalcResult<Node> {
        self.parse_left_assoc(&["||"], Self::parse_and)
    }

    fn parse_and(&mut self) -> CalcResult<Node> {
        self.parse_left_assoc(&["&&"], Self::parse_equality)
    }

    fn parse_equality(&mut self) -> CalcResult<Node> {
        self.parse_non_assoc(&["==", "!="], Self::parse_comparison)
    }

    fn parse_comparison(&mut self) -> CalcResult<Node> {
        self.parse_non_assoc(&["<", ">", "<=", ">="], Self::parse_additive)
    }

    fn parse_additive(&mut self) -> CalcResult<Node> {
        self.parse_left_assoc(&["+", "-"], Self::parse_multiplicative)
    }

    fn parse_multiplicative(&mut self) -> CalcResult<Node> {
        self.parse_left_assoc(&["*", "/", "%"], Self::parse_power)
    }

    fn parse_power(&mut self) -> CalcResult<Node> {
        let base = self.parse_term()?;
        if self.peek().is_operator("**") {
            let location = self.advance().location();
            let exponent = ensure_sufficient_stack(|| self.parse_power())?;
            return Node::binary("**", base, exponent, location);
        }
        Ok(base)
    }

    fn parse_term(&mut self) -> CalcResult<Node> {
        ensure_sufficient_stack(|| self.parse_primary())
    }

    fn parse_primary(&mut self) -> CalcResult<Node> {
        match self.peek().clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Node::number(n))
            }
            TokenKind::Identifier(name) => {
                let location = self.advance().location();
                let id = self.symbols.resolve(&name, &location)?;
                Ok(Node::identifier(id, location))
            }
            TokenKind::Punctuation('(') => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect_punctuation(')')?;
                Ok(expr)
            }
            TokenKind::Operator(op) if op == "-" || op == "!" => {
                let location = self.advance().location();
                let operand = self.parse_term()?;
                Node::unary(&op, operand, location)
            }
            _ => Err(self.unexpected("an expression")),
        }
    }
}

/// Line and column of byte `offset` within the raw body of a string literal
/// whose opening quote sits at `location`.
fn placeholder_position(raw: &str, offset: usize, location: &SourceLocation) -> (usize, usize) {
    let before = &raw[..offset];
    match before.rfind('\n') {
        Some(newline) => (
            location.line + before.matches('\n').count(),
            before[newline + 1..].chars().count() + 1,
        ),
        None => (location.line, location.column + 1 + before.chars().count()),
    }
}
