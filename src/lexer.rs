// File: src/lexer.rs
//
// Lexical analyzer (tokenizer) for MacroCalc.
// Converts source code text into a stream of tokens for parsing.
//
// Supports:
// - Keywords: var, print, if, else, while
// - Identifiers and numbers (all numbers are floating point)
// - String literals (body kept raw; escapes are handled by the interpolation pass)
// - Operators: = == != < > <= >= + - * / % ** ! && ||
// - Punctuation: ( ) { } ; ,
// - Comments starting with #

use crate::errors::{CalcError, CalcResult, SourceLocation};
use std::fmt;

pub const KEYWORDS: [&str; 5] = ["var", "print", "if", "else", "while"];

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Number(f64),
    String(String),
    Operator(String),
    Punctuation(char),
    Keyword(String),
    Eof,
}

impl TokenKind {
    pub fn is_operator(&self, op: &str) -> bool {
        matches!(self, TokenKind::Operator(o) if o == op)
    }

    pub fn is_punctuation(&self, c: char) -> bool {
        matches!(self, TokenKind::Punctuation(p) if *p == c)
    }

    pub fn is_keyword(&self, kw: &str) -> bool {
        matches!(self, TokenKind::Keyword(k) if k == kw)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenKind::Identifier(name) => write!(f, "identifier '{}'", name),
            TokenKind::Number(n) => write!(f, "number {}", n),
            TokenKind::String(_) => write!(f, "string literal"),
            TokenKind::Operator(op) => write!(f, "'{}'", op),
            TokenKind::Punctuation(c) => write!(f, "'{}'", c),
            TokenKind::Keyword(k) => write!(f, "keyword '{}'", k),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }
}

/// Tokenizes MacroCalc source code into a vector of tokens.
///
/// The returned vector always ends with a single `Eof` token. Columns are the
/// 1-based position of the first character of each token.
pub fn tokenize(source: &str) -> CalcResult<Vec<Token>> {
    tokenize_at(source, 1, 1)
}

/// Tokenizes `source` as if it started at `first_line`:`first_col`. Used for
/// placeholder expressions inside print strings so their errors point into the
/// string. Lines after the first start at column 1.
pub fn tokenize_at(source: &str, first_line: usize, first_col: usize) -> CalcResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = first_line;
    let mut col = first_col;

    while let Some(&c) = chars.peek() {
        let start_col = col;
        match c {
            ' ' | '\t' | '\r' => {
                chars.next();
                col += 1;
            }
            '\n' => {
                chars.next();
                line += 1;
                col = 1;
            }
            '#' => {
                while let Some(&ch) = chars.peek() {
                    if ch == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '"' => {
                chars.next(); // skip quote
                col += 1;
                let start_line = line;
                let mut s = String::new();
                let mut terminated = false;
                while let Some(ch) = chars.next() {
                    col += 1;
                    match ch {
                        '"' => {
                            terminated = true;
                            break;
                        }
                        '\\' => {
                            // keep the escape raw, but never let \" end the literal
                            s.push(ch);
                            if let Some(esc) = chars.next() {
                                col += 1;
                                if esc == '\n' {
                                    line += 1;
                                    col = 1;
                                }
                                s.push(esc);
                            }
                        }
                        '\n' => {
                            s.push(ch);
                            line += 1;
                            col = 1;
                        }
                        _ => s.push(ch),
                    }
                }
                if !terminated {
                    return Err(CalcError::lex_error(
                        "Unterminated string literal",
                        SourceLocation::new(start_line, start_col),
                    ));
                }
                tokens.push(Token {
                    kind: TokenKind::String(s),
                    line: start_line,
                    column: start_col,
                });
            }
            '0'..='9' => {
                let mut num = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_digit() || ch == '.' {
                        num.push(ch);
                        chars.next();
                        col += 1;
                    } else {
                        break;
                    }
                }
                let parsed = num.parse::<f64>().map_err(|_| {
                    CalcError::lex_error(
                        format!("Malformed number literal '{}'", num),
                        SourceLocation::new(line, start_col),
                    )
                })?;
                tokens.push(Token {
                    kind: TokenKind::Number(parsed),
                    line,
                    column: start_col,
                });
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        ident.push(ch);
                        chars.next();
                        col += 1;
                    } else {
                        break;
                    }
                }

                let kind = if KEYWORDS.contains(&ident.as_str()) {
                    TokenKind::Keyword(ident)
                } else {
                    TokenKind::Identifier(ident)
                };

                tokens.push(Token {
                    kind,
                    line,
                    column: start_col,
                });
            }
            '=' | '!' | '<' | '>' | '+' | '-' | '/' | '%' => {
                chars.next();
                col += 1;
                // Check for == != <= >=
                let op = if c != '+' && c != '-' && c != '/' && c != '%' && chars.peek() == Some(&'=') {
                    chars.next();
                    col += 1;
                    format!("{}=", c)
                } else {
                    c.to_string()
                };
                tokens.push(Token {
                    kind: TokenKind::Operator(op),
                    line,
                    column: start_col,
                });
            }
            '*' => {
                chars.next();
                col += 1;
                let op = if chars.peek() == Some(&'*') {
                    chars.next();
                    col += 1;
                    "**"
                } else {
                    "*"
                };
                tokens.push(Token {
                    kind: TokenKind::Operator(op.into()),
                    line,
                    column: start_col,
                });
            }
            '&' | '|' => {
                chars.next();
                col += 1;
                if chars.peek() != Some(&c) {
                    return Err(CalcError::lex_error(
                        format!("Unexpected character '{}'", c),
                        SourceLocation::new(line, start_col),
                    )
                    .with_help(format!("logical operators are written '{}{}'", c, c)));
                }
                chars.next();
                col += 1;
                tokens.push(Token {
                    kind: TokenKind::Operator(format!("{}{}", c, c)),
                    line,
                    column: start_col,
                });
            }
            '(' | ')' | '{' | '}' | ';' | ',' => {
                tokens.push(Token {
                    kind: TokenKind::Punctuation(c),
                    line,
                    column: start_col,
                });
                chars.next();
                col += 1;
            }
            _ => {
                return Err(CalcError::lex_error(
                    format!("Unexpected character '{}'", c),
                    SourceLocation::new(line, start_col),
                ));
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        line,
        column: col,
    });

    tracing::trace!(count = tokens.len(), "tokenized source");

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_declaration_tokens() {
        assert_eq!(
            kinds("var x = 1.5;"),
            vec![
                TokenKind::Keyword("var".into()),
                TokenKind::Identifier("x".into()),
                TokenKind::Operator("=".into()),
                TokenKind::Number(1.5),
                TokenKind::Punctuation(';'),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_compound_operators() {
        assert_eq!(
            kinds("a ** b <= c != d && !e || f >= g == h"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Operator("**".into()),
                TokenKind::Identifier("b".into()),
                TokenKind::Operator("<=".into()),
                TokenKind::Identifier("c".into()),
                TokenKind::Operator("!=".into()),
                TokenKind::Identifier("d".into()),
                TokenKind::Operator("&&".into()),
                TokenKind::Operator("!".into()),
                TokenKind::Identifier("e".into()),
                TokenKind::Operator("||".into()),
                TokenKind::Identifier("f".into()),
                TokenKind::Operator(">=".into()),
                TokenKind::Identifier("g".into()),
                TokenKind::Operator("==".into()),
                TokenKind::Identifier("h".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lines_and_columns() {
        let tokens = tokenize("var a;\n  # comment\n  print(a);").unwrap();
        let print = tokens.iter().find(|t| t.kind.is_keyword("print")).unwrap();
        assert_eq!((print.line, print.column), (3, 3));
        let eof = tokens.last().unwrap();
        assert_eq!(eof.kind, TokenKind::Eof);
    }

    #[test]
    fn test_string_keeps_escapes_raw() {
        let tokens = tokenize(r#"print("a \"b\" {x}\n");"#).unwrap();
        assert_eq!(tokens[2].kind, TokenKind::String(r#"a \"b\" {x}\n"#.into()));
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("print(\"oops);").unwrap_err();
        assert_eq!(err.kind, ErrorKind::LexError);
        assert_eq!(err.location, SourceLocation::new(1, 7));
    }

    #[test]
    fn test_rejects_unknown_characters() {
        let err = tokenize("var a = 1 @ 2;").unwrap_err();
        assert_eq!(err.kind, ErrorKind::LexError);
        assert_eq!(err.location.column, 11);

        let err = tokenize("a & b").unwrap_err();
        assert_eq!(err.kind, ErrorKind::LexError);
        assert!(err.help.is_some());
    }

    #[test]
    fn test_malformed_number() {
        let err = tokenize("1.2.3;").unwrap_err();
        assert_eq!(err.kind, ErrorKind::LexError);
        assert!(err.message.contains("1.2.3"));
    }

    #[test]
    fn test_tokenize_at_offsets_lines() {
        let tokens = tokenize_at("x + 1", 7, 12).unwrap();
        assert!(tokens.iter().all(|t| t.line == 7));
        assert_eq!(tokens[0].column, 12);
        assert_eq!(tokens[2].column, 16);
    }
}
