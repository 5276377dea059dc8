// File: src/errors.rs
//
// Error handling and reporting for MacroCalc.
// Every failure in the lexer, parser, symbol table and evaluator surfaces as a
// `CalcError` carrying its kind and the source location it is attributed to.
// The binary renders these as colored diagnostics; tests and golden snapshots
// use the plain single-line `summary()`.

use colored::Colorize;
use serde::Serialize;
use std::fmt;

/// Source location information for tracking where code appears in a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Location for errors that cannot be tied to a position in the script
    pub fn unknown() -> Self {
        Self { line: 0, column: 0 }
    }

    pub fn is_known(&self) -> bool {
        self.line > 0
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.column > 0 {
            write!(f, "{}:{}", self.line, self.column)
        } else {
            write!(f, "{}", self.line)
        }
    }
}

/// Types of errors that can occur while compiling or running a script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    LexError,
    ParseError,
    UndefinedVariable,
    Redeclaration,
    UninitializedVariable,
    DivisionByZero,
    ModulusByZero,
    ScopeUnderflow,
    /// Malformed tree or broken internal invariant; a bug upstream of the evaluator.
    Internal,
    Io,
    Config,
}

impl ErrorKind {
    /// User-attributable errors point at a line in the script. Everything else
    /// is a host or interpreter problem.
    pub fn is_user_error(self) -> bool {
        !matches!(self, ErrorKind::Internal | ErrorKind::Io | ErrorKind::Config)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::LexError => write!(f, "Lex Error"),
            ErrorKind::ParseError => write!(f, "Parse Error"),
            ErrorKind::UndefinedVariable => write!(f, "Undefined Variable"),
            ErrorKind::Redeclaration => write!(f, "Redeclared Variable"),
            ErrorKind::UninitializedVariable => write!(f, "Uninitialized Variable"),
            ErrorKind::DivisionByZero => write!(f, "Division By Zero"),
            ErrorKind::ModulusByZero => write!(f, "Modulus By Zero"),
            ErrorKind::ScopeUnderflow => write!(f, "Scope Underflow"),
            ErrorKind::Internal => write!(f, "Internal Error"),
            ErrorKind::Io => write!(f, "IO Error"),
            ErrorKind::Config => write!(f, "Config Error"),
        }
    }
}

/// A structured error with location information
#[derive(Debug, Clone)]
pub struct CalcError {
    pub kind: ErrorKind,
    pub message: String,
    pub location: SourceLocation,
    pub source_line: Option<String>,
    pub suggestion: Option<String>,
    pub help: Option<String>,
    pub note: Option<String>,
}

pub type CalcResult<T> = Result<T, CalcError>;

impl CalcError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind,
            message: message.into(),
            location,
            source_line: None,
            suggestion: None,
            help: None,
            note: None,
        }
    }

    pub fn with_source(mut self, source_line: String) -> Self {
        self.source_line = Some(source_line);
        self
    }

    pub fn with_suggestion(mut self, suggestion: String) -> Self {
        self.suggestion = Some(suggestion);
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.note = Some(note);
        self
    }

    /// Attaches the offending line of `source` when the error has a location
    /// and no source line yet.
    pub fn with_source_from(self, source: &str) -> Self {
        if self.source_line.is_some() || !self.location.is_known() {
            return self;
        }
        match source.lines().nth(self.location.line - 1) {
            Some(line) => self.with_source(line.to_string()),
            None => self,
        }
    }

    pub fn lex_error(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(ErrorKind::LexError, message, location)
    }

    pub fn parse_error(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(ErrorKind::ParseError, message, location)
    }

    pub fn undefined_variable(name: &str, location: SourceLocation) -> Self {
        Self::new(
            ErrorKind::UndefinedVariable,
            format!("Variable '{}' is not defined", name),
            location,
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message, SourceLocation::unknown())
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message, SourceLocation::unknown())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message, SourceLocation::unknown())
    }

    /// Single uncolored line, used by the golden runner and the REPL.
    pub fn summary(&self) -> String {
        if self.location.is_known() {
            format!("{}: {} (line {})", self.kind, self.message, self.location.line)
        } else {
            format!("{}: {}", self.kind, self.message)
        }
    }
}

impl fmt::Display for CalcError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind_str = format!("{}", self.kind);
        writeln!(f, "{}: {}", kind_str.red().bold(), self.message.bold())?;

        if self.location.is_known() {
            let location_str = format!("  --> {}", self.location);
            writeln!(f, "{}", location_str.bright_blue())?;
        }

        if let Some(ref source) = self.source_line {
            let line_num = self.location.line;
            let col_num = self.location.column;

            writeln!(f, "   {}", "|".bright_blue())?;
            writeln!(
                f,
                "{} {} {}",
                format!("{:3}", line_num).bright_blue(),
                "|".bright_blue(),
                source
            )?;
            if col_num > 0 {
                writeln!(
                    f,
                    "   {} {}{}",
                    "|".bright_blue(),
                    " ".repeat(col_num.saturating_sub(1)),
                    "^".red().bold()
                )?;
            }
            writeln!(f, "   {}", "|".bright_blue())?;
        }

        if let Some(ref help) = self.help {
            writeln!(
                f,
                "   {} {}",
                "=".bright_yellow(),
                format!("help: {}", help).bright_yellow()
            )?;
        }

        if let Some(ref suggestion) = self.suggestion {
            writeln!(
                f,
                "   {} {}",
                "=".bright_green(),
                format!("Did you mean '{}'?", suggestion).bright_green()
            )?;
        }

        if let Some(ref note) = self.note {
            writeln!(f, "   {} {}", "=".bright_cyan(), format!("note: {}", note).bright_cyan())?;
        }

        Ok(())
    }
}

impl std::error::Error for CalcError {}

/// Computes the Levenshtein distance between two strings
/// Used for "Did you mean?" suggestions
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();

    if s1_chars.is_empty() {
        return s2_chars.len();
    }
    if s2_chars.is_empty() {
        return s1_chars.len();
    }

    // Two rolling rows are enough; only the previous row is ever read.
    let mut previous: Vec<usize> = (0..=s2_chars.len()).collect();
    let mut current = vec![0; s2_chars.len() + 1];

    for (i, a) in s1_chars.iter().enumerate() {
        current[0] = i + 1;
        for (j, b) in s2_chars.iter().enumerate() {
            let cost = usize::from(a != b);
            current[j + 1] = (previous[j + 1] + 1).min(current[j] + 1).min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[s2_chars.len()]
}

/// Find the closest match from a list of candidates using Levenshtein distance
/// Returns None if no good match is found (distance > 2)
pub fn find_closest_match<'a, I>(target: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best_match = None;
    let mut best_distance = usize::MAX;

    for candidate in candidates {
        if candidate == target {
            continue;
        }
        let distance = levenshtein_distance(target, candidate);
        if distance <= 2 && distance < best_distance {
            best_distance = distance;
            best_match = Some(candidate);
        }
    }

    best_match
}
