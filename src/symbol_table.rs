// File: src/symbol_table.rs
//
// Scoped symbol table for MacroCalc variables.
// A stack of name maps (innermost last) sits on top of a flat, append-only
// list of variable records. A variable's identity is its index in that list,
// handed out once at declaration time and used for every read and write.

use crate::ast::VarId;
use crate::errors::{find_closest_match, CalcError, CalcResult, ErrorKind, SourceLocation};
use ahash::AHashMap;
use std::ops::{Deref, DerefMut};

type Scope = AHashMap<String, VarId>;

/// Storage record for one declared variable
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub value: f64,
    pub declared_line: usize,
    pub initialized: bool,
}

impl Variable {
    fn new(name: String, declared_line: usize) -> Self {
        Variable { name, value: 0.0, declared_line, initialized: false }
    }
}

/// Variable storage using lexical scoping
///
/// Name lookups search from the innermost scope (end of the Vec) outward, so
/// inner declarations shadow outer ones. Records are never removed: a popped
/// scope only forgets its names, not the storage its ids point at.
///
/// # Examples
///
/// ```
/// use macrocalc::errors::SourceLocation;
/// use macrocalc::symbol_table::SymbolTable;
///
/// let mut table = SymbolTable::new();
/// let outer = table.declare("x", 1).unwrap();
/// table.set(outer, 10.0).unwrap();
///
/// table.push_scope();
/// let inner = table.declare("x", 2).unwrap();
/// assert_eq!(table.resolve("x", &SourceLocation::new(3, 1)).unwrap(), inner);
///
/// table.pop_scope().unwrap();
/// assert_eq!(table.resolve("x", &SourceLocation::new(4, 1)).unwrap(), outer);
/// ```
#[derive(Debug, Clone)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    variables: Vec<Variable>,
}

impl SymbolTable {
    /// Create a new table with a single outermost scope
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![Scope::default()],
            variables: Vec::new(),
        }
    }

    /// Number of active scopes, including the outermost one
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Number of variable records ever declared
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Push a new empty scope onto the stack (entering a block)
    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
        tracing::trace!(depth = self.scopes.len(), "pushed scope");
    }

    /// Pop the innermost scope. The outermost scope lives for the whole run.
    pub fn pop_scope(&mut self) -> CalcResult<()> {
        match self.scopes.len() {
            0 => Err(CalcError::new(
                ErrorKind::ScopeUnderflow,
                "Tried to pop a scope from an empty scope stack",
                SourceLocation::unknown(),
            )),
            1 => Err(CalcError::new(
                ErrorKind::ScopeUnderflow,
                "Tried to pop the outermost scope",
                SourceLocation::unknown(),
            )),
            _ => {
                self.scopes.pop();
                tracing::trace!(depth = self.scopes.len(), "popped scope");
                Ok(())
            }
        }
    }

    /// Push a scope that is popped again when the returned guard is dropped,
    /// whichever way the caller leaves.
    pub fn enter_scope(&mut self) -> ScopeGuard<'_> {
        self.push_scope();
        ScopeGuard { table: self }
    }

    /// Declare `name` in the innermost scope and return its new id.
    ///
    /// Shadowing a name from an enclosing scope is fine; declaring the same
    /// name twice in one scope is an error.
    pub fn declare(&mut self, name: &str, declared_line: usize) -> CalcResult<VarId> {
        let id = VarId(self.variables.len());
        let scope = self.scopes.last_mut().ok_or_else(|| {
            CalcError::internal("Symbol table has no scope to declare into")
        })?;

        if let Some(existing) = scope.get(name) {
            let previous_line = self.variables[existing.index()].declared_line;
            return Err(CalcError::new(
                ErrorKind::Redeclaration,
                format!("Variable '{}' is already declared in this scope", name),
                SourceLocation::new(declared_line, 0),
            )
            .with_note(format!("'{}' was first declared on line {}", name, previous_line)));
        }

        scope.insert(name.to_string(), id);
        self.variables.push(Variable::new(name.to_string(), declared_line));
        tracing::trace!(name, id = id.index(), line = declared_line, "declared variable");
        Ok(id)
    }

    /// Resolve `name` to an id, searching from the innermost scope outward.
    pub fn resolve(&self, name: &str, location: &SourceLocation) -> CalcResult<VarId> {
        for scope in self.scopes.iter().rev() {
            if let Some(&id) = scope.get(name) {
                return Ok(id);
            }
        }

        let visible = self.scopes.iter().flat_map(|scope| scope.keys().map(String::as_str));
        let mut err = CalcError::undefined_variable(name, location.clone())
            .with_help(format!("declare it first with 'var {};'", name));
        if let Some(suggestion) = find_closest_match(name, visible) {
            err = err.with_suggestion(suggestion.to_string());
        }
        Err(err)
    }

    pub fn has_var(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains_key(name))
    }

    /// Read a variable's value. Reading a declared but never assigned variable fails.
    pub fn get(&self, id: VarId, location: &SourceLocation) -> CalcResult<f64> {
        let variable = self.variable(id)?;
        if !variable.initialized {
            return Err(CalcError::new(
                ErrorKind::UninitializedVariable,
                format!("Variable '{}' was used before it was given a value", variable.name),
                location.clone(),
            )
            .with_note(format!("'{}' is declared on line {}", variable.name, variable.declared_line)));
        }
        Ok(variable.value)
    }

    /// Store a value and mark the variable initialized.
    pub fn set(&mut self, id: VarId, value: f64) -> CalcResult<()> {
        let variable = self
            .variables
            .get_mut(id.index())
            .ok_or_else(|| CalcError::internal(format!("No variable with id {}", id)))?;
        variable.value = value;
        variable.initialized = true;
        Ok(())
    }

    pub fn variable(&self, id: VarId) -> CalcResult<&Variable> {
        self.variables
            .get(id.index())
            .ok_or_else(|| CalcError::internal(format!("No variable with id {}", id)))
    }

    /// Variables reachable by name from the innermost scope, in declaration order.
    pub fn visible_variables(&self) -> Vec<(VarId, &Variable)> {
        let mut seen: AHashMap<&str, VarId> = AHashMap::new();
        for scope in self.scopes.iter().rev() {
            for (name, &id) in scope.iter() {
                seen.entry(name.as_str()).or_insert(id);
            }
        }
        let mut visible: Vec<(VarId, &Variable)> =
            seen.into_iter().map(|(_, id)| (id, &self.variables[id.index()])).collect();
        visible.sort_by_key(|(id, _)| *id);
        visible
    }

    /// Forget all values and drop every scope but the outermost one.
    ///
    /// Ids and the outermost scope's names stay valid, so an already resolved
    /// tree can be run again from a clean state.
    pub fn reset(&mut self) {
        self.scopes.truncate(1);
        for variable in &mut self.variables {
            variable.value = 0.0;
            variable.initialized = false;
        }
    }

    /// Snapshot of the current name bindings, for `rollback`.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint { scopes: self.scopes.clone() }
    }

    /// Restore the name bindings captured by `checkpoint`. Names declared
    /// since then become unbound; their records stay, unreachable.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        tracing::trace!(depth = checkpoint.scopes.len(), "rolled back declarations");
        self.scopes = checkpoint.scopes;
    }
}

/// Name bindings saved by `SymbolTable::checkpoint`
#[derive(Debug, Clone)]
pub struct Checkpoint {
    scopes: Vec<Scope>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// A pushed scope frame. Dropping the guard pops the frame.
pub struct ScopeGuard<'a> {
    table: &'a mut SymbolTable,
}

impl Deref for ScopeGuard<'_> {
    type Target = SymbolTable;

    fn deref(&self) -> &SymbolTable {
        self.table
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut SymbolTable {
        self.table
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        // The frame pushed by enter_scope sits above the outermost scope.
        if self.table.scopes.len() > 1 {
            self.table.scopes.pop();
            tracing::trace!(depth = self.table.scopes.len(), "popped scope");
        }
    }
}
