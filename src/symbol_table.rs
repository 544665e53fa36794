use crate::ast::Type;
use crate::error::{ResolutionError, ResolveResult, SourceLocation};
use std::collections::HashMap;

pub type ScopeId = usize;
pub type SymbolId = usize;

/// Name that declares nothing when bound.
pub const BLANK: &str = "_";

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    Variable,
    Constant,
    Function,
    Parameter,
    Package { path: String },
    Builtin,
}

impl SymbolKind {
    pub fn is_assignable(&self) -> bool {
        matches!(self, SymbolKind::Variable | SymbolKind::Parameter)
    }
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Known static type. Function symbols always carry one; it gives call arity.
    pub symbol_type: Option<Type>,
}

/// Go export rule: a name is visible to importers when it starts with an upper-case letter.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().map_or(false, char::is_uppercase)
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScopeKind {
    Universe,
    Package { name: String },
    File { path: String },
    Function { name: String },
    Block,
    If,
    For,
    Switch,
    Case,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub symbols: HashMap<String, SymbolId>,
}

impl Scope {
    pub fn new(kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        Self {
            kind,
            parent,
            symbols: HashMap::new(),
        }
    }

    pub fn get_symbol(&self, name: &str) -> Option<SymbolId> {
        self.symbols.get(name).copied()
    }
}

/// Arena of scopes and symbols built while checking one package.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    symbols: Vec<Symbol>,
    current_scope: ScopeId,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(ScopeKind::Universe, None)],
            symbols: Vec::new(),
            current_scope: 0,
        }
    }

    pub fn enter_scope(&mut self, kind: ScopeKind) -> ScopeId {
        let scope_id = self.scopes.len();
        self.scopes.push(Scope::new(kind, Some(self.current_scope)));

        self.current_scope = scope_id;
        scope_id
    }

    /// Returns to the parent scope. The universe scope has none and stays current.
    pub fn exit_scope(&mut self) -> ScopeId {
        if let Some(parent) = self.scopes[self.current_scope].parent {
            self.current_scope = parent;
        }
        self.current_scope
    }

    pub fn current_scope(&self) -> ScopeId {
        self.current_scope
    }

    /// Makes an existing scope current, e.g. to resume a file scope.
    pub fn set_current_scope(&mut self, id: ScopeId) {
        if id < self.scopes.len() {
            self.current_scope = id;
        }
    }

    pub fn get_scope(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id)
    }

    pub fn get_symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id)
    }

    pub fn declare(
        &mut self,
        name: &str,
        kind: SymbolKind,
        symbol_type: Option<Type>,
        location: Option<SourceLocation>,
    ) -> ResolveResult<SymbolId> {
        self.declare_in(self.current_scope, name, kind, symbol_type, location)
    }

    /// Declares into `scope_id`. The blank name gets a symbol but is never bound.
    pub fn declare_in(
        &mut self,
        scope_id: ScopeId,
        name: &str,
        kind: SymbolKind,
        symbol_type: Option<Type>,
        location: Option<SourceLocation>,
    ) -> ResolveResult<SymbolId> {
        let symbol_id = self.symbols.len();

        if name != BLANK {
            let scope = &mut self.scopes[scope_id];
            if scope.symbols.contains_key(name) {
                return Err(ResolutionError::Redeclared {
                    name: name.to_string(),
                    location: location.unwrap_or_default(),
                });
            }
            scope.symbols.insert(name.to_string(), symbol_id);
        }

        self.symbols.push(Symbol {
            name: name.to_string(),
            kind,
            symbol_type,
        });
        Ok(symbol_id)
    }

    /// Look up a symbol by name, searching from the current scope out to the universe.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        let mut scope_id = Some(self.current_scope);

        while let Some(id) = scope_id {
            let scope = &self.scopes[id];
            if let Some(symbol_id) = scope.get_symbol(name) {
                return Some(symbol_id);
            }
            scope_id = scope.parent;
        }

        None
    }

    pub fn lookup_current_scope(&self, name: &str) -> Option<SymbolId> {
        self.scopes[self.current_scope].get_symbol(name)
    }

    pub fn symbols_in_scope(&self, scope_id: ScopeId) -> Vec<&Symbol> {
        match self.get_scope(scope_id) {
            Some(scope) => scope
                .symbols
                .values()
                .filter_map(|id| self.symbols.get(*id))
                .collect(),
            None => Vec::new(),
        }
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_table_creation() {
        let symbol_table = SymbolTable::new();
        assert_eq!(symbol_table.current_scope(), 0);
        assert_eq!(symbol_table.scopes.len(), 1);
        assert!(matches!(symbol_table.scopes[0].kind, ScopeKind::Universe));
    }

    #[test]
    fn test_scope_management() {
        let mut symbol_table = SymbolTable::new();

        let package = symbol_table.enter_scope(ScopeKind::Package {
            name: "main".to_string(),
        });
        let func_scope = symbol_table.enter_scope(ScopeKind::Function {
            name: "main".to_string(),
        });
        assert_eq!(func_scope, 2);
        assert_eq!(
            symbol_table.get_scope(func_scope).and_then(|s| s.parent),
            Some(package)
        );

        let if_scope = symbol_table.enter_scope(ScopeKind::If);
        assert_eq!(symbol_table.current_scope(), if_scope);

        assert_eq!(symbol_table.exit_scope(), func_scope);
        assert_eq!(symbol_table.exit_scope(), package);
        assert_eq!(symbol_table.exit_scope(), 0);
        assert_eq!(symbol_table.exit_scope(), 0);
    }

    #[test]
    fn test_scope_shadowing() {
        let mut symbol_table = SymbolTable::new();
        symbol_table.enter_scope(ScopeKind::Package {
            name: "p".to_string(),
        });

        let outer = symbol_table
            .declare("x", SymbolKind::Variable, Some(Type::Int), None)
            .unwrap();

        symbol_table.enter_scope(ScopeKind::Block);
        let inner = symbol_table
            .declare("x", SymbolKind::Variable, Some(Type::String), None)
            .unwrap();

        assert_eq!(symbol_table.lookup("x"), Some(inner));
        assert_eq!(
            symbol_table.get_symbol(inner).unwrap().symbol_type,
            Some(Type::String)
        );

        symbol_table.exit_scope();
        assert_eq!(symbol_table.lookup("x"), Some(outer));
        assert_eq!(symbol_table.lookup_current_scope("y"), None);
    }

    #[test]
    fn test_redeclaration_error() {
        let mut symbol_table = SymbolTable::new();
        symbol_table
            .declare("x", SymbolKind::Variable, None, None)
            .unwrap();

        let result = symbol_table.declare(
            "x",
            SymbolKind::Constant,
            None,
            Some(SourceLocation::new(2, 5)),
        );
        assert_eq!(
            result,
            Err(ResolutionError::Redeclared {
                name: "x".to_string(),
                location: SourceLocation::new(2, 5),
            })
        );
    }

    #[test]
    fn test_blank_name_is_never_bound() {
        let mut symbol_table = SymbolTable::new();
        symbol_table
            .declare(BLANK, SymbolKind::Variable, None, None)
            .unwrap();
        symbol_table
            .declare(BLANK, SymbolKind::Variable, None, None)
            .unwrap();
        assert_eq!(symbol_table.lookup(BLANK), None);
    }

    #[test]
    fn test_declare_into_enclosing_scope() {
        let mut symbol_table = SymbolTable::new();
        let package = symbol_table.enter_scope(ScopeKind::Package {
            name: "p".to_string(),
        });
        symbol_table.enter_scope(ScopeKind::File {
            path: "a.go".to_string(),
        });

        symbol_table
            .declare_in(package, "Counter", SymbolKind::Variable, Some(Type::Int), None)
            .unwrap();

        let names: Vec<_> = symbol_table
            .symbols_in_scope(package)
            .iter()
            .map(|s| s.name.clone())
            .collect();
        assert_eq!(names, vec!["Counter"]);
        assert!(symbol_table.lookup("Counter").is_some());
    }

    #[test]
    fn test_export_rule() {
        assert!(is_exported("Println"));
        assert!(!is_exported("helper"));
        assert!(!is_exported("_"));
    }
}
