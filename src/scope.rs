use crate::error::{RuntimeError, RuntimeResult, SourceLocation};
use crate::symbol_table::BLANK;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

#[derive(Clone)]
struct Binding {
    value: Value,
    mutable: bool,
}

#[derive(Default)]
struct Scope {
    bindings: HashMap<String, Binding>,
    parent: Option<Environment>,
}

/// A lexical scope shared by every block and closure that can see it.
///
/// Cloning an `Environment` clones the handle, not the bindings: a closure
/// holding a clone observes later assignments made through any other handle.
#[derive(Clone, Default)]
pub struct Environment {
    scope: Rc<RefCell<Scope>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        Self {
            scope: Rc::new(RefCell::new(Scope {
                bindings: HashMap::new(),
                parent: Some(self.clone()),
            })),
        }
    }

    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.bind(name.into(), value, true);
    }

    pub fn define_const(&self, name: impl Into<String>, value: Value) {
        self.bind(name.into(), value, false);
    }

    fn bind(&self, name: String, value: Value, mutable: bool) {
        if name == BLANK {
            return;
        }
        self.scope
            .borrow_mut()
            .bindings
            .insert(name, Binding { value, mutable });
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let scope = self.scope.borrow();
        match scope.bindings.get(name) {
            Some(binding) => Some(binding.value.clone()),
            None => scope.parent.as_ref().and_then(|parent| parent.get(name)),
        }
    }

    /// Looks only at this scope's own bindings.
    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.scope
            .borrow()
            .bindings
            .get(name)
            .map(|binding| binding.value.clone())
    }

    pub fn has_local(&self, name: &str) -> bool {
        self.scope.borrow().bindings.contains_key(name)
    }

    /// Overwrites the nearest binding of `name`.
    pub fn assign(&self, name: &str, value: Value, location: SourceLocation) -> RuntimeResult<()> {
        let mut scope = self.scope.borrow_mut();
        match scope.bindings.get_mut(name) {
            Some(binding) if binding.mutable => {
                binding.value = value;
                Ok(())
            }
            Some(_) => Err(RuntimeError::type_mismatch(
                format!("cannot assign to {}", name),
                location,
            )),
            None => match &scope.parent {
                Some(parent) => parent.assign(name, value, location),
                None => Err(RuntimeError::Undefined {
                    name: name.to_string(),
                    location,
                }),
            },
        }
    }

    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.scope, &other.scope)
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Closures stored here point back at this scope, so only names are shown.
        let scope = self.scope.borrow();
        let mut names: Vec<_> = scope.bindings.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("names", &names)
            .field("has_parent", &scope.parent.is_some())
            .finish()
    }
}
