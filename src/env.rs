// ABOUTME: Lexical environments with const-aware bindings and a sealed pre-env

use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone)]
struct Binding {
    value: Value,
    is_const: bool,
}

/// Why an assignment through `set` was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignError {
    Undefined,
    Const,
}

/// A scope in the chain. Scope chains form a tree of parent pointers, so
/// reference counting suffices (no cycles).
pub struct Env {
    bindings: RefCell<HashMap<String, Binding>>,
    parent: Option<Rc<Env>>,
    sealed: bool,
}

impl std::fmt::Debug for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.bindings.borrow().keys().cloned().collect();
        f.debug_struct("Env")
            .field("names", &names)
            .field("sealed", &self.sealed)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

impl Env {
    pub fn new() -> Rc<Self> {
        Rc::new(Env {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
            sealed: false,
        })
    }

    pub fn with_parent(parent: Rc<Env>) -> Rc<Self> {
        Rc::new(Env {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent),
            sealed: false,
        })
    }

    /// Build the immutable pre-env: every entry const, and the whole scope
    /// marked so that top-level `let` cannot reuse its names.
    pub fn sealed(values: HashMap<String, Value>) -> Rc<Self> {
        let bindings = values
            .into_iter()
            .map(|(name, value)| {
                (
                    name,
                    Binding {
                        value,
                        is_const: true,
                    },
                )
            })
            .collect();
        Rc::new(Env {
            bindings: RefCell::new(bindings),
            parent: None,
            sealed: true,
        })
    }

    /// Adds a mutable binding in THIS scope. Returns false when the name is
    /// already bound here.
    pub fn define(&self, name: &str, value: Value) -> bool {
        let mut bindings = self.bindings.borrow_mut();
        if bindings.contains_key(name) {
            return false;
        }
        bindings.insert(
            name.to_string(),
            Binding {
                value,
                is_const: false,
            },
        );
        true
    }

    /// Adds an immutable binding in THIS scope.
    pub fn define_const(&self, name: &str, value: Value) -> bool {
        let mut bindings = self.bindings.borrow_mut();
        if bindings.contains_key(name) {
            return false;
        }
        bindings.insert(
            name.to_string(),
            Binding {
                value,
                is_const: true,
            },
        );
        true
    }

    pub fn has_local(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    /// Whether any sealed scope up the chain binds this name.
    pub fn sealed_has(&self, name: &str) -> bool {
        if self.sealed && self.bindings.borrow().contains_key(name) {
            return true;
        }
        match &self.parent {
            Some(parent) => parent.sealed_has(name),
            None => false,
        }
    }

    /// Looks up a name here and in parent scopes.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(binding) = self.bindings.borrow().get(name) {
            return Some(binding.value.clone());
        }
        match &self.parent {
            Some(parent) => parent.get(name),
            None => None,
        }
    }

    /// Mutates the nearest enclosing binding, refusing const ones.
    pub fn set(&self, name: &str, value: Value) -> Result<(), AssignError> {
        {
            let mut bindings = self.bindings.borrow_mut();
            if let Some(binding) = bindings.get_mut(name) {
                if binding.is_const {
                    return Err(AssignError::Const);
                }
                binding.value = value;
                return Ok(());
            }
        }
        match &self.parent {
            Some(parent) => parent.set(name, value),
            None => Err(AssignError::Undefined),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_and_get() {
        let env = Env::new();
        assert!(env.define("x", Value::Number(42.0)));
        match env.get("x") {
            Some(Value::Number(n)) => assert_eq!(n, 42.0),
            _ => panic!("Expected Number(42.0)"),
        }
    }

    #[test]
    fn test_redefinition_in_same_scope_fails() {
        let env = Env::new();
        assert!(env.define("x", Value::Number(1.0)));
        assert!(!env.define("x", Value::Number(2.0)));
        assert!(!env.define_const("x", Value::Number(3.0)));
    }

    #[test]
    fn test_shadowing_in_child_scope() {
        let parent = Env::new();
        parent.define("x", Value::Number(42.0));

        let child = Env::with_parent(parent.clone());
        assert!(child.define("x", Value::Number(100.0)));

        match child.get("x") {
            Some(Value::Number(n)) => assert_eq!(n, 100.0),
            _ => panic!("Expected Number(100.0)"),
        }
        match parent.get("x") {
            Some(Value::Number(n)) => assert_eq!(n, 42.0),
            _ => panic!("Expected Number(42.0)"),
        }
    }

    #[test]
    fn test_set_walks_chain() {
        let parent = Env::new();
        parent.define("x", Value::Number(1.0));
        let child = Env::with_parent(parent.clone());

        child.set("x", Value::Number(2.0)).unwrap();
        match parent.get("x") {
            Some(Value::Number(n)) => assert_eq!(n, 2.0),
            _ => panic!("Expected Number(2.0)"),
        }
    }

    #[test]
    fn test_set_undefined_fails() {
        let env = Env::new();
        assert_eq!(env.set("nope", Value::Null), Err(AssignError::Undefined));
    }

    #[test]
    fn test_const_binding_rejects_set() {
        let env = Env::new();
        env.define_const("k", Value::Str("v".into()));
        assert_eq!(env.set("k", Value::Null), Err(AssignError::Const));
        // value unchanged
        match env.get("k") {
            Some(Value::Str(s)) => assert_eq!(s, "v"),
            _ => panic!("Expected original value"),
        }
    }

    #[test]
    fn test_sealed_env_visibility() {
        let mut pre = HashMap::new();
        pre.insert("env".to_string(), Value::Null);
        let prelude = Env::sealed(pre);
        let top = Env::with_parent(prelude);

        assert!(top.sealed_has("env"));
        assert!(!top.sealed_has("other"));
        // sealed bindings are const
        assert_eq!(top.set("env", Value::Bool(true)), Err(AssignError::Const));
    }
}
