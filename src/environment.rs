use crate::interpreter::RuntimeError;
use crate::token::Token;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

type Link = Option<Rc<Scope>>;

struct Scope {
    values: RefCell<BTreeMap<String, Value>>,
    enclosing: Link,
}

/// A handle on one scope in the chain. Cloning shares the scope, so a closure
/// and the block that created it see the same bindings.
#[derive(Clone)]
pub struct Environment {
    head: Rc<Scope>,
}

impl Environment {
    pub fn new() -> Environment {
        Environment {
            head: Rc::new(Scope {
                values: RefCell::new(BTreeMap::new()),
                enclosing: None,
            }),
        }
    }
    pub fn new_child(&self) -> Environment {
        Environment {
            head: Rc::new(Scope {
                values: RefCell::new(BTreeMap::new()),
                enclosing: Some(Rc::clone(&self.head)),
            }),
        }
    }
    pub fn define(&self, name: &str, value: Value) {
        self.head
            .values
            .borrow_mut()
            .insert(name.to_string(), value);
    }
    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        let mut cur = Some(&self.head);
        while let Some(scope) = cur {
            if let Some(x) = scope.values.borrow().get(&name.lexeme) {
                return Ok(x.clone());
            }
            cur = scope.enclosing.as_ref();
        }
        Err(undefined(name))
    }
    pub fn assign(&self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        let mut cur = Some(&self.head);
        while let Some(scope) = cur {
            if let Some(x) = scope.values.borrow_mut().get_mut(&name.lexeme) {
                *x = value;
                return Ok(());
            }
            cur = scope.enclosing.as_ref();
        }
        Err(undefined(name))
    }
    /// Reads `name` from exactly `distance` scopes out, without searching.
    pub fn get_at(&self, distance: usize, name: &str) -> Option<Value> {
        self.ancestor(distance)
            .and_then(|scope| scope.values.borrow().get(name).cloned())
    }
    pub fn assign_at(&self, distance: usize, name: &str, value: Value) -> bool {
        match self.ancestor(distance) {
            Some(scope) => match scope.values.borrow_mut().get_mut(name) {
                Some(x) => {
                    *x = value;
                    true
                }
                None => false,
            },
            None => false,
        }
    }
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cur = self.head.enclosing.as_ref();
        while let Some(scope) = cur {
            depth += 1;
            cur = scope.enclosing.as_ref();
        }
        depth
    }
    pub fn equals(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.head, &other.head)
    }
    fn ancestor(&self, distance: usize) -> Option<&Rc<Scope>> {
        let mut scope = &self.head;
        for _ in 0..distance {
            scope = scope.enclosing.as_ref()?;
        }
        Some(scope)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.head.values.borrow().keys().cloned().collect();
        f.debug_struct("Environment")
            .field("depth", &self.depth())
            .field("names", &names)
            .finish()
    }
}

fn undefined(name: &Token) -> RuntimeError {
    RuntimeError::new(name, format!("Undefined variable '{}'.", name.lexeme))
}
