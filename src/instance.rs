use crate::class::Class;
use crate::interpreter::RuntimeError;
use crate::token::Token;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

#[derive(Clone)]
pub struct Instance {
    data: Rc<RefCell<InstanceImpl>>,
}

struct InstanceImpl {
    class: Class,
    fields: BTreeMap<String, Value>,
}

impl Instance {
    pub fn new(class: Class) -> Instance {
        Instance {
            data: Rc::new(RefCell::new(InstanceImpl {
                class,
                fields: BTreeMap::new(),
            })),
        }
    }
    /// Fields shadow methods; methods come back bound to this instance.
    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        let data = self.data.borrow();
        if let Some(x) = data.fields.get(&name.lexeme) {
            return Ok(x.clone());
        }
        data.class
            .find_method(&name.lexeme)
            .map(|method| Value::Function(method.bind(self.clone())))
            .ok_or_else(|| {
                RuntimeError::new(name, format!("Undefined property '{}'.", name.lexeme))
            })
    }
    pub fn set(&self, name: &Token, value: Value) {
        self.data
            .borrow_mut()
            .fields
            .insert(name.lexeme.to_string(), value);
    }
    pub fn equals(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} instance", self.data.borrow().class)
    }
}

// Fields may refer back to the instance, so only the class is shown.
impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({})", self.data.borrow().class.name())
    }
}
