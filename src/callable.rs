use crate::ast::FunctionDecl;
use crate::environment::Environment;
use crate::instance::Instance;
use crate::interpreter::{Flow, Interpreter, RuntimeError};
use crate::token::{Token, TokenType};
use crate::value::Value;
use std::fmt;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::trace;

/// Anything that can appear in callee position.
pub trait Callable {
    fn arity(&self) -> usize;
    /// `paren` is the call's closing parenthesis, used to place errors.
    fn call(
        &self,
        interpreter: &mut Interpreter,
        paren: &Token,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError>;
}

#[derive(Clone)]
pub struct LoxFunction {
    data: Rc<LoxFunctionImpl>,
}

struct LoxFunctionImpl {
    declaration: Rc<FunctionDecl>,
    closure: Environment,
    is_initializer: bool,
}

impl LoxFunction {
    pub fn new(
        declaration: Rc<FunctionDecl>,
        closure: Environment,
        is_initializer: bool,
    ) -> LoxFunction {
        LoxFunction {
            data: Rc::new(LoxFunctionImpl {
                declaration,
                closure,
                is_initializer,
            }),
        }
    }
    /// Wraps the closure in a scope holding `this`.
    pub fn bind(&self, instance: Instance) -> LoxFunction {
        let environment = self.data.closure.new_child();
        environment.define("this", Value::Instance(instance));
        LoxFunction::new(
            Rc::clone(&self.data.declaration),
            environment,
            self.data.is_initializer,
        )
    }
    pub fn name(&self) -> &str {
        &self.data.declaration.name.lexeme
    }
    pub fn is_anonymous(&self) -> bool {
        matches!(self.data.declaration.name.tokentype, TokenType::Fun)
    }
    pub fn equals(&self, other: &LoxFunction) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
    fn bound_this(&self, paren: &Token) -> Result<Value, RuntimeError> {
        self.data
            .closure
            .get_at(0, "this")
            .ok_or_else(|| RuntimeError::new(paren, "Initializer called without an instance."))
    }
}

impl Callable for LoxFunction {
    fn arity(&self) -> usize {
        self.data.declaration.params.len()
    }
    fn call(
        &self,
        interpreter: &mut Interpreter,
        paren: &Token,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        trace!(function = self.name(), line = paren.line, "call");
        let environment = self.data.closure.new_child();
        for (param, argument) in self.data.declaration.params.iter().zip(arguments) {
            environment.define(&param.lexeme, argument);
        }
        let flow = interpreter.execute_block(&self.data.declaration.body, environment)?;
        if self.data.is_initializer {
            return self.bound_this(paren);
        }
        match flow {
            Flow::Return { value, .. } => Ok(value),
            _ => Ok(Value::Nil),
        }
    }
}

impl fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_anonymous() {
            write!(f, "<fn>")
        } else {
            write!(f, "<fn {}>", self.name())
        }
    }
}

impl fmt::Debug for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoxFunction")
            .field("name", &self.name())
            .field("arity", &self.arity())
            .field("is_initializer", &self.data.is_initializer)
            .finish()
    }
}

pub type NativeFn = fn(&mut Interpreter, &[Value]) -> Result<Value, String>;

#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub function: NativeFn,
}

impl Callable for NativeFunction {
    fn arity(&self) -> usize {
        self.arity
    }
    fn call(
        &self,
        interpreter: &mut Interpreter,
        paren: &Token,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        trace!(native = self.name, "call");
        (self.function)(interpreter, &arguments).map_err(|message| RuntimeError::new(paren, message))
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

impl fmt::Display for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn>")
    }
}

/// Seconds since the Unix epoch.
pub fn clock(_: &mut Interpreter, _: &[Value]) -> Result<Value, String> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| Value::Number(elapsed.as_secs_f64()))
        .map_err(|e| format!("Clock error: {}", e))
}

/// Writes the display form of its argument, then a newline.
pub fn println(interpreter: &mut Interpreter, arguments: &[Value]) -> Result<Value, String> {
    let text = arguments.first().map(Value::to_string).unwrap_or_default();
    interpreter
        .write_line(&text)
        .map_err(|e| format!("Failed to write output: {}", e))?;
    Ok(Value::Nil)
}

pub fn natives() -> Vec<NativeFunction> {
    vec![
        NativeFunction {
            name: "clock",
            arity: 0,
            function: clock,
        },
        NativeFunction {
            name: "println",
            arity: 1,
            function: println,
        },
    ]
}
