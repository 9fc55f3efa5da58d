use crate::ast::{ExprId, Expression, FunctionDecl, Statement};
use crate::callable::{self, LoxFunction};
use crate::class::Class;
use crate::environment::Environment;
use crate::resolver::Bindings;
use crate::token::{Token, TokenType};
use crate::value::Value;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::mem;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}\n[line {line}]")]
pub struct RuntimeError {
    pub line: i32,
    pub message: String,
}

impl RuntimeError {
    pub fn new(token: &Token, message: impl Into<String>) -> RuntimeError {
        RuntimeError {
            line: token.line,
            message: message.into(),
        }
    }
}

/// How a statement finished. `Return` and `Break` unwind to the nearest call
/// or loop respectively.
#[derive(Debug)]
pub enum Flow {
    Normal,
    Return { value: Value, line: i32 },
    Break { line: i32 },
}

pub struct Interpreter {
    globals: Environment,
    environment: Environment,
    bindings: Bindings,
    out: Box<dyn Write>,
}

impl Interpreter {
    pub fn new() -> Interpreter {
        Interpreter::with_output(Box::new(io::stdout()))
    }
    /// `out` receives everything written by `print` and `println`.
    pub fn with_output(out: Box<dyn Write>) -> Interpreter {
        let globals = Environment::new();
        for native in callable::natives() {
            globals.define(native.name, Value::Native(native));
        }
        Interpreter {
            environment: globals.clone(),
            globals,
            bindings: Bindings::new(),
            out,
        }
    }
    pub fn globals(&self) -> &Environment {
        &self.globals
    }
    /// Runs `statements` until the first uncaught runtime error. `bindings` is
    /// merged into the table kept from earlier calls.
    pub fn interpret(
        &mut self,
        statements: &[Statement],
        bindings: &Bindings,
    ) -> Result<(), RuntimeError> {
        self.bindings.extend(bindings.iter().map(|(id, d)| (*id, *d)));
        debug!(statements = statements.len(), "interpreting");
        for statement in statements {
            match self.execute(statement)? {
                Flow::Normal => (),
                Flow::Return { line, .. } => {
                    return Err(RuntimeError {
                        line,
                        message: "Cannot return from top-level code.".to_string(),
                    })
                }
                Flow::Break { line } => {
                    return Err(RuntimeError {
                        line,
                        message: "Cannot use 'break' outside of a loop.".to_string(),
                    })
                }
            }
        }
        Ok(())
    }
    /// Evaluates a lone expression for its value, as a prompt does.
    pub fn evaluate_expression(
        &mut self,
        expr: &Expression,
        bindings: &Bindings,
    ) -> Result<Value, RuntimeError> {
        self.bindings.extend(bindings.iter().map(|(id, d)| (*id, *d)));
        self.evaluate(expr)
    }
    pub fn write_line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", text)?;
        self.out.flush()
    }
    /// Runs `statements` in `environment`, restoring the current environment
    /// afterwards whatever the outcome.
    pub fn execute_block(
        &mut self,
        statements: &[Statement],
        environment: Environment,
    ) -> Result<Flow, RuntimeError> {
        let previous = mem::replace(&mut self.environment, environment);
        let result = self.execute_all(statements);
        self.environment = previous;
        result
    }
    fn execute_all(&mut self, statements: &[Statement]) -> Result<Flow, RuntimeError> {
        for statement in statements {
            match self.execute(statement)? {
                Flow::Normal => (),
                unwind => return Ok(unwind),
            }
        }
        Ok(Flow::Normal)
    }
    fn execute(&mut self, stmt: &Statement) -> Result<Flow, RuntimeError> {
        match stmt {
            Statement::Block(statements) => {
                let environment = self.environment.new_child();
                self.execute_block(statements, environment)
            }
            Statement::Break(keyword) => Ok(Flow::Break { line: keyword.line }),
            Statement::Class {
                name,
                superclass,
                methods,
            } => {
                self.class_declaration(name, superclass.as_ref(), methods)?;
                Ok(Flow::Normal)
            }
            Statement::Expression(e) => {
                self.evaluate(e)?;
                Ok(Flow::Normal)
            }
            Statement::Function(declaration) => {
                let function =
                    LoxFunction::new(Rc::clone(declaration), self.environment.clone(), false);
                self.environment
                    .define(&declaration.name.lexeme, Value::Function(function));
                Ok(Flow::Normal)
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Statement::Print { keyword, value } => {
                let value = self.evaluate(value)?;
                self.write_line(&value.to_string()).map_err(|e| {
                    RuntimeError::new(keyword, format!("Failed to write output: {}", e))
                })?;
                Ok(Flow::Normal)
            }
            Statement::Return { keyword, value } => {
                let value = match value {
                    Some(x) => self.evaluate(x)?,
                    None => Value::Nil,
                };
                Ok(Flow::Return {
                    value,
                    line: keyword.line,
                })
            }
            Statement::Var { name, initializer } => {
                let value = match initializer {
                    Some(x) => self.evaluate(x)?,
                    None => Value::Nil,
                };
                self.environment.define(&name.lexeme, value);
                Ok(Flow::Normal)
            }
            Statement::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Flow::Normal => (),
                        Flow::Break { .. } => break,
                        unwind => return Ok(unwind),
                    }
                }
                Ok(Flow::Normal)
            }
        }
    }
    fn class_declaration(
        &mut self,
        name: &Token,
        superclass: Option<&Expression>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<(), RuntimeError> {
        let superclass = match superclass {
            None => None,
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(x) => Some(x),
                _ => {
                    let token = match expr {
                        Expression::Variable { name, .. } => name,
                        _ => name,
                    };
                    return Err(RuntimeError::new(token, "Superclass must be a class."));
                }
            },
        };
        // Reserve the name first so methods can refer to the class.
        self.environment.define(&name.lexeme, Value::Nil);

        let mut environment = self.environment.clone();
        if let Some(superclass) = &superclass {
            environment = environment.new_child();
            environment.define("super", Value::Class(superclass.clone()));
        }
        let methods: BTreeMap<String, LoxFunction> = methods
            .iter()
            .map(|method| {
                let is_initializer = method.name.lexeme == "init";
                (
                    method.name.lexeme.clone(),
                    LoxFunction::new(Rc::clone(method), environment.clone(), is_initializer),
                )
            })
            .collect();
        trace!(class = %name.lexeme, methods = methods.len(), "class declared");
        let class = Class::new(&name.lexeme, superclass, methods);
        self.environment.assign(name, Value::Class(class))
    }
    fn evaluate(&mut self, expr: &Expression) -> Result<Value, RuntimeError> {
        match expr {
            Expression::Assign { id, name, value } => {
                let value = self.evaluate(value)?;
                match self.bindings.get(id) {
                    Some(distance) => {
                        if !self
                            .environment
                            .assign_at(*distance, &name.lexeme, value.clone())
                        {
                            return Err(unresolved(name));
                        }
                    }
                    None => self.globals.assign(name, value.clone())?,
                }
                Ok(value)
            }
            Expression::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary(operator, left, right)
            }
            Expression::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;
                let function = callee.as_callable().ok_or_else(|| {
                    RuntimeError::new(paren, "Can only call functions and classes.")
                })?;
                let mut evaluated_arguments: Vec<Value> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    evaluated_arguments.push(self.evaluate(argument)?);
                }
                if function.arity() != evaluated_arguments.len() {
                    return Err(RuntimeError::new(
                        paren,
                        format!(
                            "Expected {} arguments but got {}.",
                            function.arity(),
                            evaluated_arguments.len()
                        ),
                    ));
                }
                function.call(self, paren, evaluated_arguments)
            }
            Expression::Function(declaration) => Ok(Value::Function(LoxFunction::new(
                Rc::clone(declaration),
                self.environment.clone(),
                false,
            ))),
            Expression::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => instance.get(name),
                _ => Err(RuntimeError::new(name, "Only instances have properties.")),
            },
            Expression::Grouping(x) => self.evaluate(x),
            Expression::Literal(x) => Ok(Value::from(x)),
            Expression::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let short_circuit = match operator.tokentype {
                    TokenType::Or => left.is_truthy(),
                    _ => !left.is_truthy(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }
            Expression::Set {
                object,
                name,
                value,
            } => match self.evaluate(object)? {
                Value::Instance(instance) => {
                    let value = self.evaluate(value)?;
                    instance.set(name, value.clone());
                    Ok(value)
                }
                _ => Err(RuntimeError::new(name, "Only instances have fields.")),
            },
            Expression::Super {
                id,
                keyword,
                method,
            } => {
                let distance = self.distance(*id, keyword)?;
                let superclass = self.environment.get_at(distance, "super");
                // `this` always sits one scope inside `super`.
                let object = distance
                    .checked_sub(1)
                    .and_then(|d| self.environment.get_at(d, "this"));
                match (superclass, object) {
                    (Some(Value::Class(superclass)), Some(Value::Instance(object))) => superclass
                        .find_method(&method.lexeme)
                        .map(|x| Value::Function(x.bind(object)))
                        .ok_or_else(|| {
                            RuntimeError::new(
                                method,
                                format!("Undefined property '{}'.", method.lexeme),
                            )
                        }),
                    _ => Err(unresolved(keyword)),
                }
            }
            Expression::This { id, keyword } => self.look_up_variable(*id, keyword),
            Expression::Unary { operator, right } => {
                let right = self.evaluate(right)?;
                match operator.tokentype {
                    TokenType::Minus => match right {
                        Value::Number(r) => Ok(Value::Number(-r)),
                        _ => Err(RuntimeError::new(
                            operator,
                            format!("Operand of '{}' must be a number.", operator.lexeme),
                        )),
                    },
                    _ => Ok(Value::Boolean(!right.is_truthy())),
                }
            }
            Expression::Variable { id, name } => self.look_up_variable(*id, name),
        }
    }
    fn distance(&self, id: ExprId, name: &Token) -> Result<usize, RuntimeError> {
        self.bindings
            .get(&id)
            .cloned()
            .ok_or_else(|| unresolved(name))
    }
    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value, RuntimeError> {
        match self.bindings.get(&id) {
            Some(distance) => self
                .environment
                .get_at(*distance, &name.lexeme)
                .ok_or_else(|| unresolved(name)),
            None => self.globals.get(name),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

fn binary(operator: &Token, left: Value, right: Value) -> Result<Value, RuntimeError> {
    match operator.tokentype {
        TokenType::EqualEqual => return Ok(Value::Boolean(left == right)),
        TokenType::BangEqual => return Ok(Value::Boolean(left != right)),
        TokenType::Plus => {
            return match (left, right) {
                (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
                (Value::String(mut l), Value::String(r)) => {
                    l.push_str(&r);
                    Ok(Value::String(l))
                }
                _ => Err(RuntimeError::new(
                    operator,
                    "Operands of '+' must be two numbers or two strings.",
                )),
            }
        }
        _ => (),
    }
    let (l, r) = match (left, right) {
        (Value::Number(l), Value::Number(r)) => (l, r),
        _ => {
            return Err(RuntimeError::new(
                operator,
                format!("Operands of '{}' must be numbers.", operator.lexeme),
            ))
        }
    };
    match operator.tokentype {
        TokenType::Minus => Ok(Value::Number(l - r)),
        TokenType::Slash => Ok(Value::Number(l / r)),
        TokenType::Star => Ok(Value::Number(l * r)),
        TokenType::Greater => Ok(Value::Boolean(l > r)),
        TokenType::GreaterEqual => Ok(Value::Boolean(l >= r)),
        TokenType::Less => Ok(Value::Boolean(l < r)),
        TokenType::LessEqual => Ok(Value::Boolean(l <= r)),
        _ => Err(RuntimeError::new(
            operator,
            format!("Unknown binary operator '{}'.", operator.lexeme),
        )),
    }
}

// The resolver and the environment chain disagree; this should not happen
// for a program that resolved cleanly.
fn unresolved(name: &Token) -> RuntimeError {
    RuntimeError::new(name, format!("Unresolved local '{}'.", name.lexeme))
}
