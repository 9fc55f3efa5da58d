use crate::ast::{ExprId, Expression, FunctionDecl, Statement};
use crate::error::{Diagnostic, Phase};
use crate::token::Token;
use std::collections::BTreeMap;
use strum_macros::Display;
use tracing::{debug, trace};

/// Scope distance for every name that resolved to a local binding. Names
/// missing from the table are globals.
pub type Bindings = BTreeMap<ExprId, usize>;

#[derive(Clone, Copy, Debug, Display)]
enum FunctionType {
    None,
    Function,
    Method,
}

#[derive(Clone, Copy, Debug, Display)]
enum ClassType {
    None,
    Class,
    Subclass,
}

pub struct Resolver {
    // false while a name is declared but its initializer is still running.
    scopes: Vec<BTreeMap<String, bool>>,
    bindings: Bindings,
    errors: Vec<Diagnostic>,
    current_function: FunctionType,
    current_class: ClassType,
    loop_depth: usize,
}

pub fn resolve(statements: &[Statement]) -> (Bindings, Vec<Diagnostic>) {
    let mut resolver = Resolver::new();
    resolver.resolve(statements);
    resolver.finish()
}

impl Resolver {
    pub fn new() -> Resolver {
        Resolver {
            scopes: Vec::new(),
            bindings: Bindings::new(),
            errors: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            loop_depth: 0,
        }
    }
    pub fn resolve(&mut self, statements: &[Statement]) {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }
    pub fn finish(self) -> (Bindings, Vec<Diagnostic>) {
        debug!(
            locals = self.bindings.len(),
            errors = self.errors.len(),
            "resolved names"
        );
        (self.bindings, self.errors)
    }
    fn resolve_stmt(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Print { value, .. } => self.resolve_expr(value),
            Statement::Expression(expr) => self.resolve_expr(expr),
            Statement::Var { name, initializer } => {
                self.declare(name);
                if let Some(x) = initializer {
                    self.resolve_expr(x);
                }
                self.define(name);
            }
            Statement::Block(stmts) => {
                self.begin_scope();
                self.resolve(stmts);
                self.end_scope();
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(some_else) = else_branch {
                    self.resolve_stmt(some_else);
                }
            }
            Statement::While { condition, body } => {
                self.resolve_expr(condition);
                self.loop_depth += 1;
                self.resolve_stmt(body);
                self.loop_depth -= 1;
            }
            Statement::Break(keyword) => {
                if self.loop_depth == 0 {
                    self.error(keyword, "Cannot use 'break' outside of a loop.");
                }
            }
            Statement::Function(fun) => {
                self.declare(&fun.name);
                self.define(&fun.name);
                self.resolve_function(fun, FunctionType::Function);
            }
            Statement::Return { keyword, value } => {
                if let FunctionType::None = self.current_function {
                    self.error(keyword, "Cannot return from top-level code.");
                }
                // A value returned from an initializer is discarded at run time.
                if let Some(x) = value {
                    self.resolve_expr(x);
                }
            }
            Statement::Class {
                name,
                superclass,
                methods,
            } => {
                let enclosing_class = self.current_class;
                self.current_class = ClassType::Class;
                self.declare(name);
                self.define(name);
                if let Some(superclass) = superclass {
                    self.current_class = ClassType::Subclass;
                    match superclass {
                        Expression::Variable {
                            name: superclass_name,
                            ..
                        } if superclass_name.lexeme == name.lexeme => {
                            self.error(superclass_name, "A class cannot inherit from itself.");
                        }
                        _ => self.resolve_expr(superclass),
                    }
                    self.begin_scope();
                    self.mark_defined("super");
                }
                self.begin_scope();
                self.mark_defined("this");
                for method in methods {
                    self.resolve_function(method, FunctionType::Method);
                }
                self.end_scope();
                if superclass.is_some() {
                    self.end_scope();
                }
                self.current_class = enclosing_class;
            }
        }
    }
    fn resolve_expr(&mut self, expr: &Expression) {
        match expr {
            Expression::Binary { left, right, .. } | Expression::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expression::Grouping(expr) => self.resolve_expr(expr),
            Expression::Literal(_) => (),
            Expression::Unary { right, .. } => self.resolve_expr(right),
            Expression::Variable { id, name } => {
                let in_initializer = matches!(
                    self.scopes.last().and_then(|x| x.get(&name.lexeme)),
                    Some(false)
                );
                if in_initializer {
                    self.error(name, "Cannot read local variable in its own initializer.");
                }
                self.resolve_local(*id, &name.lexeme);
            }
            Expression::Assign { id, name, value } => {
                self.resolve_expr(value);
                self.resolve_local(*id, &name.lexeme);
            }
            Expression::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }
            Expression::Function(fun) => self.resolve_function(fun, FunctionType::Function),
            Expression::Get { object, .. } => self.resolve_expr(object),
            Expression::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }
            Expression::This { id, keyword } => match self.current_class {
                ClassType::None => self.error(keyword, "Cannot use 'this' outside of a class."),
                ClassType::Class | ClassType::Subclass => self.resolve_local(*id, "this"),
            },
            Expression::Super { id, keyword, .. } => match self.current_class {
                ClassType::None => self.error(keyword, "Cannot use 'super' outside of a class."),
                ClassType::Class => self.error(
                    keyword,
                    "Cannot use 'super' in a class with no superclass.",
                ),
                ClassType::Subclass => self.resolve_local(*id, "super"),
            },
        }
    }
    fn begin_scope(&mut self) {
        self.scopes.push(BTreeMap::new());
    }
    fn end_scope(&mut self) {
        self.scopes.pop();
    }
    fn declare(&mut self, name: &Token) {
        let redeclared = match self.scopes.last_mut() {
            Some(scope) => scope.insert(name.lexeme.clone(), false).is_some(),
            None => false,
        };
        if redeclared {
            self.error(
                name,
                "Variable with this name already declared in this scope.",
            );
        }
    }
    fn define(&mut self, name: &Token) {
        self.mark_defined(&name.lexeme);
    }
    fn mark_defined(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), true);
        }
    }
    fn resolve_local(&mut self, id: ExprId, name: &str) {
        for (i, cur_scope) in self.scopes.iter().enumerate().rev() {
            if cur_scope.contains_key(name) {
                let distance = self.scopes.len() - 1 - i;
                trace!(name, distance, "resolved local");
                self.bindings.insert(id, distance);
                return;
            }
        }
    }
    fn resolve_function(&mut self, fun: &FunctionDecl, fn_type: FunctionType) {
        let enclosing_fn = self.current_function;
        let enclosing_loops = self.loop_depth;
        trace!(function = %fun.name.lexeme, kind = %fn_type, "resolving function");
        self.current_function = fn_type;
        self.loop_depth = 0;
        self.begin_scope();
        for param in fun.params.iter() {
            self.declare(param);
            self.define(param);
        }
        self.resolve(&fun.body);
        self.end_scope();
        self.loop_depth = enclosing_loops;
        self.current_function = enclosing_fn;
    }
    fn error(&mut self, token: &Token, message: &str) {
        self.errors
            .push(Diagnostic::at_token(Phase::Resolution, token, message));
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Resolver::new()
    }
}
