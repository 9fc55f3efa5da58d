use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use treelox::{Lox, LoxError};

#[derive(Clone, Default)]
struct Output(Rc<RefCell<Vec<u8>>>);

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Output {
    fn text(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).unwrap()
    }
}

fn run(source: &str) -> (String, Result<(), LoxError>) {
    let output = Output::default();
    let mut lox = Lox::with_output(Box::new(output.clone()));
    let result = lox.run(source);
    (output.text(), result)
}

fn expect_output(source: &str, expected: &str) {
    let (text, result) = run(source);
    if let Err(e) = result {
        panic!("{}", e);
    }
    assert_eq!(text, expected);
}

fn expect_runtime_error(source: &str, message: &str) {
    match run(source).1 {
        Err(LoxError::Runtime(e)) => assert_eq!(e.message, message),
        other => panic!("expected runtime error, got {:?}", other),
    }
}

#[test]
fn precedence_and_associativity() {
    expect_output("print 1 + 2 * 3; print 2 - 3 - 1;", "7\n-2\n");
}

#[test]
fn zero_is_truthy() {
    expect_output("if (0) print \"yes\"; else print \"no\";", "yes\n");
}

#[test]
fn shadowing() {
    expect_output("var a = 1; { var a = 2; print a; } print a;", "2\n1\n");
}

#[test]
fn uninitialized_variable_is_nil() {
    expect_output("var x; print x;", "nil\n");
}

#[test]
fn counter_closure() {
    expect_output(
        r#"
        fun makeCounter() {
          var count = 0;
          fun increment() {
            count = count + 1;
            return count;
          }
          return increment;
        }
        var a = makeCounter();
        var b = makeCounter();
        print a();
        print a();
        print b();
        print a();
        "#,
        "1\n2\n1\n3\n",
    );
}

#[test]
fn recursion() {
    expect_output(
        r#"
        fun fib(n) {
          if (n < 2) return n;
          return fib(n - 1) + fib(n - 2);
        }
        for (var i = 0; i < 8; i = i + 1) println(fib(i));
        "#,
        "0\n1\n1\n2\n3\n5\n8\n13\n",
    );
}

#[test]
fn super_call_mutates_subclass_instance() {
    expect_output(
        r#"
        class Counter {
          init() { this.count = 0; }
          bump() { this.count = this.count + 1; }
        }
        class Double < Counter {
          bump() {
            super.bump();
            super.bump();
          }
        }
        var d = Double();
        d.bump();
        print d.count;
        "#,
        "2\n",
    );
}

#[test]
fn methods_are_bound() {
    expect_output(
        r#"
        class Greeter {
          init(name) { this.name = name; }
          greet() { print "hi " + this.name; }
        }
        var g = Greeter("lox").greet;
        g();
        "#,
        "hi lox\n",
    );
}

#[test]
fn init_with_bare_return_yields_instance() {
    expect_output(
        r#"
        class Box {
          init(v) {
            this.v = v;
            if (v) return;
            this.v = "replaced";
          }
        }
        print Box(true).v;
        print Box(false).v;
        "#,
        "true\nreplaced\n",
    );
}

#[test]
fn break_leaves_innermost_loop() {
    expect_output(
        r#"
        for (var i = 0; i < 3; i = i + 1) {
          for (var j = 0; j < 10; j = j + 1) {
            if (j == 2) break;
            print i * 10 + j;
          }
        }
        "#,
        "0\n1\n10\n11\n20\n21\n",
    );
}

#[test]
fn anonymous_functions_are_values() {
    expect_output(
        r#"
        fun apply(f, x) { return f(x); }
        print apply(fun (n) { return n * n; }, 7);
        "#,
        "49\n",
    );
}

#[test]
fn integer_valued_numbers_drop_fraction() {
    expect_output("println(3.0); println(2.5); print 10 / 4;", "3\n2.5\n2.5\n");
}

#[test]
fn arity_mismatch() {
    expect_runtime_error("fun f() {} f(1);", "Expected 0 arguments but got 1.");
}

#[test]
fn mixed_plus_is_an_error() {
    expect_runtime_error(
        "print \"a\" + 1;",
        "Operands of '+' must be two numbers or two strings.",
    );
}

#[test]
fn runtime_error_stops_later_statements() {
    let (text, result) = run("print \"before\"; undefined; print \"after\";");
    assert_eq!(text, "before\n");
    assert_eq!(result.unwrap_err().exit_code(), 70);
}

#[test]
fn static_errors_prevent_interpretation() {
    let (text, result) = run("print \"side effect\";\nfun f() { return 1 }\n{ var a = a; }");
    assert_eq!(text, "");
    match result {
        Err(LoxError::Static(errors)) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(
                errors[0].to_string(),
                "[line 2] Error at '}': Expect ';' after return value."
            );
        }
        other => panic!("expected static errors, got {:?}", other),
    }
}

#[test]
fn lexical_and_syntax_errors_are_reported_together() {
    match run("var a = @;\nprint \"open").1 {
        Err(LoxError::Static(errors)) => {
            let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
            assert!(messages.contains(&"Unexpected character."));
            assert!(messages.contains(&"Unterminated string."));
        }
        other => panic!("expected static errors, got {:?}", other),
    }
}
