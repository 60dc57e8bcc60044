//! Functions, calls and generic instances.

use super::harness::*;

#[test]
fn test_recursion() {
    expect_number(
        "function fact(n) {
             if (n <= 1) return 1;
             return n * fact(n - 1);
         }
         let r = fact(5);",
        "r",
        120.0,
    );
}

#[test]
fn test_call_before_declaration() {
    expect_number("let r = twice(4); function twice(x) { return x * 2; }", "r", 8.0);
}

#[test]
fn test_nested_function_declaration() {
    expect_number(
        "function outer() {
             function inner(a) { return a + 1; }
             return inner(2);
         }
         let r = outer();",
        "r",
        3.0,
    );
}

#[test]
fn test_arrow_function() {
    expect_number("let add = (a, b) => a + b; let r = add(2, 3);", "r", 5.0);
}

#[test]
fn test_functions_read_module_variables() {
    expect_number(
        "let base = 10;
         function addBase(x) { return x + base; }
         base = 20;
         let r = addBase(5);",
        "r",
        25.0,
    );
}

#[test]
fn test_many_arguments() {
    expect_number(
        "function sum4(a, b, c, d) { return a + b + c + d; }
         let r = sum4(1, 2, 3, 4);",
        "r",
        10.0,
    );
}

#[test]
fn test_missing_arguments_are_null() {
    let machine = run("function second(a, b) { return b; } let r = second(1);");
    assert_eq!(machine.global("r"), Value::Null);
}

#[test]
fn test_generic_function_instances() {
    let source = "function id<T>(x: T): T { return x; }
                  let a = id<number>(1);
                  let b = id(\"s\");
                  let c = id<number>(41) + 1;";
    expect_number(source, "a", 1.0);
    expect_string(source, "b", "s");
    expect_number(source, "c", 42.0);
}
