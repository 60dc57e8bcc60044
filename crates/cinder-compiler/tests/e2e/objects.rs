//! Object literals, arrays, prototypes and construction.

use super::harness::*;

#[test]
fn test_object_literal_members() {
    expect_number(
        "let o = { a: 1, b: 2 };
         o.a += 5;
         let r = o.a + o.b;",
        "r",
        8.0,
    );
}

#[test]
fn test_array_index() {
    expect_number(
        "let xs = [1, 2, 3];
         xs[1] = 10;
         let r = xs[0] + xs[1] + xs[2];",
        "r",
        14.0,
    );
}

#[test]
fn test_constructor_and_method() {
    expect_number(
        "type Point {
             x = 0;
             y = 0;
             function $construct(x, y) { this.x = x; this.y = y; }
             function sum() { return this.x + this.y; }
         }
         let p = new Point(3, 4);
         let r = p.sum();",
        "r",
        7.0,
    );
}

#[test]
fn test_instances_share_prototype_defaults() {
    let machine = run(
        "type P { x = 1; }
         let a = new P;
         let b = new P;
         a.x = 5;
         let r = b.x;",
    );
    assert_eq!(machine.global("r"), Value::Number(1.0));
    assert_eq!(machine.global("a").member("x"), Some(Value::Number(5.0)));
}

#[test]
fn test_prototype_chain() {
    expect_number(
        "type Base { a = 1; function get() { return this.a; } }
         type Derived : Base { b = 2; }
         let d = new Derived;
         let r = d.get() + d.b;",
        "r",
        3.0,
    );
}

#[test]
fn test_dynamic_construction_without_constructor() {
    expect_string(
        "let proto: any = {};
         let made = new proto(1);
         let r = typeof made;",
        "r",
        "object",
    );
}

#[test]
fn test_dynamic_construction_calls_constructor() {
    expect_number(
        "type Counter { n = 0; function $construct(start) { this.n = start; } }
         let proto: any = Counter;
         let c = new proto(41);
         let r = c.n;",
        "r",
        41.0,
    );
}

#[test]
fn test_has_operator() {
    let machine = run("let o = { a: 1 }; let yes = o has a; let no = o has b;");
    assert_eq!(machine.global("yes"), Value::Bool(true));
    assert_eq!(machine.global("no"), Value::Bool(false));
}
