//! Stack balance over random nesting of scopes, loops and handlers.
//!
//! Code generation fails with `StackMismatch` when a scope closes with a
//! different number of slots than it declared locals, and the harness
//! rejects a module whose main body leaves values on the stack. A generated
//! program therefore compiles, runs to completion and accumulates a total
//! that can be predicted from the tree.

#[path = "e2e/harness.rs"]
#[allow(dead_code)]
mod harness;

use cinder_compiler::CompileOptions;
use harness::{run_with, Value};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Node {
    /// `let v = value;`, optionally added to the total
    Let { value: u8, used: bool },
    Block(Vec<Node>),
    If { cond: bool, then: Vec<Node>, otherwise: Vec<Node> },
    /// Two iterations; `exit` is `break` or `continue` after the body
    Loop { body: Vec<Node>, exit: bool },
    Try { body: Vec<Node>, throws: bool, handler: Vec<Node> },
}

fn node() -> impl Strategy<Value = Node> {
    let leaf = (1u8..10, any::<bool>()).prop_map(|(value, used)| Node::Let { value, used });
    leaf.prop_recursive(4, 48, 4, |inner| {
        let list = prop::collection::vec(inner, 0..4);
        prop_oneof![
            list.clone().prop_map(Node::Block),
            (any::<bool>(), list.clone(), list.clone()).prop_map(|(cond, then, otherwise)| Node::If {
                cond,
                then,
                otherwise
            }),
            (list.clone(), any::<bool>()).prop_map(|(body, exit)| Node::Loop { body, exit }),
            (list.clone(), any::<bool>(), list).prop_map(|(body, throws, handler)| Node::Try {
                body,
                throws,
                handler
            }),
        ]
    })
}

fn total(nodes: &[Node]) -> f64 {
    nodes
        .iter()
        .map(|node| match node {
            Node::Let { value, used } => {
                if *used {
                    f64::from(*value)
                } else {
                    0.0
                }
            }
            Node::Block(body) => total(body),
            Node::If { cond, then, otherwise } => total(if *cond { then } else { otherwise }),
            Node::Loop { body, .. } => 2.0 * total(body),
            Node::Try { body, throws, handler } => total(body) + if *throws { total(handler) } else { 0.0 },
        })
        .sum()
}

#[derive(Default)]
struct Renderer {
    out: String,
    next: usize,
}

impl Renderer {
    fn fresh(&mut self, prefix: &str) -> String {
        self.next += 1;
        format!("{}{}", prefix, self.next)
    }

    fn list(&mut self, nodes: &[Node]) {
        for node in nodes {
            self.node(node);
        }
    }

    fn node(&mut self, node: &Node) {
        match node {
            Node::Let { value, used } => {
                let name = self.fresh("v");
                self.out.push_str(&format!("let {} = {};\n", name, value));
                if *used {
                    self.out.push_str(&format!("total = total + {};\n", name));
                }
            }
            Node::Block(body) => {
                self.out.push_str("{\n");
                self.list(body);
                self.out.push_str("}\n");
            }
            Node::If { cond, then, otherwise } => {
                self.out.push_str(&format!("if ({}) {{\n", cond));
                self.list(then);
                self.out.push_str("} else {\n");
                self.list(otherwise);
                self.out.push_str("}\n");
            }
            Node::Loop { body, exit } => {
                let i = self.fresh("i");
                self.out
                    .push_str(&format!("for (let {i} = 0; {i} < 2; {i}++) {{\n", i = i));
                self.list(body);
                let exit = if *exit { "break" } else { "continue" };
                self.out.push_str(&format!("if ({} == 1) {};\n}}\n", i, exit));
            }
            Node::Try { body, throws, handler } => {
                let e = self.fresh("e");
                self.out.push_str("try {\n");
                self.list(body);
                if *throws {
                    self.out.push_str("throw 0;\n");
                }
                self.out.push_str(&format!("}} catch ({}) {{\n", e));
                self.list(handler);
                self.out.push_str("}\n");
            }
        }
    }
}

/// The tree inside a module-level block and again inside a function body.
fn render(nodes: &[Node]) -> String {
    let mut renderer = Renderer::default();
    renderer.out.push_str("let total = 0;\n{\n");
    renderer.list(nodes);
    renderer.out.push_str("}\nfunction again() {\n");
    renderer.list(nodes);
    renderer.out.push_str("}\nagain();\n");
    renderer.out
}

fn check(nodes: &[Node], optimize: bool) {
    let source = render(nodes);
    let options = CompileOptions {
        optimize,
        ..CompileOptions::default()
    };
    let machine = run_with(options, &source);
    assert_eq!(machine.global("total"), Value::Number(2.0 * total(nodes)), "source:\n{}", source);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_scopes_stay_balanced(nodes in prop::collection::vec(node(), 0..5)) {
        check(&nodes, false);
        check(&nodes, true);
    }
}

#[test]
fn test_break_and_continue_inside_handlers() {
    let source = "let total = 0;
                  for (let i = 0; i < 3; i++) {
                      let a = 1;
                      try {
                          let b = 2;
                          if (i == 0) continue;
                          total = total + a + b;
                          if (i == 1) break;
                      } catch (e) {
                          total = e;
                      }
                  }";
    let machine = run_with(CompileOptions::default(), source);
    assert_eq!(machine.global("total"), Value::Number(3.0));
}
