//! Imports across modules compiled in one unit.

use super::harness::*;
use cinder_compiler::CompilationUnit;

const LIB: &str = "export const scale = 3;
                   export function mul(x) { return x * scale; }
                   export type Pair { a = 1; b = 2; }";

fn run_app(app: &str) -> Machine {
    let mut unit = CompilationUnit::default();
    let mut machine = Machine::new();
    for (name, source) in [("lib", LIB), ("app", app)] {
        let outcome = unit.compile_module(name, source);
        let module = outcome
            .compiled
            .unwrap_or_else(|| panic!("{} failed: {:?}", name, outcome.diagnostics));
        machine.load(module).expect("runs");
    }
    machine
}

#[test]
fn test_named_imports() {
    let machine = run_app("import { mul, Pair } from \"lib\"; let p = new Pair; let r = mul(p.a + p.b);");
    assert_eq!(machine.global("r"), Value::Number(9.0));
}

#[test]
fn test_namespace_import() {
    let machine = run_app("import \"lib\" as lib; let r = lib.mul(2);");
    assert_eq!(machine.global("r"), Value::Number(6.0));
}

#[test]
fn test_imported_constant() {
    let machine = run_app("import { scale } from \"lib\"; let k = scale * 2;");
    assert_eq!(machine.global("k"), Value::Number(6.0));
}
