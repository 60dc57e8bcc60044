//! Generic instantiation is cached per distinct argument binding.

use cinder_compiler::analyze::generic::InstantiationStats;
use cinder_compiler::{CompilationUnit, TypeId};

fn compile(source: &str) -> CompilationUnit {
    let mut unit = CompilationUnit::default();
    let outcome = unit.compile_module("test", source);
    assert!(outcome.is_success(), "{:#?}", outcome.diagnostics);
    unit
}

#[test]
fn test_function_instance_is_built_once() {
    let unit = compile(
        "function id<T>(x: T): T { return x; }
         let a = id<number>(1);
         let b = id<number>(2);",
    );
    assert_eq!(
        unit.instantiation_stats("test", "id", &[TypeId::NUMBER]),
        InstantiationStats { clones: 2, builds: 1 }
    );
}

#[test]
fn test_inferred_and_explicit_arguments_share_instance() {
    let unit = compile(
        "function id<T>(x: T): T { return x; }
         let a = id(1);
         let b = id<number>(2);
         let c = id(\"s\");",
    );
    let number = unit.instantiation_stats("test", "id", &[TypeId::NUMBER]);
    assert_eq!(number.clones, 2);
    assert_eq!(number.builds, 1);
    let string = unit.instantiation_stats("test", "id", &[TypeId::STRING]);
    assert_eq!(string, InstantiationStats { clones: 1, builds: 1 });
}

#[test]
fn test_type_instance_is_built_once() {
    let unit = compile(
        "type Box<T> { value: T; }
         let a = new Box<number>;
         let b = new Box<number>;",
    );
    assert_eq!(
        unit.instantiation_stats("test", "Box", &[TypeId::NUMBER]),
        InstantiationStats { clones: 2, builds: 1 }
    );
}

#[test]
fn test_unused_template_is_never_built() {
    let unit = compile("function id<T>(x: T): T { return x; } let a = 1;");
    assert_eq!(
        unit.instantiation_stats("test", "id", &[TypeId::NUMBER]),
        InstantiationStats::default()
    );
    let module = unit.module("test").expect("module kept");
    assert_eq!(module.generics.instance_count(), 0);
}
