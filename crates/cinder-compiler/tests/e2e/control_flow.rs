//! Loops, branches and short-circuit operators.

use super::harness::*;

// ============================================================================
// Loops
// ============================================================================

#[test]
fn test_for_true_with_break() {
    expect_number("let i = 0; for (; true; i++) { if (i > 2) break; }", "i", 3.0);
}

#[test]
fn test_for_without_condition() {
    expect_number("let i = 0; for (;; i++) { if (i == 4) break; }", "i", 4.0);
}

#[test]
fn test_while_sum() {
    expect_number(
        "let sum = 0;
         let i = 1;
         while (i <= 10) {
             sum += i;
             i++;
         }",
        "sum",
        55.0,
    );
}

#[test]
fn test_while_never_runs() {
    expect_number("let x = 0; while (false) { x = 100; }", "x", 0.0);
}

#[test]
fn test_do_while_false_runs_once() {
    expect_number("let n = 0; do { n++; } while (false);", "n", 1.0);
}

#[test]
fn test_do_while_counts() {
    expect_number("let n = 0; do { n += 2; } while (n < 7);", "n", 8.0);
}

#[test]
fn test_continue_skips_block_locals() {
    expect_number(
        "let total = 0;
         for (let i = 0; i < 10; i++) {
             if (i % 2 == 0) continue;
             let sq = i * i;
             total += sq;
         }",
        "total",
        165.0,
    );
}

#[test]
fn test_break_pops_block_locals() {
    expect_number(
        "let found = 0;
         for (let i = 0; ; i++) {
             let d = i * 3;
             if (d > 10) {
                 found = d;
                 break;
             }
         }",
        "found",
        12.0,
    );
}

#[test]
fn test_nested_loops() {
    expect_number(
        "let count = 0;
         for (let i = 0; i < 3; i++) {
             for (let j = 0; j < 3; j++) {
                 if (j == i) break;
                 count++;
             }
         }",
        "count",
        3.0,
    );
}

#[test]
fn test_side_effecting_false_condition_still_runs() {
    expect_number(
        "let hits = 0;
         function check() { hits++; return false; }
         while (check()) { hits += 100; }",
        "hits",
        1.0,
    );
}

// ============================================================================
// Branches and operators
// ============================================================================

#[test]
fn test_if_else_chain() {
    expect_string(
        "let n = 15;
         let label = \"\";
         if (n < 10) { label = \"small\"; }
         else if (n < 20) { label = \"medium\"; }
         else { label = \"large\"; }",
        "label",
        "medium",
    );
}

#[test]
fn test_short_circuit_skips_calls() {
    let source = "let calls = 0;
                  function bump() { calls++; return true; }
                  let r = false && bump();
                  let s = true || bump();
                  let t = true && bump();";
    expect_number(source, "calls", 1.0);
    let (plain, optimized) = run_both(source, "r");
    assert_eq!(plain, Value::Bool(false));
    assert_eq!(optimized, Value::Bool(false));
}

#[test]
fn test_ternary() {
    expect_string("let x = 5; let y = x > 3 ? \"big\" : \"small\";", "y", "big");
}

#[test]
fn test_constant_propagation_matches_runtime() {
    expect_number("const k = 2 * 3; let x = k + 1;", "x", 7.0);
    expect_string("let s = \"ab\" + \"cd\";", "s", "abcd");
}

#[test]
fn test_enum_members() {
    expect_number("enum Color { Red, Green = 5, Blue } let c = Color.Blue;", "c", 6.0);
}

#[test]
fn test_compound_and_update_operators() {
    expect_number(
        "let a = 10;
         a -= 3;
         a *= 2;
         let old = a++;
         let r = old * 100 + a;",
        "r",
        1415.0,
    );
}

#[test]
fn test_long_operator_chain() {
    let source = format!("let x = 1; let r = x{};", " + x".repeat(99));
    expect_number(&source, "r", 100.0);
}
