//! `throw`, `try` and `catch`.

use super::harness::*;

#[test]
fn test_catch_thrown_value() {
    expect_string(
        "let caught = \"\";
         try { throw \"boom\"; } catch (e) { caught = e; }",
        "caught",
        "boom",
    );
}

#[test]
fn test_throw_across_calls() {
    expect_number(
        "function check(x) {
             if (x > 1) throw \"big\";
             return x;
         }
         let r = 0;
         try {
             r = check(1);
             r = check(5);
         } catch (err) {
             r = r + 100;
         }",
        "r",
        101.0,
    );
}

#[test]
fn test_break_out_of_try() {
    expect_number(
        "let n = 0;
         while (true) {
             try {
                 n++;
                 if (n == 3) break;
             } catch (_e) {}
         }
         try { throw 10; } catch (e) { n += e; }",
        "n",
        13.0,
    );
}

#[test]
fn test_return_from_try() {
    let source = "function f() {
                      try { return 1; } catch (e) { return 2; }
                  }
                  let r = f();
                  let s = 0;
                  try { throw 5; } catch (e) { s = e; }";
    expect_number(source, "r", 1.0);
    expect_number(source, "s", 5.0);
}

#[test]
fn test_runtime_error_unwinds_block_locals() {
    expect_string(
        "let r = \"\";
         try {
             let o = null;
             let v = o.x;
             r = v;
         } catch (e) {
             r = \"caught\";
         }",
        "r",
        "caught",
    );
}
