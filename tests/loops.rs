mod common;

use common::{assert_blocks_terminated, compile_ok};

#[test]
fn compile_infinite_loop_with_break() {
    let ir = compile_ok("package p; func main(){ for { break } }");

    let main_at = ir.find("define void @p__main()").unwrap();
    let main_body = &ir[main_at..ir[main_at..].find("\n}").unwrap() + main_at];

    assert!(main_body.contains("uroboros.0:"));
    assert!(main_body.contains("uroboros.end.0:"));

    // the body is a single branch to the loop end, with no dead terminator
    // squeezed in front of it
    let body_at = main_body.find("uroboros.0:").unwrap();
    let end_at = main_body.find("uroboros.end.0:").unwrap();
    let loop_body = &main_body[body_at..end_at];
    assert_eq!(loop_body.matches("br label %uroboros.end.0").count(), 1);
    assert_eq!(loop_body.matches("br ").count(), 1);

    assert_blocks_terminated(&ir);
}

#[test]
fn compile_while_loop() {
    let ir = compile_ok("package p; func f(n int) int { s := 0; for n > 0 { s += n; n-- }; return s } func main(){}");

    assert!(ir.contains("while.cond.0:"));
    assert!(ir.contains("while.body.0:"));
    assert!(ir.contains("while.end.0:"));
    assert!(ir.contains("icmp sgt i32"));
    assert_blocks_terminated(&ir);
}

#[test]
fn compile_claused_loop() {
    let ir =
        compile_ok("package p; func f(n int) int { s := 0; for i := 0; i < n; i++ { s += i }; return s } func main(){}");

    assert!(ir.contains("for.cond.0:"));
    assert!(ir.contains("for.body.0:"));
    assert!(ir.contains("for.post.0:"));
    assert!(ir.contains("for.end.0:"));
    // continue target is the post block: body falls through to it
    let body_at = ir.find("for.body.0:").unwrap();
    let post_at = ir.find("for.post.0:").unwrap();
    let body = &ir[body_at..post_at];
    assert!(body.contains("br label %for.post.0"));
    assert_blocks_terminated(&ir);
}

#[test]
fn compile_continue() {
    let ir = compile_ok(
        "package p; func f(n int) int { s := 0; for i := 0; i < n; i++ { if i == 2 { continue }; s += i }; return s } func main(){}",
    );
    assert!(ir.contains("br label %for.post.0"));
    assert_blocks_terminated(&ir);
}

#[test]
fn compile_nested_loops_break_targets_inner() {
    let ir = compile_ok(
        "package p; func main(){ for { for { break }; break } }",
    );
    let inner_end = ir.find("uroboros.end.1").expect("inner loop end missing");
    let _ = inner_end;
    assert_blocks_terminated(&ir);
}
