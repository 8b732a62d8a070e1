mod common;

use common::{assert_blocks_terminated, compile_ok};

#[test]
fn compile_backward_goto() {
    let src = r#"package p
func f(n int) int {
    s := 0
top:
    s += n
    n--
    if n > 0 {
        goto top
    }
    return s
}
func main(){}
"#;
    let ir = compile_ok(src);
    assert!(ir.contains("label.top:"));
    assert!(ir.contains("br label %label.top"));
    assert_blocks_terminated(&ir);
}

#[test]
fn compile_forward_goto() {
    let src = r#"package p
func f(n int) int {
    if n == 0 {
        goto done
    }
    n = 7
done:
    return n
}
func main(){}
"#;
    let ir = compile_ok(src);
    // the goto ran ahead of the definition, so the block keeps its
    // forward-reference label
    assert!(ir.contains("label.forward.done:"));
    assert!(ir.contains("br label %label.forward.done"));
    assert_blocks_terminated(&ir);
}

#[test]
fn statements_after_goto_are_unreachable() {
    let src = r#"package p
func f() int {
loop:
    goto loop
    return 1
}
func main(){}
"#;
    let ir = compile_ok(src);
    assert!(ir.contains("dead."));
    assert_blocks_terminated(&ir);
}
