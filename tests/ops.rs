mod common;

use common::{assert_blocks_terminated, compile_ok};

#[test]
fn signed_and_float_operator_selection() {
    let src = r#"package p
func main(){
    a := 7
    b := a / 2
    c := a % 3
    _ = b
    _ = c
    x := 1.5
    y := x * 2.0
    z := x / y
    _ = z
    ok := x < y
    _ = ok
}
"#;
    let ir = compile_ok(src);
    assert!(ir.contains("sdiv i32"));
    assert!(ir.contains("srem i32"));
    assert!(ir.contains("fmul double"));
    assert!(ir.contains("fdiv double"));
    assert!(ir.contains("fcmp olt double"));
    assert_blocks_terminated(&ir);
}

#[test]
fn unsigned_operator_selection() {
    let src = r#"package p
func main(){
    var a uint = 7
    var b uint = 2
    q := a / b
    r := a % b
    small := a < b
    _ = q
    _ = r
    _ = small
}
"#;
    let ir = compile_ok(src);
    assert!(ir.contains("udiv i32"));
    assert!(ir.contains("urem i32"));
    assert!(ir.contains("icmp ult i32"));
    assert_blocks_terminated(&ir);
}

#[test]
fn logical_operators_evaluate_eagerly() {
    let src = r#"package p
func check(a, b bool) bool {
    return a && b || !a
}
func main(){}
"#;
    let ir = compile_ok(src);
    // no extra control flow: a single block with and/or/xor
    let f_at = ir.find("define i1 @p__check").unwrap();
    let body = &ir[f_at..ir[f_at..].find("\n}").unwrap() + f_at];
    assert!(body.contains("and i1"));
    assert!(body.contains("or i1"));
    assert!(body.contains("xor i1"));
    assert!(!body.contains("br "));
    assert_blocks_terminated(&ir);
}

#[test]
fn unary_minus_and_not() {
    let src = r#"package p
func main(){
    a := 5
    b := -a
    ok := !(a < b)
    _ = b
    _ = ok
}
"#;
    let ir = compile_ok(src);
    assert!(ir.contains("sub i32 0, %"));
    assert!(ir.contains("xor i1 %"));
    assert_blocks_terminated(&ir);
}

#[test]
fn pointer_nil_comparison() {
    let src = r#"package p
type N struct{ Next *N; Value int }
func empty(n *N) bool {
    return n == nil
}
func main(){}
"#;
    let ir = compile_ok(src);
    assert!(ir.contains("icmp eq %N* %"));
    assert!(ir.contains("null"));
    assert_blocks_terminated(&ir);
}

#[test]
fn hex_literals_are_signed_i32() {
    let ir = compile_ok("package p; func main(){ x := 0x2A; _ = x }");
    assert!(ir.contains("store i32 42, i32* %x."));
    assert_blocks_terminated(&ir);
}
