mod common;

use common::{assert_blocks_terminated, compile_ok};

#[test]
fn compile_array_indexing() {
    let src = r#"package p
func main(){
    var a [4]int
    a[0] = 7
    a[1] = a[0] + 1
    i := 2
    a[i] = a[i-1]
}
"#;
    let ir = compile_ok(src);
    assert!(ir.contains("alloca [4 x i32]"));
    assert!(ir.contains("getelementptr [4 x i32], [4 x i32]* %"));
    assert_blocks_terminated(&ir);
}

#[test]
fn compile_array_literal_with_keys() {
    let src = r#"package p
func main(){
    a := [4]int{1, 2: 7, 9}
    _ = a
}
"#;
    let ir = compile_ok(src);
    // positional after a keyed element continues from that index
    assert!(ir.contains("store [4 x i32] zeroinitializer"));
    assert!(ir.contains("i32 0, i32 0"));
    assert!(ir.contains("i32 0, i32 2"));
    assert!(ir.contains("i32 0, i32 3"));
    assert_blocks_terminated(&ir);
}

#[test]
fn compile_multidimensional_literal() {
    let src = r#"package p
func main(){
    m := [2][2]int{{1, 2}, {3, 4}}
    _ = m[1][0]
}
"#;
    let ir = compile_ok(src);
    assert!(ir.contains("alloca [2 x [2 x i32]]"));
    assert!(ir.contains("getelementptr [2 x i32], [2 x i32]* %"));
    assert_blocks_terminated(&ir);
}

#[test]
fn index_through_pointer_to_array() {
    let src = r#"package p
func fill(a *[3]int) {
    a[0] = 1
    (*a)[1] = 2
}
func main(){
    var a [3]int
    fill(&a)
}
"#;
    let ir = compile_ok(src);
    // both spellings load the pointer and index through it
    let fill_at = ir.find("define void @p__fill([3 x i32]* %a)").unwrap();
    let fill_body = &ir[fill_at..ir[fill_at..].find("\n}").unwrap() + fill_at];
    assert_eq!(fill_body.matches("load [3 x i32]*, [3 x i32]** %").count(), 2);
    assert_blocks_terminated(&ir);
}
