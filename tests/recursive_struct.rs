mod common;

use common::{assert_blocks_terminated, compile_ok};

const SRC: &str = "package p; type N struct{ Next *N; Value int }; func main(){}";

#[test]
fn compile_recursive_struct() {
    let ir = compile_ok(SRC);

    // pointer-to-self as the first field
    assert!(ir.contains("%N = type { %N*, i32 }"), "missing type def:\n{ir}");

    // the type-def list carries exactly one entry for N
    assert_eq!(ir.matches("%N = type").count(), 1);

    assert_blocks_terminated(&ir);
}

#[test]
fn compile_struct_usage() {
    let src = r#"package p
type N struct{ Next *N; Value int }
func main(){
    n := N{Value: 3}
    n.Next = nil
    m := n.Value
    _ = m
}
"#;
    let ir = compile_ok(src);
    assert!(ir.contains("store %N zeroinitializer"));
    assert!(ir.contains("getelementptr %N, %N* %"));
    // nil adopts the field's declared pointer type
    assert!(ir.contains("store %N* null, %N** %"));
    assert_blocks_terminated(&ir);
}
