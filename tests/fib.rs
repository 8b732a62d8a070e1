mod common;

use common::{assert_blocks_terminated, compile_ok};

const SRC: &str = r#"package p
func f(n int) int {
    if n <= 1 {
        return n
    } else {
        return f(n-1) + f(n-2)
    }
}
func main(){}
"#;

#[test]
fn compile_recursive_fibonacci() {
    let ir = compile_ok(SRC);

    let f_at = ir.find("define i32 @p__f(i32 %n)").expect("p__f missing");
    let f_end = ir[f_at..].find("\n}").unwrap() + f_at;
    let body = &ir[f_at..f_end];

    // exactly two return sites
    let rets = body.matches("ret i32").count();
    assert_eq!(rets, 2, "expected two return sites:\n{body}");

    // two recursive calls feeding one addition
    let calls = body.matches("call i32 @p__f(").count();
    assert_eq!(calls, 2);
    assert!(body.contains("icmp sle i32"));
    assert!(body.contains("btrue.0:"));
    assert!(body.contains("bfalse.0:"));
    // both branches return, so no join block is materialized
    assert!(!body.contains("bend.0:"));

    assert_blocks_terminated(&ir);
}
