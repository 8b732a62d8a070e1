mod common;

use common::{assert_blocks_terminated, compile_ok};

const SRC: &str = "package p; func main(){ defer g(1); defer g(2) } func g(x int){}";

#[test]
fn compile_defer_pair() {
    let ir = compile_ok(SRC);

    // module machinery: node record, per-callee args struct, wrapper thunk
    assert!(ir.contains("%__defer_node = type { void (i8*)*, i8*, %__defer_node* }"));
    assert!(ir.contains("%__df_p__g = type { i32 }"));
    assert!(ir.contains("define void @__df_wrpr_p__g(i8* %args)"));

    let main_at = ir.find("define void @p__main()").unwrap();
    let main_body = &ir[main_at..ir[main_at..].find("\n}").unwrap() + main_at];

    // two pushes: each site allocates a node plus an args blob
    assert_eq!(main_body.matches("call i8* @GC_malloc(i64 24)").count(), 2);
    assert_eq!(main_body.matches("call i8* @GC_malloc(i64 4)").count(), 2);

    // argument capture happens at the defer site
    assert!(main_body.contains("store i32 1, i32* %"));
    assert!(main_body.contains("store i32 2, i32* %"));

    // each push prepends: node.next = old head, then head = node
    assert_eq!(main_body.matches("store void (i8*)* @__df_wrpr_p__g").count(), 2);

    // the flush loop walks the list at the exit point
    assert!(main_body.contains("defer.cond.0:"));
    assert!(main_body.contains("defer.body.0:"));
    assert!(main_body.contains("defer.end.0:"));
    assert!(main_body.contains("icmp eq %__defer_node* %"));

    // the wrapper reloads the captured argument and calls the real callee
    let wrapper_at = ir.find("define void @__df_wrpr_p__g").unwrap();
    let wrapper = &ir[wrapper_at..ir[wrapper_at..].find("\n}").unwrap() + wrapper_at];
    assert!(wrapper.contains("bitcast i8* %args to %__df_p__g*"));
    assert!(wrapper.contains("call void @p__g(i32 %"));

    assert_blocks_terminated(&ir);
}

#[test]
fn defer_flush_only_with_defers() {
    let ir = compile_ok("package p; func f(){}; func main(){ defer g() } func g(){}");
    let f_at = ir.find("define void @p__f()").unwrap();
    let f_body = &ir[f_at..ir[f_at..].find("\n}").unwrap() + f_at];
    assert!(!f_body.contains("defer.cond"));

    let main_at = ir.find("define void @p__main()").unwrap();
    let main_body = &ir[main_at..ir[main_at..].find("\n}").unwrap() + main_at];
    assert!(main_body.contains("defer.cond.0:"));
    assert_blocks_terminated(&ir);
}

#[test]
fn defer_captures_value_at_defer_time() {
    let src = r#"package p
func show(x int){}
func main(){
    v := 1
    defer show(v)
    v = 2
}
"#;
    let ir = compile_ok(src);
    let main_at = ir.find("define void @p__main()").unwrap();
    let main_body = &ir[main_at..ir[main_at..].find("\n}").unwrap() + main_at];

    // the capture loads v before the blob store; the later assignment only
    // touches the variable slot
    let capture_at = main_body.find("call i8* @GC_malloc(i64 4)").unwrap();
    let reassign_at = main_body.find("store i32 2, i32* %v.").unwrap();
    assert!(capture_at < reassign_at);
    assert_blocks_terminated(&ir);
}
