mod common;

use common::{assert_blocks_terminated, compile_ok};

const SRC: &str = "package p; func main(){}";

#[test]
fn compile_empty_main() {
    let ir = compile_ok(SRC);

    assert!(ir.contains("define void @p__main()"));
    assert!(ir.contains("define void @p_init()"));
    assert!(ir.contains("define void @p_cleanup()"));
    assert!(ir.contains("define i32 @main()"));

    // main calls init, the user main and cleanup, then returns zero
    let main_at = ir.find("define i32 @main()").unwrap();
    let wrapper = &ir[main_at..];
    let init_at = wrapper.find("call void @p_init()").unwrap();
    let user_at = wrapper.find("call void @p__main()").unwrap();
    let cleanup_at = wrapper.find("call void @p_cleanup()").unwrap();
    assert!(init_at < user_at && user_at < cleanup_at);
    assert!(wrapper.contains("ret i32 0"));

    // the init constructor runs the allocator initializer
    assert!(ir.contains("call void @GC_init()"));

    // extern surface
    assert!(ir.contains("declare i8* @GC_malloc(i64 %size)"));
    assert!(ir.contains("declare i32 @printf(i8* %format, ...)"));
    assert!(ir.contains("declare i32 @scanf(i8* %format, ...)"));

    assert_blocks_terminated(&ir);
}
