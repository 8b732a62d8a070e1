mod common;

use common::{assert_blocks_terminated, compile_ok};

#[test]
fn globals_initialize_in_source_order() {
    let src = r#"package p
var counter = 10
var limit int
const step = 2
func bump() {
    counter = counter + step
}
func main(){
    bump()
    limit = counter
}
"#;
    let ir = compile_ok(src);

    assert!(ir.contains("@p__counter = global i32 0"));
    assert!(ir.contains("@p__limit = global i32 0"));
    assert!(ir.contains("@p__step = global i32 0"));

    // initializers run inside the init constructor, after GC_init
    let init_at = ir.find("define void @p_init()").unwrap();
    let init_body = &ir[init_at..ir[init_at..].find("\n}").unwrap() + init_at];
    let gc_at = init_body.find("call void @GC_init()").unwrap();
    let counter_at = init_body.find("store i32 10, i32* @p__counter").unwrap();
    let step_at = init_body.find("store i32 2, i32* @p__step").unwrap();
    assert!(gc_at < counter_at && counter_at < step_at);

    // function bodies address the globals directly
    let bump_at = ir.find("define void @p__bump()").unwrap();
    let bump_body = &ir[bump_at..ir[bump_at..].find("\n}").unwrap() + bump_at];
    assert!(bump_body.contains("load i32, i32* @p__counter"));
    assert!(bump_body.contains("store i32 %"));

    assert_blocks_terminated(&ir);
}
