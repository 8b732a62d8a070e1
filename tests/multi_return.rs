mod common;

use common::{assert_blocks_terminated, compile_ok};

const SRC: &str = "package p; func safeDivide(x,y int)(int,bool){ if y==0 {return 0,false}; return x/y,true } func main(){ _,_ = safeDivide(10,2) }";

#[test]
fn compile_multi_return() {
    let ir = compile_ok(SRC);

    // k > 1 results: void return plus leading out-parameters in order
    assert!(
        ir.contains(
            "define void @p__safeDivide(i32* %safeDivide__ret_0, i1* %safeDivide__ret_1, i32 %x, i32 %y)"
        ),
        "unexpected signature:\n{ir}"
    );

    // every return site writes the out-parameters before the void return
    let f_at = ir.find("define void @p__safeDivide").unwrap();
    let f_end = ir[f_at..].find("\n}").unwrap() + f_at;
    let body = &ir[f_at..f_end];
    assert_eq!(body.matches("ret void").count(), 2);
    assert!(body.contains("store i32 0, i32* %safeDivide__ret_0"));
    assert!(body.contains("store i1 0, i1* %safeDivide__ret_1"));
    assert!(body.contains("sdiv i32"));

    // the call site allocates two locals, passes their addresses and loads
    // the results back
    let main_at = ir.find("define void @p__main").unwrap();
    let main_body = &ir[main_at..ir[main_at..].find("\n}").unwrap() + main_at];
    assert!(main_body.contains("= alloca i32"));
    assert!(main_body.contains("= alloca i1"));
    assert!(main_body.contains("call void @p__safeDivide(i32* %"));
    assert!(main_body.contains("= load i32, i32* %"));
    assert!(main_body.contains("= load i1, i1* %"));

    assert_blocks_terminated(&ir);
}
