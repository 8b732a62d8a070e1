mod common;

use common::{assert_blocks_terminated, compile_ok};

#[test]
fn identical_literals_share_one_global() {
    let src = r#"package p
func main(){
    printf("hello\n")
    printf("hello\n")
    printf("bye\n")
}
"#;
    let ir = compile_ok(src);

    assert_eq!(ir.matches("@str.0 = global").count(), 1);
    assert_eq!(ir.matches("@str.1 = global").count(), 1);
    assert!(!ir.contains("@str.2 = global"));

    // decoded, NUL-terminated payloads
    assert!(ir.contains("c\"hello\\0A\\00\""));
    assert!(ir.contains("c\"bye\\0A\\00\""));

    // call sites take the first-element address as i8*
    assert!(ir.contains(
        "call i32 (i8*, ...) @printf(i8* getelementptr inbounds ([7 x i8], [7 x i8]* @str.0, i32 0, i32 0))"
    ));

    assert_blocks_terminated(&ir);
}

#[test]
fn printf_resolves_through_fmt_alias() {
    let src = r#"package p
import "fmt"
func main(){
    fmt.Printf("x %d\n", 3)
}
"#;
    let ir = compile_ok(src);
    assert!(ir.contains("call i32 (i8*, ...) @printf(i8* getelementptr"));
    assert!(ir.contains("i32 3)"));
    assert_blocks_terminated(&ir);
}

#[test]
fn string_variable_roundtrip() {
    let src = r#"package p
func main(){
    s := "min of 3, 4, 5 is %f\n"
    printf(s, 3.0)
}
"#;
    let ir = compile_ok(src);
    // the literal lands in a slot and is reloaded for the call
    assert!(ir.contains("= alloca i8*"));
    assert!(ir.contains("call i32 (i8*, ...) @printf(i8* %"));
    assert!(ir.contains("double 3.0"));
    assert_blocks_terminated(&ir);
}
