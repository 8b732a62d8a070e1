mod common;

use common::compile_err_kind;
use golite::codegen::ErrorKind;

#[test]
fn undefined_name() {
    let kind = compile_err_kind("package p; func main(){ x := y }");
    assert_eq!(kind, ErrorKind::UndefinedName);
}

#[test]
fn non_bool_condition() {
    let kind = compile_err_kind("package p; func main(){ if 3 { } }");
    assert_eq!(kind, ErrorKind::TypeMismatch);
}

#[test]
fn short_decl_arity() {
    let kind = compile_err_kind("package p; func f() int { return 1 } func main(){ a, b := f(); _ = a; _ = b }");
    assert_eq!(kind, ErrorKind::ArityMismatch);
}

#[test]
fn undefined_label() {
    let kind = compile_err_kind("package p; func main(){ goto L }");
    assert_eq!(kind, ErrorKind::UndefinedLabel);
}

#[test]
fn duplicate_label() {
    let kind = compile_err_kind("package p; func main(){ L: x := 1; _ = x; L: goto L }");
    assert_eq!(kind, ErrorKind::DuplicateLabel);
}

#[test]
fn missing_main() {
    let kind = compile_err_kind("package p; func helper(){}");
    assert_eq!(kind, ErrorKind::MissingMain);
}

#[test]
fn missing_return() {
    let kind = compile_err_kind("package p; func f() int { x := 1; _ = x } func main(){}");
    assert_eq!(kind, ErrorKind::MissingReturn);
}

#[test]
fn bad_return_arity() {
    let kind = compile_err_kind("package p; func f() (int, int) { return 1 } func main(){}");
    assert_eq!(kind, ErrorKind::BadReturn);
}

#[test]
fn mixed_width_arithmetic_is_diagnosed() {
    let kind = compile_err_kind(
        "package p; func main(){ var a int32 = 1; var b int64 = 2; var c int64 = 0; c = a + b; _ = c }",
    );
    assert_eq!(kind, ErrorKind::TypeMismatch);
}

#[test]
fn unknown_type() {
    let kind = compile_err_kind("package p; func f(x strange) {} func main(){}");
    assert_eq!(kind, ErrorKind::UnknownType);
}

#[test]
fn duplicate_type() {
    let kind = compile_err_kind("package p; type T int; type T int; func main(){}");
    assert_eq!(kind, ErrorKind::DuplicateType);
}

#[test]
fn duplicate_symbol_in_scope() {
    let kind = compile_err_kind("package p; func main(){ x := 1; x := 2; _ = x }");
    assert_eq!(kind, ErrorKind::DuplicateSymbol);
}

#[test]
fn assign_to_rvalue() {
    let kind = compile_err_kind("package p; func main(){ 3 = 4 }");
    assert_eq!(kind, ErrorKind::InvalidLValue);
}

#[test]
fn duplicate_composite_key() {
    let kind = compile_err_kind(
        "package p; type T struct { a int; b int }; func main(){ t := T{a: 1, a: 2}; _ = t }",
    );
    assert_eq!(kind, ErrorKind::InvalidComposite);
}

#[test]
fn array_index_out_of_bounds() {
    let kind = compile_err_kind("package p; func main(){ a := [2]int{5: 1}; _ = a }");
    assert_eq!(kind, ErrorKind::InvalidComposite);
}

#[test]
fn range_loop_unimplemented() {
    let kind = compile_err_kind("package p; func main(){ for i := range 10 { _ = i } }");
    assert_eq!(kind, ErrorKind::Unimplemented);
}

#[test]
fn method_call_unimplemented() {
    let kind = compile_err_kind(
        "package p; type T struct { x int }; func (t *T) get() int { return 0 } func main(){ var t *T; _ = t.get() }",
    );
    assert_eq!(kind, ErrorKind::Unimplemented);
}

#[test]
fn type_conversion_unimplemented() {
    let kind = compile_err_kind("package p; func main(){ x := int64(3); _ = x }");
    assert_eq!(kind, ErrorKind::Unimplemented);
}
