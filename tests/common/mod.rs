use golite::codegen::ErrorKind;
use golite::CompileError;

/// Compile source text and return the emitted LLIR module as text.
pub fn compile_ok(source: &str) -> String {
    match golite::compile(source) {
        Ok(module) => module.to_string(),
        Err(err) => panic!("compilation failed: {err}"),
    }
}

/// Compile source text that must fail, returning the codegen error kind.
pub fn compile_err_kind(source: &str) -> ErrorKind {
    match golite::compile(source) {
        Ok(module) => panic!("compilation unexpectedly succeeded:\n{module}"),
        Err(CompileError::Codegen(err)) => err.kind,
        Err(other) => panic!("expected a codegen error, got: {other}"),
    }
}

fn is_terminator(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with("ret ") || line.starts_with("br ") || line == "unreachable"
}

/// Every block of every defined function must end in exactly one terminator,
/// with no instruction following it.
pub fn assert_blocks_terminated(ir: &str) {
    let mut in_function = false;
    let mut block: Vec<&str> = vec![];
    let mut check = |block: &mut Vec<&str>| {
        if block.is_empty() {
            return;
        }
        let terminators = block.iter().filter(|line| is_terminator(line)).count();
        assert_eq!(terminators, 1, "block has {terminators} terminators: {block:?}");
        assert!(
            is_terminator(block.last().unwrap()),
            "block does not end in a terminator: {block:?}"
        );
        block.clear();
    };

    for line in ir.lines() {
        if line.starts_with("define ") {
            in_function = true;
            continue;
        }
        if !in_function {
            continue;
        }
        if line == "}" {
            check(&mut block);
            in_function = false;
        } else if line.ends_with(':') {
            check(&mut block);
        } else if !line.trim().is_empty() {
            block.push(line);
        }
    }
}
