//! The low-level IR emitted by the compiler.
//!
//! A [Module] owns type definitions, globals and functions; functions own
//! their basic blocks, blocks own instructions plus at most one terminator.
//! Everything prints as a textual LLVM module via [Display].
mod instruction;
mod types;
mod value;

pub use instruction::*;
pub use types::*;
pub use value::*;

use std::fmt::Display;

#[derive(Debug, Default)]
pub struct Module {
    pub typedefs: Vec<StructRef>,
    pub globals: Vec<Global>,
    pub declares: Vec<Function>,
    pub defines: Vec<Function>,
}

#[derive(Debug, Clone)]
pub struct Global {
    pub name: String,
    pub ty: Type,
    pub init: GlobalInit,
}

#[derive(Debug, Clone)]
pub enum GlobalInit {
    Zero,
    /// NUL-terminated byte payload of an interned string literal.
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub ret: Type,
    pub params: Vec<Param>,
    pub variadic: bool,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Default)]
pub struct Block {
    pub label: String,
    pub insts: Vec<Instruction>,
    pub term: Option<Terminator>,
}

impl Function {
    pub fn func_type(&self) -> FuncType {
        FuncType {
            ret: self.ret.clone(),
            params: self.params.iter().map(|param| param.ty.clone()).collect(),
            variadic: self.variadic,
        }
    }

    /// The value naming this function at call sites and in stores.
    pub fn reference(&self) -> Value {
        Value::Func(self.name.clone(), self.func_type())
    }
}

impl Block {
    pub fn new(label: impl ToString) -> Self {
        Block {
            label: label.to_string(),
            insts: vec![],
            term: None,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.term.is_some()
    }

    pub fn push(&mut self, inst: Instruction) {
        debug_assert!(self.term.is_none(), "instruction appended after terminator");
        self.insts.push(inst);
    }

    /// Set the terminator unless one is already present.
    pub fn terminate(&mut self, term: Terminator) {
        if self.term.is_none() {
            self.term = Some(term);
        }
    }
}

/// LLVM string escaping for `c"..."` byte arrays.
fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::new();
    for &b in bytes {
        match b {
            b'"' | b'\\' => out.push_str(&format!("\\{b:02X}")),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\{b:02X}")),
        }
    }
    out
}

impl Display for Global {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.init {
            GlobalInit::Zero => write!(f, "@{} = global {} {}", self.name, self.ty, Value::zero(&self.ty)),
            GlobalInit::Bytes(bytes) => write!(
                f,
                "@{} = global [{} x i8] c\"{}\"",
                self.name,
                bytes.len(),
                escape_bytes(bytes)
            ),
        }
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keyword = if self.blocks.is_empty() {
            "declare"
        } else {
            "define"
        };
        write!(f, "{keyword} {} @{}(", self.ret, self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", param.ty)?;
            if !param.name.is_empty() {
                write!(f, " %{}", param.name)?;
            }
        }
        if self.variadic {
            if !self.params.is_empty() {
                f.write_str(", ")?;
            }
            f.write_str("...")?;
        }
        f.write_str(")")?;

        if self.blocks.is_empty() {
            return f.write_str("\n");
        }

        f.write_str(" {\n")?;
        for block in &self.blocks {
            block.fmt(f)?;
        }
        f.write_str("}\n")
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}:", self.label)?;
        for inst in &self.insts {
            writeln!(f, "  {inst}")?;
        }
        match &self.term {
            Some(term) => writeln!(f, "  {term}"),
            // unreachable filler; the backend may drop the block entirely
            None => writeln!(f, "  unreachable"),
        }
    }
}

impl Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for def in &self.typedefs {
            write!(f, "%{} = type {{", def.name)?;
            let fields = def.fields.borrow();
            for (i, field) in fields.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, " {}", field.ty)?;
            }
            if fields.is_empty() {
                f.write_str("}\n")?;
            } else {
                f.write_str(" }\n")?;
            }
        }
        if !self.typedefs.is_empty() {
            f.write_str("\n")?;
        }

        for global in &self.globals {
            writeln!(f, "{global}")?;
        }
        if !self.globals.is_empty() {
            f.write_str("\n")?;
        }

        for declare in &self.declares {
            declare.fmt(f)?;
        }
        if !self.declares.is_empty() {
            f.write_str("\n")?;
        }

        for (i, define) in self.defines.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            define.fmt(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_string_rendering() {
        let global = Global {
            name: "str.0".into(),
            ty: Type::Array(4, Box::new(Type::Int(8))),
            init: GlobalInit::Bytes(b"hi\n\0".to_vec()),
        };
        assert_eq!(
            global.to_string(),
            "@str.0 = global [4 x i8] c\"hi\\0A\\00\""
        );
    }

    #[test]
    fn test_declare_rendering() {
        let printf = Function {
            name: "printf".into(),
            ret: Type::Int(32),
            params: vec![Param {
                name: "format".into(),
                ty: Type::Int(8).ptr(),
            }],
            variadic: true,
            blocks: vec![],
        };
        assert_eq!(
            printf.to_string(),
            "declare i32 @printf(i8* %format, ...)\n"
        );
    }

    #[test]
    fn test_define_rendering() {
        let mut entry = Block::new("entry");
        entry.terminate(Terminator::Ret(Some(Value::ConstInt(Type::Int(32), 0))));
        let main = Function {
            name: "main".into(),
            ret: Type::Int(32),
            params: vec![],
            variadic: false,
            blocks: vec![entry],
        };
        assert_eq!(
            main.to_string(),
            "define i32 @main() {\nentry:\n  ret i32 0\n}\n"
        );
    }

    #[test]
    fn test_terminate_keeps_first() {
        let mut block = Block::new("b");
        block.terminate(Terminator::Br("x".into()));
        block.terminate(Terminator::Br("y".into()));
        assert!(matches!(block.term, Some(Terminator::Br(ref label)) if label == "x"));
    }
}
