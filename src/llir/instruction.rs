use std::fmt::Display;

use super::{Type, Value};

/// Integer/float binary opcodes. The operand class decides which are legal;
/// the lowering layer never mixes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    FAdd,
    FSub,
    FMul,
    FDiv,
    And,
    Or,
    Xor,
}

impl Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::SDiv => "sdiv",
            BinOp::UDiv => "udiv",
            BinOp::SRem => "srem",
            BinOp::URem => "urem",
            BinOp::FAdd => "fadd",
            BinOp::FSub => "fsub",
            BinOp::FMul => "fmul",
            BinOp::FDiv => "fdiv",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
        })
    }
}

/// Integer comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IPred {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Ult,
    Ule,
    Ugt,
    Uge,
}

impl Display for IPred {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            IPred::Eq => "eq",
            IPred::Ne => "ne",
            IPred::Slt => "slt",
            IPred::Sle => "sle",
            IPred::Sgt => "sgt",
            IPred::Sge => "sge",
            IPred::Ult => "ult",
            IPred::Ule => "ule",
            IPred::Ugt => "ugt",
            IPred::Uge => "uge",
        })
    }
}

/// Ordered float comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FPred {
    Oeq,
    One,
    Olt,
    Ole,
    Ogt,
    Oge,
}

impl Display for FPred {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FPred::Oeq => "oeq",
            FPred::One => "one",
            FPred::Olt => "olt",
            FPred::Ole => "ole",
            FPred::Ogt => "ogt",
            FPred::Oge => "oge",
        })
    }
}

#[derive(Debug, Clone)]
pub enum Instruction {
    Alloca {
        result: String,
        ty: Type,
    },
    Load {
        result: String,
        ty: Type,
        ptr: Value,
    },
    Store {
        value: Value,
        ptr: Value,
    },
    BinOp {
        result: String,
        op: BinOp,
        lhs: Value,
        rhs: Value,
    },
    ICmp {
        result: String,
        pred: IPred,
        lhs: Value,
        rhs: Value,
    },
    FCmp {
        result: String,
        pred: FPred,
        lhs: Value,
        rhs: Value,
    },
    GetElementPtr {
        result: String,
        base_ty: Type,
        ptr: Value,
        indices: Vec<Value>,
    },
    Call {
        result: Option<String>,
        callee: Value,
        args: Vec<Value>,
    },
    Bitcast {
        result: String,
        value: Value,
        ty: Type,
    },
}

#[derive(Debug, Clone)]
pub enum Terminator {
    Ret(Option<Value>),
    Br(String),
    CondBr(Value, String, String),
}

impl Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::Alloca { result, ty } => write!(f, "%{result} = alloca {ty}"),
            Instruction::Load { result, ty, ptr } => {
                write!(f, "%{result} = load {ty}, {}", ptr.typed())
            }
            Instruction::Store { value, ptr } => {
                write!(f, "store {}, {}", value.typed(), ptr.typed())
            }
            Instruction::BinOp {
                result,
                op,
                lhs,
                rhs,
            } => write!(f, "%{result} = {op} {}, {rhs}", lhs.typed()),
            Instruction::ICmp {
                result,
                pred,
                lhs,
                rhs,
            } => write!(f, "%{result} = icmp {pred} {}, {rhs}", lhs.typed()),
            Instruction::FCmp {
                result,
                pred,
                lhs,
                rhs,
            } => write!(f, "%{result} = fcmp {pred} {}, {rhs}", lhs.typed()),
            Instruction::GetElementPtr {
                result,
                base_ty,
                ptr,
                indices,
            } => {
                write!(f, "%{result} = getelementptr {base_ty}, {}", ptr.typed())?;
                for index in indices {
                    write!(f, ", {}", index.typed())?;
                }
                Ok(())
            }
            Instruction::Call {
                result,
                callee,
                args,
            } => {
                let func_type = callee
                    .callee_type()
                    .expect("call through a non-function value");
                if let Some(result) = result {
                    write!(f, "%{result} = ")?;
                }
                // variadic callees carry their full function type
                if func_type.variadic {
                    write!(f, "call {func_type} {callee}(")?;
                } else {
                    write!(f, "call {} {callee}(", func_type.ret)?;
                }
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&arg.typed())?;
                }
                f.write_str(")")
            }
            Instruction::Bitcast { result, value, ty } => {
                write!(f, "%{result} = bitcast {} to {ty}", value.typed())
            }
        }
    }
}

impl Display for Terminator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Terminator::Ret(None) => f.write_str("ret void"),
            Terminator::Ret(Some(value)) => write!(f, "ret {}", value.typed()),
            Terminator::Br(label) => write!(f, "br label %{label}"),
            Terminator::CondBr(cond, btrue, bfalse) => write!(
                f,
                "br {}, label %{btrue}, label %{bfalse}",
                cond.typed()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llir::FuncType;

    #[test]
    fn test_instruction_rendering() {
        let load = Instruction::Load {
            result: "t0".into(),
            ty: Type::Int(32),
            ptr: Value::Local("x.0".into(), Type::Int(32).ptr()),
        };
        assert_eq!(load.to_string(), "%t0 = load i32, i32* %x.0");

        let add = Instruction::BinOp {
            result: "t1".into(),
            op: BinOp::Add,
            lhs: Value::Local("t0".into(), Type::Int(32)),
            rhs: Value::ConstInt(Type::Int(32), 1),
        };
        assert_eq!(add.to_string(), "%t1 = add i32 %t0, 1");
    }

    #[test]
    fn test_variadic_call_rendering() {
        let printf = Value::Func(
            "printf".into(),
            FuncType {
                ret: Type::Int(32),
                params: vec![Type::Int(8).ptr()],
                variadic: true,
            },
        );
        let call = Instruction::Call {
            result: Some("t2".into()),
            callee: printf,
            args: vec![
                Value::StrPtr {
                    global: "str.0".into(),
                    len: 3,
                },
                Value::ConstInt(Type::Int(32), 7),
            ],
        };
        let text = call.to_string();
        assert!(text.starts_with("%t2 = call i32 (i8*, ...) @printf("));
        assert!(text.contains("i32 7"));
    }

    #[test]
    fn test_terminator_rendering() {
        assert_eq!(Terminator::Ret(None).to_string(), "ret void");
        assert_eq!(
            Terminator::CondBr(
                Value::Local("c".into(), Type::BOOL),
                "btrue.0".into(),
                "bfalse.0".into()
            )
            .to_string(),
            "br i1 %c, label %btrue.0, label %bfalse.0"
        );
    }
}
