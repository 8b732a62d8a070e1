use std::fmt::Display;

use super::{FuncType, Type};

/// An SSA value: either a named register/global or a constant. Every value
/// knows its type, so operand positions can render `ty repr` pairs.
#[derive(Debug, Clone)]
pub enum Value {
    /// `%name`
    Local(String, Type),
    /// `@name`, typed as a pointer to the pointee the global holds.
    Global(String, Type),
    /// `@name` of a declared or defined function; typed `fnty*`.
    Func(String, FuncType),
    ConstInt(Type, i64),
    ConstFloat(Type, f64),
    /// Typed null pointer; the type is the pointer type itself.
    Null(Type),
    /// `zeroinitializer` for aggregate types.
    ZeroAggregate(Type),
    /// Address of the first byte of an interned string global: a constant
    /// `getelementptr` yielding `i8*`.
    StrPtr { global: String, len: u64 },
    /// An import alias during name resolution; never reaches the module.
    ModuleRef(String),
}

impl Value {
    pub fn ty(&self) -> Type {
        match self {
            Value::Local(_, ty) => ty.clone(),
            Value::Global(_, pointee) => pointee.clone().ptr(),
            Value::Func(_, func_type) => Type::Func(Box::new(func_type.clone())).ptr(),
            Value::ConstInt(ty, _) => ty.clone(),
            Value::ConstFloat(ty, _) => ty.clone(),
            Value::Null(ty) => ty.clone(),
            Value::ZeroAggregate(ty) => ty.clone(),
            Value::StrPtr { .. } => Type::Int(8).ptr(),
            Value::ModuleRef(name) => Type::Module(name.clone()),
        }
    }

    /// The zero value used for implicit initialization.
    pub fn zero(ty: &Type) -> Value {
        match ty {
            Type::Int(_) | Type::Uint(_) => Value::ConstInt(ty.clone(), 0),
            Type::F32 | Type::F64 => Value::ConstFloat(ty.clone(), 0.0),
            Type::Ptr(_) => Value::Null(ty.clone()),
            _ => Value::ZeroAggregate(ty.clone()),
        }
    }

    /// The function type behind a direct or indirect callee.
    pub fn callee_type(&self) -> Option<FuncType> {
        match self {
            Value::Func(_, func_type) => Some(func_type.clone()),
            Value::Local(_, Type::Ptr(inner)) => match inner.as_ref() {
                Type::Func(func_type) => Some(*func_type.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Operand rendering with the leading type, e.g. `i32 %t0`.
    pub fn typed(&self) -> String {
        format!("{} {}", self.ty(), self)
    }
}

/// Render a float the LLVM assembler accepts: plain decimal for integral
/// values, the raw IEEE-754 bit pattern otherwise.
pub fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        format!("0x{:016X}", value.to_bits())
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Local(name, _) => write!(f, "%{name}"),
            Value::Global(name, _) => write!(f, "@{name}"),
            Value::Func(name, _) => write!(f, "@{name}"),
            Value::ConstInt(_, value) => write!(f, "{value}"),
            Value::ConstFloat(_, value) => f.write_str(&format_float(*value)),
            Value::Null(_) => f.write_str("null"),
            Value::ZeroAggregate(_) => f.write_str("zeroinitializer"),
            Value::StrPtr { global, len } => write!(
                f,
                "getelementptr inbounds ([{len} x i8], [{len} x i8]* @{global}, i32 0, i32 0)"
            ),
            Value::ModuleRef(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operand_rendering() {
        let v = Value::Local("t0".into(), Type::Int(32));
        assert_eq!(v.typed(), "i32 %t0");
        assert_eq!(Value::ConstInt(Type::Int(32), 42).typed(), "i32 42");
        assert_eq!(Value::Null(Type::Int(32).ptr()).typed(), "i32* null");
    }

    #[test]
    fn test_float_format() {
        assert_eq!(format_float(4.0), "4.0");
        assert_eq!(format_float(0.5), format!("0x{:016X}", 0.5f64.to_bits()));
    }

    #[test]
    fn test_string_pointer() {
        let v = Value::StrPtr {
            global: "str.0".into(),
            len: 6,
        };
        assert_eq!(v.ty(), Type::Int(8).ptr());
        assert_eq!(
            v.to_string(),
            "getelementptr inbounds ([6 x i8], [6 x i8]* @str.0, i32 0, i32 0)"
        );
    }
}
