use super::Position;

/// A syntactic type expression. Parenthesized types are unwrapped during
/// parsing, so no variant exists for them.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Name(TypeName),
    Pointer(PointerType),
    Array(ArrayType),
    Struct(StructType),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeName {
    pub name: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointerType {
    pub pointee: Box<TypeExpr>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayType {
    pub length: i64,
    pub element: Box<TypeExpr>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructType {
    pub fields: Vec<FieldDecl>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub names: Vec<String>,
    pub ty: TypeExpr,
    pub position: Position,
}

impl TypeExpr {
    pub fn position(&self) -> Position {
        match self {
            TypeExpr::Name(TypeName { position, .. })
            | TypeExpr::Pointer(PointerType { position, .. })
            | TypeExpr::Array(ArrayType { position, .. })
            | TypeExpr::Struct(StructType { position, .. }) => *position,
        }
    }
}
