use super::{Position, TypeExpr};

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Unary(UnaryExpr),
    Binary(BinaryExpr),
    Call(CallExpr),
    Index(IndexExpr),
    Selector(SelectorExpr),
    Ident(Ident),
    IntLit(IntLit),
    FloatLit(FloatLit),
    StringLit(StringLit),
    BoolLit(BoolLit),
    NilLit(NilLit),
    Composite(CompositeLit),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
    AddressOf,
    Deref,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    LogicalAnd,
    LogicalOr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub operand: Box<Expression>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub lhs: Box<Expression>,
    pub rhs: Box<Expression>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub callee: Box<Expression>,
    pub args: Vec<Expression>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexExpr {
    pub base: Box<Expression>,
    pub index: Box<Expression>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectorExpr {
    pub base: Box<Expression>,
    pub field: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntLit {
    pub value: i64,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FloatLit {
    pub value: f64,
    pub position: Position,
}

/// A string literal; `value` is the raw source text between the quotes with
/// escape sequences still encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct StringLit {
    pub value: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoolLit {
    pub value: bool,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NilLit {
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositeLit {
    pub ty: TypeExpr,
    pub elements: Vec<KeyedElement>,
    pub position: Position,
}

/// One element of a composite literal, optionally keyed by a field name or an
/// array index expression.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedElement {
    pub key: Option<Expression>,
    pub value: ElementValue,
    pub position: Position,
}

/// The value of a composite-literal element: a plain expression or a nested
/// brace-delimited literal value (which inherits its type from the parent).
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    Expr(Expression),
    Literal(Vec<KeyedElement>, Position),
}

impl Expression {
    pub fn position(&self) -> Position {
        match self {
            Expression::Unary(UnaryExpr { position, .. })
            | Expression::Binary(BinaryExpr { position, .. })
            | Expression::Call(CallExpr { position, .. })
            | Expression::Index(IndexExpr { position, .. })
            | Expression::Selector(SelectorExpr { position, .. })
            | Expression::Ident(Ident { position, .. })
            | Expression::IntLit(IntLit { position, .. })
            | Expression::FloatLit(FloatLit { position, .. })
            | Expression::StringLit(StringLit { position, .. })
            | Expression::BoolLit(BoolLit { position, .. })
            | Expression::NilLit(NilLit { position })
            | Expression::Composite(CompositeLit { position, .. }) => *position,
        }
    }
}
