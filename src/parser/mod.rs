//! Parser for GoLite.
//!
//! A plain recursive descent over the token cursor, producing the parse tree
//! consumed by the code generator. Composite literals are suppressed while an
//! `if` or `for` header is being parsed, mirroring how Go resolves the `T{`
//! ambiguity against the opening brace of the body.
use std::{error::Error, fmt::Display};

use crate::ast::*;
use crate::lexer::{Token, Tokens};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub position: Option<Position>,
}

impl ParseError {
    pub fn eof(item: &str) -> ParseError {
        ParseError {
            message: format!("hit EOF while parsing {item}"),
            position: None,
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some((line, col)) = self.position {
            write!(f, "{} ({line}:{col})", self.message)
        } else {
            f.write_str(&self.message)
        }
    }
}

impl Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

/// Shorthand for a position-less terminal, used with [Parser::expect] and
/// peeking (token equality ignores positions).
macro_rules! t {
    ($name:ident) => {
        Token::$name { position: (0, 0) }
    };
}

pub fn parse(tokens: Vec<Token>) -> ParseResult<SourceFile> {
    Parser::new(tokens).parse_source_file()
}

pub struct Parser {
    tokens: Tokens<Token>,
    /// Whether `ident {` may start a composite literal in the current
    /// context. Cleared inside `if`/`for` headers, restored inside any
    /// parenthesized or bracketed subexpression.
    allow_composite: bool,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens: tokens.into(),
            allow_composite: true,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.peek()
    }

    fn peek_is(&self, expected: &Token) -> bool {
        self.peek().map(|token| token == expected).unwrap_or(false)
    }

    fn next(&mut self) -> Option<Token> {
        self.tokens.next()
    }

    fn expect(&mut self, expected: Token) -> ParseResult<Position> {
        match self.tokens.next() {
            Some(token) if token == expected => Ok(token.position()),
            Some(token) => Err(ParseError {
                message: format!("expected {expected}, found {token}"),
                position: Some(token.position()),
            }),
            None => Err(ParseError::eof(&format!("{expected}"))),
        }
    }

    fn expect_ident(&mut self) -> ParseResult<(String, Position)> {
        match self.tokens.next() {
            Some(Token::Id { value, position }) => Ok((value, position)),
            Some(token) => Err(ParseError {
                message: format!("expected identifier, found {token}"),
                position: Some(token.position()),
            }),
            None => Err(ParseError::eof("identifier")),
        }
    }

    fn error_here(&self, message: impl ToString) -> ParseError {
        ParseError {
            message: message.to_string(),
            position: self.peek().map(Token::position),
        }
    }

    fn skip_semicolons(&mut self) {
        while self.peek_is(&t!(Semicolon)) {
            self.next();
        }
    }

    /// Expect a statement terminator: a (possibly inserted) semicolon, or a
    /// closing brace left in place for the caller.
    fn expect_terminator(&mut self) -> ParseResult<()> {
        match self.peek() {
            Some(Token::Semicolon { .. }) => {
                self.next();
                Ok(())
            }
            Some(Token::RBrace { .. }) | None => Ok(()),
            Some(token) => Err(ParseError {
                message: format!("expected ';', found {token}"),
                position: Some(token.position()),
            }),
        }
    }

    // ------------------------------------------------------------------
    // source file
    // ------------------------------------------------------------------

    pub fn parse_source_file(&mut self) -> ParseResult<SourceFile> {
        self.skip_semicolons();

        let position = self.expect(t!(Package))?;
        let (name, _) = self.expect_ident()?;
        self.expect_terminator()?;
        let package = PackageClause { name, position };

        let mut imports = vec![];
        loop {
            self.skip_semicolons();
            if !self.peek_is(&t!(Import)) {
                break;
            }
            self.parse_import_decl(&mut imports)?;
        }

        let mut decls = vec![];
        loop {
            self.skip_semicolons();
            let Some(token) = self.peek() else {
                break;
            };
            match token {
                Token::Func { .. } => decls.push(self.parse_func_decl()?),
                Token::Var { .. } | Token::Const { .. } | Token::Type { .. } => {
                    let declaration = self.parse_declaration()?;
                    self.expect_terminator()?;
                    decls.push(TopLevelDecl::Declaration(declaration));
                }
                other => {
                    return Err(ParseError {
                        message: format!("expected declaration, found {other}"),
                        position: Some(other.position()),
                    })
                }
            }
        }

        Ok(SourceFile {
            package,
            imports,
            decls,
        })
    }

    fn parse_import_decl(&mut self, imports: &mut Vec<ImportSpec>) -> ParseResult<()> {
        self.expect(t!(Import))?;
        if self.peek_is(&t!(LParen)) {
            self.next();
            loop {
                self.skip_semicolons();
                if self.peek_is(&t!(RParen)) {
                    self.next();
                    break;
                }
                imports.push(self.parse_import_spec()?);
            }
        } else {
            imports.push(self.parse_import_spec()?);
        }
        self.expect_terminator()
    }

    fn parse_import_spec(&mut self) -> ParseResult<ImportSpec> {
        let alias = match self.peek() {
            Some(Token::Id { .. }) => {
                let (name, _) = self.expect_ident()?;
                Some(name)
            }
            _ => None,
        };
        match self.next() {
            Some(Token::Str { value, position }) => Ok(ImportSpec {
                path: value,
                alias,
                position,
            }),
            Some(token) => Err(ParseError {
                message: format!("expected import path, found {token}"),
                position: Some(token.position()),
            }),
            None => Err(ParseError::eof("import spec")),
        }
    }

    // ------------------------------------------------------------------
    // declarations
    // ------------------------------------------------------------------

    fn parse_func_decl(&mut self) -> ParseResult<TopLevelDecl> {
        let position = self.expect(t!(Func))?;

        // a parenthesized receiver makes this a method declaration
        let receiver = if self.peek_is(&t!(LParen)) {
            self.next();
            let (name, name_position) = self.expect_ident()?;
            // either `(T)` or `(name T)`
            let receiver = if self.peek_is(&t!(RParen)) {
                Param {
                    name: String::new(),
                    ty: TypeExpr::Name(TypeName {
                        name,
                        position: name_position,
                    }),
                    position: name_position,
                }
            } else {
                Param {
                    name,
                    ty: self.parse_type()?,
                    position: name_position,
                }
            };
            self.expect(t!(RParen))?;
            Some(receiver)
        } else {
            None
        };

        let (name, _) = self.expect_ident()?;
        let signature = self.parse_signature()?;
        let body = self.parse_block()?;
        // the separator before the next top-level declaration is optional
        if self.peek_is(&t!(Semicolon)) {
            self.next();
        }

        Ok(match receiver {
            Some(receiver) => TopLevelDecl::Method(MethodDef {
                receiver,
                name,
                signature,
                body,
                position,
            }),
            None => TopLevelDecl::Function(FunctionDef {
                name,
                signature,
                body,
                position,
            }),
        })
    }

    fn parse_signature(&mut self) -> ParseResult<Signature> {
        self.expect(t!(LParen))?;

        let mut params = vec![];
        if !self.peek_is(&t!(RParen)) {
            loop {
                // one parameter group: `a, b int`
                let mut names = vec![self.expect_ident()?];
                while self.peek_is(&t!(Comma)) {
                    self.next();
                    names.push(self.expect_ident()?);
                }
                let ty = self.parse_type()?;
                for (name, position) in names {
                    params.push(Param {
                        name,
                        ty: ty.clone(),
                        position,
                    });
                }
                if self.peek_is(&t!(Comma)) {
                    self.next();
                } else {
                    break;
                }
            }
        }
        self.expect(t!(RParen))?;

        let results = self.parse_results()?;

        Ok(Signature { params, results })
    }

    fn parse_results(&mut self) -> ParseResult<Vec<ResultParam>> {
        let mut results = vec![];
        match self.peek() {
            Some(Token::LBrace { .. }) | Some(Token::Semicolon { .. }) | None => {}
            Some(Token::LParen { .. }) => {
                self.next();
                if !self.peek_is(&t!(RParen)) {
                    loop {
                        // `name T` when an identifier is directly followed by
                        // the start of a type, plain `T` otherwise
                        let named = matches!(self.peek(), Some(Token::Id { .. }))
                            && matches!(
                                self.tokens.peek_ahead(1),
                                Some(Token::Id { .. })
                                    | Some(Token::Star { .. })
                                    | Some(Token::LBracket { .. })
                                    | Some(Token::Struct { .. })
                            );
                        let (name, position) = if named {
                            self.expect_ident()?
                        } else {
                            (
                                String::new(),
                                self.peek().map(Token::position).unwrap_or((0, 0)),
                            )
                        };
                        let ty = self.parse_type()?;
                        results.push(ResultParam { name, ty, position });
                        if self.peek_is(&t!(Comma)) {
                            self.next();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(t!(RParen))?;
            }
            _ => {
                let ty = self.parse_type()?;
                let position = ty.position();
                results.push(ResultParam {
                    name: String::new(),
                    ty,
                    position,
                });
            }
        }
        Ok(results)
    }

    fn parse_declaration(&mut self) -> ParseResult<Declaration> {
        match self.peek() {
            Some(Token::Var { .. }) => {
                self.next();
                let mut specs = vec![];
                self.parse_spec_group(|parser| {
                    let spec = parser.parse_var_spec()?;
                    specs.push(spec);
                    Ok(())
                })?;
                Ok(Declaration::Var(specs))
            }
            Some(Token::Const { .. }) => {
                self.next();
                let mut specs = vec![];
                self.parse_spec_group(|parser| {
                    let VarSpec {
                        names,
                        ty,
                        values,
                        position,
                    } = parser.parse_var_spec()?;
                    specs.push(ConstSpec {
                        names,
                        ty,
                        values,
                        position,
                    });
                    Ok(())
                })?;
                Ok(Declaration::Const(specs))
            }
            Some(Token::Type { .. }) => {
                self.next();
                let mut specs = vec![];
                self.parse_spec_group(|parser| {
                    let spec = parser.parse_type_spec()?;
                    specs.push(spec);
                    Ok(())
                })?;
                Ok(Declaration::Type(specs))
            }
            other => Err(ParseError {
                message: format!(
                    "expected declaration, found {}",
                    other.map(|token| token.to_string()).unwrap_or("EOF".into())
                ),
                position: other.map(Token::position),
            }),
        }
    }

    /// Run `parse_one` for a single spec, or for each spec of a
    /// parenthesized group.
    fn parse_spec_group(
        &mut self,
        mut parse_one: impl FnMut(&mut Self) -> ParseResult<()>,
    ) -> ParseResult<()> {
        if self.peek_is(&t!(LParen)) {
            self.next();
            loop {
                self.skip_semicolons();
                if self.peek_is(&t!(RParen)) {
                    self.next();
                    return Ok(());
                }
                parse_one(self)?;
            }
        }
        parse_one(self)
    }

    fn parse_var_spec(&mut self) -> ParseResult<VarSpec> {
        let (first, position) = self.expect_ident()?;
        let mut names = vec![first];
        while self.peek_is(&t!(Comma)) {
            self.next();
            let (name, _) = self.expect_ident()?;
            names.push(name);
        }

        let ty = match self.peek() {
            Some(Token::Assign { .. }) | Some(Token::Semicolon { .. }) | None => None,
            _ => Some(self.parse_type()?),
        };

        let mut values = vec![];
        if self.peek_is(&t!(Assign)) {
            self.next();
            values = self.parse_expression_list()?;
        }

        Ok(VarSpec {
            names,
            ty,
            values,
            position,
        })
    }

    fn parse_type_spec(&mut self) -> ParseResult<TypeSpec> {
        let (name, position) = self.expect_ident()?;
        let alias = self.peek_is(&t!(Assign));
        if alias {
            self.next();
        }
        let ty = self.parse_type()?;
        Ok(TypeSpec {
            name,
            alias,
            ty,
            position,
        })
    }

    // ------------------------------------------------------------------
    // types
    // ------------------------------------------------------------------

    fn parse_type(&mut self) -> ParseResult<TypeExpr> {
        match self.peek() {
            Some(Token::LParen { .. }) => {
                self.next();
                let inner = self.parse_type()?;
                self.expect(t!(RParen))?;
                Ok(inner)
            }
            Some(Token::Star { .. }) => {
                let position = self.next().unwrap().position();
                let pointee = self.parse_type()?;
                Ok(TypeExpr::Pointer(PointerType {
                    pointee: Box::new(pointee),
                    position,
                }))
            }
            Some(Token::LBracket { .. }) => {
                let position = self.next().unwrap().position();
                let length = match self.next() {
                    Some(Token::Int { value, .. }) => value,
                    Some(token) => {
                        return Err(ParseError {
                            message: format!("expected array length, found {token}"),
                            position: Some(token.position()),
                        })
                    }
                    None => return Err(ParseError::eof("array type")),
                };
                self.expect(t!(RBracket))?;
                let element = self.parse_type()?;
                Ok(TypeExpr::Array(ArrayType {
                    length,
                    element: Box::new(element),
                    position,
                }))
            }
            Some(Token::Struct { .. }) => {
                let position = self.next().unwrap().position();
                self.expect(t!(LBrace))?;
                let mut fields = vec![];
                loop {
                    self.skip_semicolons();
                    if self.peek_is(&t!(RBrace)) {
                        self.next();
                        break;
                    }
                    let (first, field_position) = self.expect_ident()?;
                    let mut names = vec![first];
                    while self.peek_is(&t!(Comma)) {
                        self.next();
                        let (name, _) = self.expect_ident()?;
                        names.push(name);
                    }
                    let ty = self.parse_type()?;
                    fields.push(FieldDecl {
                        names,
                        ty,
                        position: field_position,
                    });
                }
                Ok(TypeExpr::Struct(StructType { fields, position }))
            }
            Some(Token::Id { .. }) => {
                let (name, position) = self.expect_ident()?;
                Ok(TypeExpr::Name(TypeName { name, position }))
            }
            other => Err(ParseError {
                message: format!(
                    "expected type, found {}",
                    other.map(|token| token.to_string()).unwrap_or("EOF".into())
                ),
                position: other.map(Token::position),
            }),
        }
    }

    // ------------------------------------------------------------------
    // statements
    // ------------------------------------------------------------------

    fn parse_block(&mut self) -> ParseResult<Block> {
        let position = self.expect(t!(LBrace))?;
        let mut statements = vec![];
        loop {
            self.skip_semicolons();
            if self.peek_is(&t!(RBrace)) {
                self.next();
                break;
            }
            if self.peek().is_none() {
                return Err(ParseError::eof("block"));
            }
            statements.push(self.parse_statement()?);
        }
        Ok(Block {
            statements,
            position,
        })
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        let statement = match self.peek() {
            Some(Token::Var { .. }) | Some(Token::Const { .. }) | Some(Token::Type { .. }) => {
                let position = self.peek().map(Token::position).unwrap_or((0, 0));
                let declaration = self.parse_declaration()?;
                self.expect_terminator()?;
                return Ok(Statement::Declaration(declaration, position));
            }
            Some(Token::LBrace { .. }) => {
                let block = self.parse_block()?;
                self.expect_terminator()?;
                return Ok(Statement::Block(block));
            }
            Some(Token::Return { .. }) => {
                let position = self.next().unwrap().position();
                let values = match self.peek() {
                    Some(Token::Semicolon { .. }) | Some(Token::RBrace { .. }) | None => vec![],
                    _ => self.parse_expression_list()?,
                };
                Statement::Return(ReturnStatement { values, position })
            }
            Some(Token::Break { .. }) => Statement::Break(self.next().unwrap().position()),
            Some(Token::Continue { .. }) => Statement::Continue(self.next().unwrap().position()),
            Some(Token::Goto { .. }) => {
                let position = self.next().unwrap().position();
                let (label, _) = self.expect_ident()?;
                Statement::Goto(GotoStatement { label, position })
            }
            Some(Token::If { .. }) => {
                let if_statement = self.parse_if()?;
                self.expect_terminator()?;
                return Ok(Statement::If(if_statement));
            }
            Some(Token::For { .. }) => {
                let for_statement = self.parse_for()?;
                self.expect_terminator()?;
                return Ok(Statement::For(for_statement));
            }
            Some(Token::Defer { .. }) => {
                let position = self.next().unwrap().position();
                let call = self.parse_expression()?;
                Statement::Defer(DeferStatement { call, position })
            }
            Some(Token::Id { .. })
                if matches!(self.tokens.peek_ahead(1), Some(Token::Colon { .. })) =>
            {
                let (label, position) = self.expect_ident()?;
                self.expect(t!(Colon))?;
                self.skip_semicolons();
                let statement = self.parse_statement()?;
                return Ok(Statement::Labeled(LabeledStatement {
                    label,
                    statement: Box::new(statement),
                    position,
                }));
            }
            Some(_) => Statement::Simple(self.parse_simple_statement()?),
            None => return Err(ParseError::eof("statement")),
        };
        self.expect_terminator()?;
        Ok(statement)
    }

    fn parse_simple_statement(&mut self) -> ParseResult<SimpleStatement> {
        let position = self.peek().map(Token::position).unwrap_or((0, 0));
        let targets = self.parse_expression_list()?;

        let op = match self.peek() {
            Some(Token::ColonAssign { .. }) => {
                self.next();
                let mut names = vec![];
                for target in &targets {
                    match target {
                        Expression::Ident(Ident { name, .. }) => names.push(name.clone()),
                        other => {
                            return Err(ParseError {
                                message: "left side of ':=' must be identifiers".into(),
                                position: Some(other.position()),
                            })
                        }
                    }
                }
                let values = self.parse_expression_list()?;
                return Ok(SimpleStatement::ShortVarDecl(ShortVarDecl {
                    names,
                    values,
                    position,
                }));
            }
            Some(Token::PlusPlus { .. }) | Some(Token::MinusMinus { .. }) => {
                let increment = matches!(self.peek(), Some(Token::PlusPlus { .. }));
                self.next();
                let [target] = <[Expression; 1]>::try_from(targets).map_err(|_| ParseError {
                    message: "'++'/'--' requires a single operand".into(),
                    position: Some(position),
                })?;
                return Ok(SimpleStatement::IncDec(IncDecStatement {
                    target,
                    increment,
                    position,
                }));
            }
            Some(Token::Assign { .. }) => {
                self.next();
                None
            }
            Some(Token::PlusAssign { .. }) => {
                self.next();
                Some(AssignOp::Add)
            }
            Some(Token::MinusAssign { .. }) => {
                self.next();
                Some(AssignOp::Sub)
            }
            Some(Token::StarAssign { .. }) => {
                self.next();
                Some(AssignOp::Mul)
            }
            Some(Token::SlashAssign { .. }) => {
                self.next();
                Some(AssignOp::Div)
            }
            _ => {
                let [expression] = <[Expression; 1]>::try_from(targets).map_err(|_| ParseError {
                    message: "expected assignment after expression list".into(),
                    position: Some(position),
                })?;
                return Ok(SimpleStatement::Expression(expression));
            }
        };

        let values = self.parse_expression_list()?;
        Ok(SimpleStatement::Assignment(Assignment {
            targets,
            op,
            values,
            position,
        }))
    }

    fn parse_if(&mut self) -> ParseResult<IfStatement> {
        let position = self.expect(t!(If))?;

        let saved = self.allow_composite;
        self.allow_composite = false;
        let condition = self.parse_expression();
        self.allow_composite = saved;
        let condition = condition?;

        if self.peek_is(&t!(Semicolon)) {
            return Err(self.error_here("init statement in if is not supported"));
        }

        let then_block = self.parse_block()?;

        let else_branch = if self.peek_is(&t!(Else)) {
            self.next();
            match self.peek() {
                Some(Token::If { .. }) => Some(ElseBranch::If(Box::new(self.parse_if()?))),
                Some(Token::LBrace { .. }) => Some(ElseBranch::Block(self.parse_block()?)),
                other => {
                    return Err(ParseError {
                        message: format!(
                            "expected 'if' or block after 'else', found {}",
                            other.map(|token| token.to_string()).unwrap_or("EOF".into())
                        ),
                        position: other.map(Token::position),
                    })
                }
            }
        } else {
            None
        };

        Ok(IfStatement {
            condition,
            then_block,
            else_branch,
            position,
        })
    }

    /// Whether a `range` token occurs in the for header before the body
    /// brace; such loops are parsed loosely and rejected during lowering.
    fn for_header_is_range(&self) -> bool {
        let mut n = 0;
        while let Some(token) = self.tokens.peek_ahead(n) {
            match token {
                Token::Range { .. } => return true,
                Token::LBrace { .. } | Token::Semicolon { .. } => return false,
                _ => n += 1,
            }
        }
        false
    }

    fn parse_for(&mut self) -> ParseResult<ForStatement> {
        let position = self.expect(t!(For))?;

        if self.peek_is(&t!(LBrace)) {
            let body = self.parse_block()?;
            return Ok(ForStatement::Infinite(InfiniteFor { body, position }));
        }

        if self.for_header_is_range() {
            // skip the header; the lowering pass rejects range loops anyway
            while !self.peek_is(&t!(LBrace)) {
                if self.next().is_none() {
                    return Err(ParseError::eof("for statement"));
                }
            }
            let body = self.parse_block()?;
            return Ok(ForStatement::Range(RangeFor { body, position }));
        }

        let saved = self.allow_composite;
        self.allow_composite = false;
        let result = self.parse_for_header(position);
        self.allow_composite = saved;
        let header = result?;

        let body = self.parse_block()?;

        Ok(match header {
            ForHeader::While(condition) => ForStatement::While(WhileFor {
                condition,
                body,
                position,
            }),
            ForHeader::Clause(init, condition, post) => ForStatement::Clause(ClauseFor {
                init,
                condition,
                post,
                body,
                position,
            }),
        })
    }

    fn parse_for_header(&mut self, position: Position) -> ParseResult<ForHeader> {
        // `for ; cond ; post`
        let init = if self.peek_is(&t!(Semicolon)) {
            None
        } else {
            let simple = self.parse_simple_statement()?;
            if self.peek_is(&t!(LBrace)) {
                // single-condition (while) form
                let SimpleStatement::Expression(condition) = simple else {
                    return Err(ParseError {
                        message: "for condition must be an expression".into(),
                        position: Some(position),
                    });
                };
                return Ok(ForHeader::While(condition));
            }
            Some(simple)
        };

        self.expect(t!(Semicolon))?;

        if self.peek_is(&t!(Semicolon)) {
            return Err(self.error_here("for clause requires a condition"));
        }
        let condition = self.parse_expression()?;
        self.expect(t!(Semicolon))?;

        let post = if self.peek_is(&t!(LBrace)) {
            None
        } else {
            Some(self.parse_simple_statement()?)
        };

        Ok(ForHeader::Clause(init, condition, post))
    }

    // ------------------------------------------------------------------
    // expressions
    // ------------------------------------------------------------------

    fn parse_expression_list(&mut self) -> ParseResult<Vec<Expression>> {
        let mut expressions = vec![self.parse_expression()?];
        while self.peek_is(&t!(Comma)) {
            self.next();
            expressions.push(self.parse_expression()?);
        }
        Ok(expressions)
    }

    pub fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_binary(1)
    }

    fn parse_binary(&mut self, min_precedence: u8) -> ParseResult<Expression> {
        let mut lhs = self.parse_unary()?;

        while let Some(token) = self.peek() {
            let Some((op, precedence)) = binary_op(token) else {
                break;
            };
            if precedence < min_precedence {
                break;
            }
            let position = self.next().unwrap().position();
            let rhs = self.parse_binary(precedence + 1)?;
            lhs = Expression::Binary(BinaryExpr {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                position,
            });
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        let op = match self.peek() {
            Some(Token::Plus { .. }) => Some(UnaryOp::Plus),
            Some(Token::Minus { .. }) => Some(UnaryOp::Minus),
            Some(Token::Bang { .. }) => Some(UnaryOp::Not),
            Some(Token::Amp { .. }) => Some(UnaryOp::AddressOf),
            Some(Token::Star { .. }) => Some(UnaryOp::Deref),
            _ => None,
        };
        if let Some(op) = op {
            let position = self.next().unwrap().position();
            let operand = self.parse_unary()?;
            return Ok(Expression::Unary(UnaryExpr {
                op,
                operand: Box::new(operand),
                position,
            }));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let mut expression = self.parse_operand()?;

        loop {
            match self.peek() {
                Some(Token::LParen { .. }) => {
                    let position = self.next().unwrap().position();
                    let saved = self.allow_composite;
                    self.allow_composite = true;
                    let args = self.parse_call_args();
                    self.allow_composite = saved;
                    expression = Expression::Call(CallExpr {
                        callee: Box::new(expression),
                        args: args?,
                        position,
                    });
                }
                Some(Token::LBracket { .. }) => {
                    let position = self.next().unwrap().position();
                    let saved = self.allow_composite;
                    self.allow_composite = true;
                    let index = self.parse_expression();
                    self.allow_composite = saved;
                    self.expect(t!(RBracket))?;
                    expression = Expression::Index(IndexExpr {
                        base: Box::new(expression),
                        index: Box::new(index?),
                        position,
                    });
                }
                Some(Token::Dot { .. }) => {
                    let position = self.next().unwrap().position();
                    let (field, _) = self.expect_ident()?;
                    expression = Expression::Selector(SelectorExpr {
                        base: Box::new(expression),
                        field,
                        position,
                    });
                }
                _ => break,
            }
        }

        Ok(expression)
    }

    fn parse_call_args(&mut self) -> ParseResult<Vec<Expression>> {
        let mut args = vec![];
        if !self.peek_is(&t!(RParen)) {
            args = self.parse_expression_list()?;
        }
        self.expect(t!(RParen))?;
        Ok(args)
    }

    fn parse_operand(&mut self) -> ParseResult<Expression> {
        match self.peek() {
            Some(Token::Int { .. }) => {
                let Some(Token::Int { value, position }) = self.next() else {
                    unreachable!()
                };
                Ok(Expression::IntLit(IntLit { value, position }))
            }
            Some(Token::Float { .. }) => {
                let Some(Token::Float { value, position }) = self.next() else {
                    unreachable!()
                };
                Ok(Expression::FloatLit(FloatLit { value, position }))
            }
            Some(Token::Str { .. }) => {
                let Some(Token::Str { value, position }) = self.next() else {
                    unreachable!()
                };
                Ok(Expression::StringLit(StringLit { value, position }))
            }
            Some(Token::True { .. }) | Some(Token::False { .. }) => {
                let value = matches!(self.peek(), Some(Token::True { .. }));
                let position = self.next().unwrap().position();
                Ok(Expression::BoolLit(BoolLit { value, position }))
            }
            Some(Token::Nil { .. }) => {
                let position = self.next().unwrap().position();
                Ok(Expression::NilLit(NilLit { position }))
            }
            Some(Token::LParen { .. }) => {
                self.next();
                let saved = self.allow_composite;
                self.allow_composite = true;
                let inner = self.parse_expression();
                self.allow_composite = saved;
                self.expect(t!(RParen))?;
                inner
            }
            Some(Token::LBracket { .. }) => {
                // an array type literal: `[3]int{...}`
                let ty = self.parse_type()?;
                let position = ty.position();
                let elements = self.parse_literal_value()?;
                Ok(Expression::Composite(CompositeLit {
                    ty,
                    elements,
                    position,
                }))
            }
            Some(Token::Id { .. }) => {
                let (name, position) = self.expect_ident()?;
                if self.allow_composite && self.peek_is(&t!(LBrace)) {
                    let elements = self.parse_literal_value()?;
                    return Ok(Expression::Composite(CompositeLit {
                        ty: TypeExpr::Name(TypeName { name, position }),
                        elements,
                        position,
                    }));
                }
                Ok(Expression::Ident(Ident { name, position }))
            }
            other => Err(ParseError {
                message: format!(
                    "expected expression, found {}",
                    other.map(|token| token.to_string()).unwrap_or("EOF".into())
                ),
                position: other.map(Token::position),
            }),
        }
    }

    fn parse_literal_value(&mut self) -> ParseResult<Vec<KeyedElement>> {
        self.expect(t!(LBrace))?;
        let saved = self.allow_composite;
        self.allow_composite = true;
        let result = self.parse_keyed_elements();
        self.allow_composite = saved;
        result
    }

    fn parse_keyed_elements(&mut self) -> ParseResult<Vec<KeyedElement>> {
        let mut elements = vec![];
        loop {
            self.skip_semicolons();
            if self.peek_is(&t!(RBrace)) {
                self.next();
                break;
            }
            let position = self.peek().map(Token::position).unwrap_or((0, 0));

            let (key, value) = if self.peek_is(&t!(LBrace)) {
                // nested literal value without a key
                (None, ElementValue::Literal(self.parse_literal_value()?, position))
            } else {
                let first = self.parse_expression()?;
                if self.peek_is(&t!(Colon)) {
                    self.next();
                    if self.peek_is(&t!(LBrace)) {
                        (
                            Some(first),
                            ElementValue::Literal(self.parse_literal_value()?, position),
                        )
                    } else {
                        (Some(first), ElementValue::Expr(self.parse_expression()?))
                    }
                } else {
                    (None, ElementValue::Expr(first))
                }
            };

            elements.push(KeyedElement {
                key,
                value,
                position,
            });

            if self.peek_is(&t!(Comma)) {
                self.next();
            }
        }
        Ok(elements)
    }
}

enum ForHeader {
    While(Expression),
    Clause(Option<SimpleStatement>, Expression, Option<SimpleStatement>),
}

fn binary_op(token: &Token) -> Option<(BinaryOp, u8)> {
    Some(match token {
        Token::PipePipe { .. } => (BinaryOp::LogicalOr, 1),
        Token::AmpAmp { .. } => (BinaryOp::LogicalAnd, 2),
        Token::Equal { .. } => (BinaryOp::Equal, 3),
        Token::NotEqual { .. } => (BinaryOp::NotEqual, 3),
        Token::Less { .. } => (BinaryOp::Less, 3),
        Token::LessEqual { .. } => (BinaryOp::LessEqual, 3),
        Token::Greater { .. } => (BinaryOp::Greater, 3),
        Token::GreaterEqual { .. } => (BinaryOp::GreaterEqual, 3),
        Token::Plus { .. } => (BinaryOp::Add, 4),
        Token::Minus { .. } => (BinaryOp::Sub, 4),
        Token::Star { .. } => (BinaryOp::Mul, 5),
        Token::Slash { .. } => (BinaryOp::Div, 5),
        Token::Percent { .. } => (BinaryOp::Rem, 5),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse_source(input: &str) -> ParseResult<SourceFile> {
        parse(Lexer::new(input).lex().expect("lexing failed"))
    }

    #[test]
    fn test_parse_empty_main() {
        let file = parse_source("package p\nfunc main() {}\n").unwrap();
        assert_eq!(file.package.name, "p");
        assert_eq!(file.decls.len(), 1);
        assert!(matches!(
            &file.decls[0],
            TopLevelDecl::Function(FunctionDef { name, .. }) if name == "main"
        ));
    }

    #[test]
    fn test_parse_signature_groups() {
        let file = parse_source("package p; func f(a, b int, c float64) (int, bool) {}").unwrap();
        let TopLevelDecl::Function(fun) = &file.decls[0] else {
            panic!("expected function");
        };
        assert_eq!(fun.signature.params.len(), 3);
        assert_eq!(fun.signature.results.len(), 2);
        assert_eq!(fun.signature.params[1].name, "b");
    }

    #[test]
    fn test_parse_precedence() {
        let file = parse_source("package p; func f() { x := 1 + 2 * 3 }").unwrap();
        let TopLevelDecl::Function(fun) = &file.decls[0] else {
            panic!("expected function");
        };
        let Statement::Simple(SimpleStatement::ShortVarDecl(decl)) = &fun.body.statements[0]
        else {
            panic!("expected short var decl");
        };
        let Expression::Binary(add) = &decl.values[0] else {
            panic!("expected binary expression");
        };
        assert_eq!(add.op, BinaryOp::Add);
        assert!(matches!(
            add.rhs.as_ref(),
            Expression::Binary(BinaryExpr { op: BinaryOp::Mul, .. })
        ));
    }

    #[test]
    fn test_composite_suppressed_in_for_header() {
        let file = parse_source("package p; func f(n int) { for i := 0; i < n; i++ { } }");
        assert!(file.is_ok());
    }

    #[test]
    fn test_while_form() {
        let file = parse_source("package p; func f(n int) { for n > 0 { n-- } }").unwrap();
        let TopLevelDecl::Function(fun) = &file.decls[0] else {
            panic!("expected function");
        };
        assert!(matches!(
            &fun.body.statements[0],
            Statement::For(ForStatement::While(_))
        ));
    }

    #[test]
    fn test_parse_struct_type_decl() {
        let file = parse_source("package p; type Node struct { Next *Node; Value int }").unwrap();
        let TopLevelDecl::Declaration(Declaration::Type(specs)) = &file.decls[0] else {
            panic!("expected type declaration");
        };
        assert_eq!(specs[0].name, "Node");
        let TypeExpr::Struct(body) = &specs[0].ty else {
            panic!("expected struct type");
        };
        assert_eq!(body.fields.len(), 2);
    }

    #[test]
    fn test_parse_composite_literal_keys() {
        let file =
            parse_source("package p; func f() { n := Node{Value: 3}; a := [3]int{1, 2: 7} }");
        assert!(file.is_ok());
    }

    #[test]
    fn test_labeled_and_goto() {
        let file = parse_source("package p; func f() { L: x := 1; goto L }");
        assert!(file.is_ok());
    }
}
