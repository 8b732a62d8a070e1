//! Statement lowering: assignments, declarations, increment/decrement and
//! return sites.
use crate::ast::{
    Assignment, AssignOp, BinaryOp, Block, ConstSpec, Declaration, Expression, IncDecStatement,
    Position, ReturnStatement, ShortVarDecl, SimpleStatement, Statement, VarSpec,
};
use crate::llir::{Instruction, Terminator, Type, Value};

use super::context::BlockId;
use super::error::{CgResult, CodegenError, ErrorKind};
use super::expression::retype_nil;
use super::scope::Binding;
use super::{current_block, CodeGen};

impl CodeGen {
    /// Lower the statements of a block in their own lexical scope.
    pub(super) fn gen_block(&mut self, block: BlockId, body: &Block) -> CgResult<Vec<BlockId>> {
        self.ctx.scope.push();
        let result = self.gen_statement_list(block, &body.statements);
        self.ctx.scope.pop();
        result
    }

    /// Statements after a terminator land in a fresh unreachable block, so
    /// no block ever grows instructions past its terminator.
    fn gen_statement_list(
        &mut self,
        block: BlockId,
        statements: &[Statement],
    ) -> CgResult<Vec<BlockId>> {
        let mut new_blocks = vec![];
        for statement in statements {
            let mut cur = current_block(block, &new_blocks);
            if self.frame.is_terminated(cur) {
                cur = self.frame.new_dead_block();
                new_blocks.push(cur);
            }
            let blocks = self.gen_statement(cur, statement)?;
            new_blocks.extend(blocks);
        }
        Ok(new_blocks)
    }

    pub(super) fn gen_statement(
        &mut self,
        block: BlockId,
        statement: &Statement,
    ) -> CgResult<Vec<BlockId>> {
        match statement {
            Statement::Declaration(declaration, position) => {
                self.gen_local_declaration(block, declaration, *position)
            }
            Statement::Labeled(labeled) => self.gen_labeled(block, labeled),
            Statement::Simple(simple) => self.gen_simple(block, simple),
            Statement::Return(ret) => self.gen_return(block, ret),
            Statement::Break(position) => self.gen_break(block, *position),
            Statement::Continue(position) => self.gen_continue(block, *position),
            Statement::Goto(goto) => self.gen_goto(block, goto),
            Statement::Block(body) => self.gen_block(block, body),
            Statement::If(if_statement) => self.gen_if(block, if_statement),
            Statement::For(for_statement) => self.gen_for(block, for_statement),
            Statement::Defer(defer) => self.gen_defer(block, defer),
        }
    }

    pub(super) fn gen_simple(
        &mut self,
        block: BlockId,
        simple: &SimpleStatement,
    ) -> CgResult<Vec<BlockId>> {
        match simple {
            SimpleStatement::Expression(expression) => {
                let (_, blocks) = self.gen_expr(block, expression)?;
                Ok(blocks)
            }
            SimpleStatement::Assignment(assignment) => self.gen_assignment(block, assignment),
            SimpleStatement::ShortVarDecl(decl) => self.gen_short_var_decl(block, decl),
            SimpleStatement::IncDec(incdec) => self.gen_incdec(block, incdec),
        }
    }

    fn gen_assignment(&mut self, block: BlockId, assignment: &Assignment) -> CgResult<Vec<BlockId>> {
        if let Some(op) = assignment.op {
            return self.gen_compound_assignment(block, assignment, op);
        }

        let mut new_blocks = vec![];

        // the blank identifier drops its r-value without denoting a slot
        let mut targets = vec![];
        for target in &assignment.targets {
            let cur = current_block(block, &new_blocks);
            if matches!(target, Expression::Ident(ident) if ident.name == "_") {
                targets.push(None);
                continue;
            }
            let (slot, blocks) = self.gen_lvalue(cur, target)?;
            new_blocks.extend(blocks);
            targets.push(Some(slot));
        }

        let mut values = vec![];
        for expression in &assignment.values {
            let cur = current_block(block, &new_blocks);
            let (produced, blocks) = self.gen_expr(cur, expression)?;
            new_blocks.extend(blocks);
            values.extend(produced);
        }

        if targets.len() != values.len() {
            return Err(CodegenError::new(
                ErrorKind::ArityMismatch,
                format!(
                    "assignment count mismatch: {} targets, {} values",
                    targets.len(),
                    values.len()
                ),
                assignment.position,
            ));
        }

        let cur = current_block(block, &new_blocks);
        for (slot, value) in targets.into_iter().zip(values) {
            let Some(slot) = slot else { continue };
            let target_ty = slot.ty().pointee().cloned().unwrap_or(Type::Void);
            let value = retype_nil(value, &target_ty);
            self.frame.push(cur, Instruction::Store { value, ptr: slot });
        }
        Ok(new_blocks)
    }

    fn gen_compound_assignment(
        &mut self,
        block: BlockId,
        assignment: &Assignment,
        op: AssignOp,
    ) -> CgResult<Vec<BlockId>> {
        // compound operators take exactly one target and one value
        let (Ok([target]), Ok([value_expr])) = (
            <&[Expression; 1]>::try_from(assignment.targets.as_slice()),
            <&[Expression; 1]>::try_from(assignment.values.as_slice()),
        ) else {
            return Err(CodegenError::new(
                ErrorKind::ArityMismatch,
                "compound assignment requires a single target and value",
                assignment.position,
            ));
        };

        let mut new_blocks = vec![];
        let (slot, blocks) = self.gen_lvalue(block, target)?;
        new_blocks.extend(blocks);
        let cur = current_block(block, &new_blocks);
        let loaded = self.load(cur, &slot, assignment.position)?;

        let (rhs, blocks) = self.gen_single(cur, value_expr)?;
        new_blocks.extend(blocks);
        let cur = current_block(block, &new_blocks);

        let binary_op = match op {
            AssignOp::Add => BinaryOp::Add,
            AssignOp::Sub => BinaryOp::Sub,
            AssignOp::Mul => BinaryOp::Mul,
            AssignOp::Div => BinaryOp::Div,
        };
        let combined = self.gen_arith(cur, binary_op, loaded, rhs, assignment.position)?;
        self.frame.push(
            cur,
            Instruction::Store {
                value: combined,
                ptr: slot,
            },
        );
        Ok(new_blocks)
    }

    fn gen_short_var_decl(&mut self, block: BlockId, decl: &ShortVarDecl) -> CgResult<Vec<BlockId>> {
        let mut new_blocks = vec![];
        let mut values = vec![];
        for expression in &decl.values {
            let cur = current_block(block, &new_blocks);
            let (produced, blocks) = self.gen_expr(cur, expression)?;
            new_blocks.extend(blocks);
            values.extend(produced);
        }

        if values.len() != decl.names.len() {
            return Err(CodegenError::new(
                ErrorKind::ArityMismatch,
                format!(
                    "declaration count mismatch: {} names, {} values",
                    decl.names.len(),
                    values.len()
                ),
                decl.position,
            ));
        }

        let cur = current_block(block, &new_blocks);
        for (name, value) in decl.names.iter().zip(values) {
            if name == "_" {
                continue;
            }
            self.bind_local(cur, name, value.ty(), Some(value), decl.position)?;
        }
        Ok(new_blocks)
    }

    /// Allocate a slot for `name`, optionally store an initial value, and
    /// bind it in the current scope.
    pub(super) fn bind_local(
        &mut self,
        block: BlockId,
        name: &str,
        ty: Type,
        value: Option<Value>,
        position: Position,
    ) -> CgResult<Value> {
        let slot_name = self.frame.named(name);
        self.frame.push(
            block,
            Instruction::Alloca {
                result: slot_name.clone(),
                ty: ty.clone(),
            },
        );
        let slot = Value::Local(slot_name, ty.clone().ptr());
        let value = value.map(|value| retype_nil(value, &ty)).unwrap_or_else(|| Value::zero(&ty));
        self.frame.push(
            block,
            Instruction::Store {
                value,
                ptr: slot.clone(),
            },
        );
        self.ctx
            .scope
            .add(name, Binding::Slot(slot.clone()))
            .map_err(|message| {
                CodegenError::new(ErrorKind::DuplicateSymbol, message, position)
            })?;
        Ok(slot)
    }

    fn gen_incdec(&mut self, block: BlockId, incdec: &IncDecStatement) -> CgResult<Vec<BlockId>> {
        let (slot, new_blocks) = self.gen_lvalue(block, &incdec.target)?;
        let cur = current_block(block, &new_blocks);
        let loaded = self.load(cur, &slot, incdec.position)?;
        let ty = loaded.ty();
        if !ty.is_int() && !ty.is_uint() {
            return Err(CodegenError::new(
                ErrorKind::TypeMismatch,
                format!("operator ++/-- not defined for {ty}"),
                incdec.position,
            ));
        }
        let op = if incdec.increment {
            BinaryOp::Add
        } else {
            BinaryOp::Sub
        };
        let one = Value::ConstInt(ty, 1);
        let combined = self.gen_arith(cur, op, loaded, one, incdec.position)?;
        self.frame.push(
            cur,
            Instruction::Store {
                value: combined,
                ptr: slot,
            },
        );
        Ok(new_blocks)
    }

    fn gen_return(&mut self, block: BlockId, ret: &ReturnStatement) -> CgResult<Vec<BlockId>> {
        let decl = self.current.clone().expect("return outside function");

        let mut new_blocks = vec![];
        let mut values = vec![];
        for expression in &ret.values {
            let cur = current_block(block, &new_blocks);
            let (produced, blocks) = self.gen_expr(cur, expression)?;
            new_blocks.extend(blocks);
            values.extend(produced);
        }

        if values.len() != decl.rets.len() {
            return Err(CodegenError::new(
                ErrorKind::BadReturn,
                format!(
                    "wrong number of return values: expected {}, got {}",
                    decl.rets.len(),
                    values.len()
                ),
                ret.position,
            ));
        }

        // deferred calls run before control leaves the function
        let cur = current_block(block, &new_blocks);
        let flush_blocks = self.emit_defer_flush(cur);
        new_blocks.extend(flush_blocks);
        let cur = current_block(block, &new_blocks);

        match decl.rets.len() {
            0 => self.frame.terminate(cur, Terminator::Ret(None)),
            1 => {
                let value = retype_nil(values.pop().unwrap(), &decl.rets[0].ty);
                self.frame.terminate(cur, Terminator::Ret(Some(value)));
            }
            _ => {
                // write each value through its leading out-parameter
                for (value, ret_decl) in values.into_iter().zip(&decl.rets) {
                    let Some(Binding::Slot(slot)) = self.ctx.scope.lookup(&ret_decl.name) else {
                        return Err(CodegenError::new(
                            ErrorKind::BadReturn,
                            format!("return slot {} not bound", ret_decl.name),
                            ret.position,
                        ));
                    };
                    let slot = slot.clone();
                    let value = retype_nil(value, &ret_decl.ty);
                    self.frame.push(cur, Instruction::Store { value, ptr: slot });
                }
                self.frame.terminate(cur, Terminator::Ret(None));
            }
        }
        Ok(new_blocks)
    }

    fn gen_local_declaration(
        &mut self,
        block: BlockId,
        declaration: &Declaration,
        _position: Position,
    ) -> CgResult<Vec<BlockId>> {
        match declaration {
            Declaration::Var(specs) => {
                let mut new_blocks = vec![];
                for spec in specs {
                    let blocks = self.gen_var_spec(current_block(block, &new_blocks), spec)?;
                    new_blocks.extend(blocks);
                }
                Ok(new_blocks)
            }
            Declaration::Const(specs) => {
                let mut new_blocks = vec![];
                for spec in specs {
                    let blocks = self.gen_const_spec(current_block(block, &new_blocks), spec)?;
                    new_blocks.extend(blocks);
                }
                Ok(new_blocks)
            }
            Declaration::Type(specs) => {
                for spec in specs {
                    self.table.types.parse_type_decl(spec)?;
                }
                Ok(vec![])
            }
        }
    }

    fn gen_var_spec(&mut self, block: BlockId, spec: &VarSpec) -> CgResult<Vec<BlockId>> {
        let declared_ty = spec
            .ty
            .as_ref()
            .map(|expr| self.table.types.parse_type(expr))
            .transpose()?;

        let mut new_blocks = vec![];
        let mut values = vec![];
        for expression in &spec.values {
            let cur = current_block(block, &new_blocks);
            let (produced, blocks) = self.gen_expr(cur, expression)?;
            new_blocks.extend(blocks);
            values.extend(produced);
        }

        if !values.is_empty() && values.len() != spec.names.len() {
            return Err(CodegenError::new(
                ErrorKind::ArityMismatch,
                format!(
                    "declaration count mismatch: {} names, {} values",
                    spec.names.len(),
                    values.len()
                ),
                spec.position,
            ));
        }

        let cur = current_block(block, &new_blocks);
        for (i, name) in spec.names.iter().enumerate() {
            let value = values.get(i).cloned();
            let ty = match (&declared_ty, &value) {
                (Some(ty), _) => ty.clone(),
                (None, Some(value)) => value.ty(),
                (None, None) => {
                    return Err(CodegenError::new(
                        ErrorKind::UnknownType,
                        format!("missing type in declaration of {name}"),
                        spec.position,
                    ))
                }
            };
            if name == "_" {
                continue;
            }
            self.bind_local(cur, name, ty, value, spec.position)?;
        }
        Ok(new_blocks)
    }

    fn gen_const_spec(&mut self, block: BlockId, spec: &ConstSpec) -> CgResult<Vec<BlockId>> {
        if spec.values.len() != spec.names.len() {
            return Err(CodegenError::new(
                ErrorKind::ArityMismatch,
                format!(
                    "declaration count mismatch: {} names, {} values",
                    spec.names.len(),
                    spec.values.len()
                ),
                spec.position,
            ));
        }
        let declared_ty = spec
            .ty
            .as_ref()
            .map(|expr| self.table.types.parse_type(expr))
            .transpose()?;

        let mut new_blocks = vec![];
        for (name, expression) in spec.names.iter().zip(&spec.values) {
            let cur = current_block(block, &new_blocks);
            let (value, blocks) = self.gen_single(cur, expression)?;
            new_blocks.extend(blocks);
            let cur = current_block(block, &new_blocks);

            if name == "_" {
                continue;
            }
            match &declared_ty {
                // a typed constant gets a slot like a variable
                Some(ty) => {
                    self.bind_local(cur, name, ty.clone(), Some(value), spec.position)?;
                }
                // an untyped constant binds its value directly
                None => {
                    self.ctx
                        .scope
                        .add(name, Binding::Constant(value))
                        .map_err(|message| {
                            CodegenError::new(ErrorKind::DuplicateSymbol, message, spec.position)
                        })?;
                }
            }
        }
        Ok(new_blocks)
    }
}
