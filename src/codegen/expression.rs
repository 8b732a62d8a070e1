//! Expression lowering.
//!
//! Every lowering function takes the block to emit into and returns the
//! produced values together with any newly created blocks; the last new block
//! becomes the current one for the caller. Multi-value results only arise
//! from calls to multi-return functions.
use crate::ast::{
    BinaryOp, CallExpr, CompositeLit, ElementValue, Expression, KeyedElement, Position, UnaryOp,
};
use crate::llir::{BinOp, FPred, IPred, Instruction, StructRef, Type, Value};

use super::context::BlockId;
use super::error::{CgResult, CodegenError, ErrorKind};
use super::package::FunctionDecl;
use super::scope::Binding;
use super::types::common_supertype;
use super::{current_block, CodeGen};

impl CodeGen {
    pub(super) fn gen_expr(
        &mut self,
        block: BlockId,
        expr: &Expression,
    ) -> CgResult<(Vec<Value>, Vec<BlockId>)> {
        match expr {
            Expression::Ident(ident) => {
                let value = self.gen_name(block, &ident.name, ident.position)?;
                Ok((vec![value], vec![]))
            }
            Expression::IntLit(lit) => {
                Ok((vec![Value::ConstInt(Type::Int(32), lit.value)], vec![]))
            }
            Expression::FloatLit(lit) => {
                Ok((vec![Value::ConstFloat(Type::F64, lit.value)], vec![]))
            }
            Expression::StringLit(lit) => {
                let decoded = unescape::unescape(&lit.value).ok_or_else(|| {
                    CodegenError::new(
                        ErrorKind::ParseRejected,
                        "invalid escape sequence in string literal",
                        lit.position,
                    )
                })?;
                let value = self.ctx.intern_string(decoded.as_bytes());
                Ok((vec![value], vec![]))
            }
            Expression::BoolLit(lit) => Ok((
                vec![Value::ConstInt(Type::BOOL, i64::from(lit.value))],
                vec![],
            )),
            // the pointee is refined by the consuming context
            Expression::NilLit(_) => Ok((vec![Value::Null(Type::Int(32).ptr())], vec![])),
            Expression::Unary(unary) => {
                let (value, blocks) = self.gen_unary(block, unary.op, &unary.operand, unary.position)?;
                Ok((vec![value], blocks))
            }
            Expression::Binary(binary) => {
                let mut new_blocks = vec![];
                let (lhs, blocks) = self.gen_single(block, &binary.lhs)?;
                new_blocks.extend(blocks);
                let cur = current_block(block, &new_blocks);
                let (rhs, blocks) = self.gen_single(cur, &binary.rhs)?;
                new_blocks.extend(blocks);
                let cur = current_block(block, &new_blocks);
                let value = self.gen_binary(cur, binary.op, lhs, rhs, binary.position)?;
                Ok((vec![value], new_blocks))
            }
            Expression::Call(call) => self.gen_call(block, call),
            Expression::Index(_) | Expression::Selector(_) => {
                // module members used as plain values resolve to the handle
                if let Expression::Selector(selector) = expr {
                    if let Some((value, _)) = self.resolve_module_member(selector) {
                        return Ok((vec![value], vec![]));
                    }
                }
                let (slot, blocks) = self.gen_lvalue(block, expr)?;
                let cur = current_block(block, &blocks);
                let value = self.load(cur, &slot, expr.position())?;
                Ok((vec![value], blocks))
            }
            Expression::Composite(lit) => {
                let (value, blocks) = self.gen_composite(block, lit)?;
                Ok((vec![value], blocks))
            }
        }
    }

    /// Lower an expression expected to produce exactly one value.
    pub(super) fn gen_single(
        &mut self,
        block: BlockId,
        expr: &Expression,
    ) -> CgResult<(Value, Vec<BlockId>)> {
        let (values, blocks) = self.gen_expr(block, expr)?;
        match <[Value; 1]>::try_from(values) {
            Ok([value]) => Ok((value, blocks)),
            Err(values) => Err(CodegenError::new(
                ErrorKind::ArityMismatch,
                format!(
                    "expression produces {} values in single-value context",
                    values.len()
                ),
                expr.position(),
            )),
        }
    }

    fn gen_name(&mut self, block: BlockId, name: &str, position: Position) -> CgResult<Value> {
        if name == "_" {
            return Err(CodegenError::new(
                ErrorKind::UndefinedName,
                "cannot use _ as value",
                position,
            ));
        }
        match self.ctx.scope.lookup(name) {
            Some(Binding::Slot(slot)) => {
                let slot = slot.clone();
                self.load(block, &slot, position)
            }
            Some(Binding::Constant(value)) => Ok(value.clone()),
            None => match self.ctx.lookup_func(name) {
                Some((value, _)) => Ok(value),
                None if self
                    .table
                    .imports
                    .iter()
                    .any(|import| import.alias == name) =>
                {
                    Ok(Value::ModuleRef(name.to_string()))
                }
                None => Err(CodegenError::new(
                    ErrorKind::UndefinedName,
                    format!("{name} not defined in this scope"),
                    position,
                )),
            },
        }
    }

    pub(super) fn load(&mut self, block: BlockId, slot: &Value, position: Position) -> CgResult<Value> {
        let Some(pointee) = slot.ty().pointee().cloned() else {
            return Err(CodegenError::new(
                ErrorKind::InvalidLValue,
                "loaded value is not a storage location",
                position,
            ));
        };
        let result = self.frame.temp();
        self.frame.push(
            block,
            Instruction::Load {
                result: result.clone(),
                ty: pointee.clone(),
                ptr: slot.clone(),
            },
        );
        Ok(Value::Local(result, pointee))
    }

    fn gen_unary(
        &mut self,
        block: BlockId,
        op: UnaryOp,
        operand: &Expression,
        position: Position,
    ) -> CgResult<(Value, Vec<BlockId>)> {
        match op {
            UnaryOp::Plus => self.gen_single(block, operand),
            UnaryOp::Minus => {
                let (value, blocks) = self.gen_single(block, operand)?;
                let cur = current_block(block, &blocks);
                let ty = value.ty();
                let (op, zero) = if ty.is_float() {
                    (BinOp::FSub, Value::ConstFloat(ty.clone(), 0.0))
                } else if ty.is_int() || ty.is_uint() {
                    (BinOp::Sub, Value::ConstInt(ty.clone(), 0))
                } else {
                    return Err(CodegenError::new(
                        ErrorKind::TypeMismatch,
                        format!("operator - not defined for {ty}"),
                        position,
                    ));
                };
                let result = self.frame.temp();
                self.frame.push(
                    cur,
                    Instruction::BinOp {
                        result: result.clone(),
                        op,
                        lhs: zero,
                        rhs: value,
                    },
                );
                Ok((Value::Local(result, ty), blocks))
            }
            UnaryOp::Not => {
                let (value, blocks) = self.gen_single(block, operand)?;
                let cur = current_block(block, &blocks);
                if !value.ty().is_bool() {
                    return Err(CodegenError::new(
                        ErrorKind::TypeMismatch,
                        "operand of ! must be bool",
                        position,
                    ));
                }
                let result = self.frame.temp();
                self.frame.push(
                    cur,
                    Instruction::BinOp {
                        result: result.clone(),
                        op: BinOp::Xor,
                        lhs: value,
                        rhs: Value::ConstInt(Type::BOOL, 1),
                    },
                );
                Ok((Value::Local(result, Type::BOOL), blocks))
            }
            UnaryOp::AddressOf => self.gen_lvalue(block, operand),
            UnaryOp::Deref => {
                let (pointer, blocks) = self.gen_single(block, operand)?;
                let cur = current_block(block, &blocks);
                if !pointer.ty().is_pointer() {
                    return Err(CodegenError::new(
                        ErrorKind::TypeMismatch,
                        format!("cannot dereference value of type {}", pointer.ty()),
                        position,
                    ));
                }
                let value = self.load(cur, &pointer, position)?;
                Ok((value, blocks))
            }
        }
    }

    fn gen_binary(
        &mut self,
        block: BlockId,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
        position: Position,
    ) -> CgResult<Value> {
        match op {
            BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Rem
            | BinaryOp::Add
            | BinaryOp::Sub => self.gen_arith(block, op, lhs, rhs, position),
            BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::Less
            | BinaryOp::LessEqual
            | BinaryOp::Greater
            | BinaryOp::GreaterEqual => self.gen_comparison(block, op, lhs, rhs, position),
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
                self.gen_logical(block, op, lhs, rhs, position)
            }
        }
    }

    /// Arithmetic lowering shared by binary expressions, compound assignment
    /// and increment/decrement.
    pub(super) fn gen_arith(
        &mut self,
        block: BlockId,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
        position: Position,
    ) -> CgResult<Value> {
        let (lty, rty) = (lhs.ty(), rhs.ty());
        let Some(ty) = common_supertype(&lty, &rty) else {
            return Err(CodegenError::new(
                ErrorKind::TypeMismatch,
                format!("mismatched operand types {lty} and {rty}"),
                position,
            ));
        };

        let mismatch = |message: &str| {
            Err(CodegenError::new(ErrorKind::TypeMismatch, message, position))
        };
        let opcode = if ty.is_float() {
            match op {
                BinaryOp::Mul => BinOp::FMul,
                BinaryOp::Div => BinOp::FDiv,
                BinaryOp::Rem => return mismatch("operator % not defined for floats"),
                BinaryOp::Add => BinOp::FAdd,
                BinaryOp::Sub => BinOp::FSub,
                _ => unreachable!(),
            }
        } else if ty.is_uint() {
            match op {
                BinaryOp::Mul => BinOp::Mul,
                BinaryOp::Div => BinOp::UDiv,
                BinaryOp::Rem => BinOp::URem,
                BinaryOp::Add => BinOp::Add,
                BinaryOp::Sub => BinOp::Sub,
                _ => unreachable!(),
            }
        } else if ty.is_int() && !ty.is_bool() {
            match op {
                BinaryOp::Mul => BinOp::Mul,
                BinaryOp::Div => BinOp::SDiv,
                BinaryOp::Rem => BinOp::SRem,
                BinaryOp::Add => BinOp::Add,
                BinaryOp::Sub => BinOp::Sub,
                _ => unreachable!(),
            }
        } else {
            return mismatch(&format!("arithmetic not defined for {ty}"));
        };

        let result = self.frame.temp();
        self.frame.push(
            block,
            Instruction::BinOp {
                result: result.clone(),
                op: opcode,
                lhs,
                rhs,
            },
        );
        Ok(Value::Local(result, ty))
    }

    fn gen_comparison(
        &mut self,
        block: BlockId,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
        position: Position,
    ) -> CgResult<Value> {
        // pointer comparison: nil adopts the other side's pointer type
        if lhs.ty().is_pointer() || rhs.ty().is_pointer() {
            let lhs = retype_nil(lhs, &rhs.ty());
            let rhs = retype_nil(rhs, &lhs.ty());
            if lhs.ty() != rhs.ty() {
                return Err(CodegenError::new(
                    ErrorKind::TypeMismatch,
                    format!("mismatched operand types {} and {}", lhs.ty(), rhs.ty()),
                    position,
                ));
            }
            let pred = match op {
                BinaryOp::Equal => IPred::Eq,
                BinaryOp::NotEqual => IPred::Ne,
                _ => {
                    return Err(CodegenError::new(
                        ErrorKind::TypeMismatch,
                        "pointers support only == and !=",
                        position,
                    ))
                }
            };
            return Ok(self.emit_icmp(block, pred, lhs, rhs));
        }

        let (lty, rty) = (lhs.ty(), rhs.ty());
        let Some(ty) = common_supertype(&lty, &rty) else {
            return Err(CodegenError::new(
                ErrorKind::TypeMismatch,
                format!("mismatched operand types {lty} and {rty}"),
                position,
            ));
        };

        if ty.is_float() {
            let pred = match op {
                BinaryOp::Equal => FPred::Oeq,
                BinaryOp::NotEqual => FPred::One,
                BinaryOp::Less => FPred::Olt,
                BinaryOp::LessEqual => FPred::Ole,
                BinaryOp::Greater => FPred::Ogt,
                BinaryOp::GreaterEqual => FPred::Oge,
                _ => unreachable!(),
            };
            let result = self.frame.temp();
            self.frame.push(
                block,
                Instruction::FCmp {
                    result: result.clone(),
                    pred,
                    lhs,
                    rhs,
                },
            );
            Ok(Value::Local(result, Type::BOOL))
        } else if ty.is_int() || ty.is_uint() {
            let unsigned = ty.is_uint();
            let pred = match op {
                BinaryOp::Equal => IPred::Eq,
                BinaryOp::NotEqual => IPred::Ne,
                BinaryOp::Less if unsigned => IPred::Ult,
                BinaryOp::LessEqual if unsigned => IPred::Ule,
                BinaryOp::Greater if unsigned => IPred::Ugt,
                BinaryOp::GreaterEqual if unsigned => IPred::Uge,
                BinaryOp::Less => IPred::Slt,
                BinaryOp::LessEqual => IPred::Sle,
                BinaryOp::Greater => IPred::Sgt,
                BinaryOp::GreaterEqual => IPred::Sge,
                _ => unreachable!(),
            };
            Ok(self.emit_icmp(block, pred, lhs, rhs))
        } else {
            Err(CodegenError::new(
                ErrorKind::TypeMismatch,
                format!("comparison not defined for {ty}"),
                position,
            ))
        }
    }

    fn emit_icmp(&mut self, block: BlockId, pred: IPred, lhs: Value, rhs: Value) -> Value {
        let result = self.frame.temp();
        self.frame.push(
            block,
            Instruction::ICmp {
                result: result.clone(),
                pred,
                lhs,
                rhs,
            },
        );
        Value::Local(result, Type::BOOL)
    }

    /// Both operands are evaluated before the operator is applied; this
    /// matches the source of truth, which does not short-circuit.
    fn gen_logical(
        &mut self,
        block: BlockId,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
        position: Position,
    ) -> CgResult<Value> {
        if !lhs.ty().is_bool() || !rhs.ty().is_bool() {
            let operator = if op == BinaryOp::LogicalAnd { "&&" } else { "||" };
            return Err(CodegenError::new(
                ErrorKind::TypeMismatch,
                format!("operands of {operator} must be bool"),
                position,
            ));
        }
        let opcode = if op == BinaryOp::LogicalAnd {
            BinOp::And
        } else {
            BinOp::Or
        };
        let result = self.frame.temp();
        self.frame.push(
            block,
            Instruction::BinOp {
                result: result.clone(),
                op: opcode,
                lhs,
                rhs,
            },
        );
        Ok(Value::Local(result, Type::BOOL))
    }

    // ------------------------------------------------------------------
    // calls
    // ------------------------------------------------------------------

    /// `alias.member` through an import alias, unless the alias is shadowed.
    pub(super) fn resolve_module_member(
        &self,
        selector: &crate::ast::SelectorExpr,
    ) -> Option<(Value, Option<FunctionDecl>)> {
        let Expression::Ident(base) = selector.base.as_ref() else {
            return None;
        };
        if self.ctx.scope.lookup(&base.name).is_some() {
            return None;
        }
        if !self.table.imports.iter().any(|import| import.alias == base.name) {
            return None;
        }
        self.ctx.lookup_module_func(&base.name, &selector.field)
    }

    fn gen_call(
        &mut self,
        block: BlockId,
        call: &CallExpr,
    ) -> CgResult<(Vec<Value>, Vec<BlockId>)> {
        let (callee, decl) = match call.callee.as_ref() {
            Expression::Ident(ident) => {
                if self.ctx.scope.lookup(&ident.name).is_some() {
                    return Err(CodegenError::new(
                        ErrorKind::TypeMismatch,
                        format!("{} is not a function", ident.name),
                        ident.position,
                    ));
                }
                if self.table.types.is_type_name(&ident.name) {
                    return Err(CodegenError::new(
                        ErrorKind::Unimplemented,
                        "type conversions not supported",
                        ident.position,
                    ));
                }
                self.ctx.lookup_func(&ident.name).ok_or_else(|| {
                    CodegenError::new(
                        ErrorKind::UndefinedName,
                        format!("function {} not defined", ident.name),
                        ident.position,
                    )
                })?
            }
            Expression::Selector(selector) => match self.resolve_module_member(selector) {
                Some(resolved) => resolved,
                None => {
                    return Err(CodegenError::new(
                        ErrorKind::Unimplemented,
                        "method calls not supported",
                        selector.position,
                    ))
                }
            },
            other => {
                return Err(CodegenError::new(
                    ErrorKind::Unimplemented,
                    "unsupported call target",
                    other.position(),
                ))
            }
        };

        let mut new_blocks = vec![];
        let mut args = vec![];
        for arg in &call.args {
            let cur = current_block(block, &new_blocks);
            let (value, blocks) = self.gen_single(cur, arg)?;
            new_blocks.extend(blocks);
            args.push(value);
        }
        let cur = current_block(block, &new_blocks);

        let Some(decl) = decl else {
            // extern specials are variadic C calls with a single result
            let ret = callee.callee_type().map(|func_type| func_type.ret);
            let result = self.frame.temp();
            self.frame.push(
                cur,
                Instruction::Call {
                    result: Some(result.clone()),
                    callee,
                    args,
                },
            );
            let value = Value::Local(result, ret.unwrap_or(Type::Int(32)));
            return Ok((vec![value], new_blocks));
        };

        if args.len() != decl.args.len() {
            return Err(CodegenError::new(
                ErrorKind::ArityMismatch,
                format!(
                    "wrong argument count: expected {}, got {}",
                    decl.args.len(),
                    args.len()
                ),
                call.position,
            ));
        }
        for (value, arg) in args.iter_mut().zip(&decl.args) {
            *value = retype_nil(value.clone(), &arg.ty);
        }

        match decl.rets.len() {
            0 => {
                self.frame.push(
                    cur,
                    Instruction::Call {
                        result: None,
                        callee,
                        args,
                    },
                );
                Ok((vec![], new_blocks))
            }
            1 => {
                let result = self.frame.temp();
                self.frame.push(
                    cur,
                    Instruction::Call {
                        result: Some(result.clone()),
                        callee,
                        args,
                    },
                );
                Ok((
                    vec![Value::Local(result, decl.rets[0].ty.clone())],
                    new_blocks,
                ))
            }
            _ => {
                // multi-return: out-parameter slots in the entry block, their
                // addresses prepended to the argument list, results loaded back
                let mut slots = vec![];
                for ret in &decl.rets {
                    let name = self.frame.named(&ret.name);
                    slots.push(self.frame.entry_alloca(name, ret.ty.clone()));
                }
                let mut full_args = slots.clone();
                full_args.extend(args);
                self.frame.push(
                    cur,
                    Instruction::Call {
                        result: None,
                        callee,
                        args: full_args,
                    },
                );
                let mut values = vec![];
                for slot in &slots {
                    values.push(self.load(cur, slot, call.position)?);
                }
                Ok((values, new_blocks))
            }
        }
    }

    // ------------------------------------------------------------------
    // l-values
    // ------------------------------------------------------------------

    /// Lower an expression denoting a storage location to its pointer-typed
    /// slot.
    pub(super) fn gen_lvalue(
        &mut self,
        block: BlockId,
        expr: &Expression,
    ) -> CgResult<(Value, Vec<BlockId>)> {
        match expr {
            Expression::Ident(ident) => match self.ctx.scope.lookup(&ident.name) {
                Some(Binding::Slot(slot)) => Ok((slot.clone(), vec![])),
                Some(Binding::Constant(_)) => Err(CodegenError::new(
                    ErrorKind::InvalidLValue,
                    format!("cannot assign to constant {}", ident.name),
                    ident.position,
                )),
                None => Err(CodegenError::new(
                    ErrorKind::UndefinedName,
                    format!("{} not defined in this scope", ident.name),
                    ident.position,
                )),
            },
            Expression::Unary(unary) if unary.op == UnaryOp::Deref => {
                let (pointer, blocks) = self.gen_single(block, &unary.operand)?;
                if !pointer.ty().is_pointer() {
                    return Err(CodegenError::new(
                        ErrorKind::TypeMismatch,
                        format!("cannot dereference value of type {}", pointer.ty()),
                        unary.position,
                    ));
                }
                Ok((pointer, blocks))
            }
            Expression::Index(index) => {
                let mut new_blocks = vec![];
                let (base_slot, blocks) = self.gen_lvalue(block, &index.base)?;
                new_blocks.extend(blocks);
                let cur = current_block(block, &new_blocks);

                // indexing through a pointer to an array dereferences first
                let (base_ptr, array_ty) = match base_slot.ty().pointee() {
                    Some(array @ Type::Array(..)) => (base_slot.clone(), array.clone()),
                    Some(Type::Ptr(inner)) if matches!(inner.as_ref(), Type::Array(..)) => {
                        let loaded = self.load(cur, &base_slot, index.position)?;
                        (loaded, inner.as_ref().clone())
                    }
                    _ => {
                        return Err(CodegenError::new(
                            ErrorKind::TypeMismatch,
                            format!("cannot index value of type {}", base_slot.ty()),
                            index.position,
                        ))
                    }
                };
                let Type::Array(_, element) = &array_ty else {
                    unreachable!()
                };
                let element = element.as_ref().clone();

                let (idx, blocks) = self.gen_single(cur, &index.index)?;
                new_blocks.extend(blocks);
                let cur = current_block(block, &new_blocks);
                if !idx.ty().is_int() && !idx.ty().is_uint() {
                    return Err(CodegenError::new(
                        ErrorKind::TypeMismatch,
                        "array index must be an integer",
                        index.position,
                    ));
                }

                let result = self.frame.temp();
                self.frame.push(
                    cur,
                    Instruction::GetElementPtr {
                        result: result.clone(),
                        base_ty: array_ty,
                        ptr: base_ptr,
                        indices: vec![Value::ConstInt(Type::Int(32), 0), idx],
                    },
                );
                Ok((Value::Local(result, element.ptr()), new_blocks))
            }
            Expression::Selector(selector) => {
                if self.resolve_module_member(selector).is_some() {
                    return Err(CodegenError::new(
                        ErrorKind::InvalidLValue,
                        "cannot assign to module member",
                        selector.position,
                    ));
                }
                let mut new_blocks = vec![];
                let (base_slot, blocks) = self.gen_lvalue(block, &selector.base)?;
                new_blocks.extend(blocks);
                let cur = current_block(block, &new_blocks);

                // field access through a pointer to a struct dereferences
                let (base_ptr, def) = match base_slot.ty().pointee() {
                    Some(Type::Struct(def)) => (base_slot.clone(), def.clone()),
                    Some(Type::Ptr(inner)) => match inner.as_ref() {
                        Type::Struct(def) => {
                            let loaded = self.load(cur, &base_slot, selector.position)?;
                            (loaded, def.clone())
                        }
                        _ => {
                            return Err(CodegenError::new(
                                ErrorKind::TypeMismatch,
                                format!(
                                    "field access on non-struct type {}",
                                    base_slot.ty()
                                ),
                                selector.position,
                            ))
                        }
                    },
                    _ => {
                        return Err(CodegenError::new(
                            ErrorKind::TypeMismatch,
                            format!("field access on non-struct type {}", base_slot.ty()),
                            selector.position,
                        ))
                    }
                };

                let Some((ordinal, field_ty)) = def.compute_offset(&selector.field) else {
                    return Err(CodegenError::new(
                        ErrorKind::UndefinedName,
                        format!("field {} not found in type {}", selector.field, def.name),
                        selector.position,
                    ));
                };

                let result = self.frame.temp();
                self.frame.push(
                    cur,
                    Instruction::GetElementPtr {
                        result: result.clone(),
                        base_ty: Type::Struct(def),
                        ptr: base_ptr,
                        indices: vec![
                            Value::ConstInt(Type::Int(32), 0),
                            Value::ConstInt(Type::Int(32), ordinal as i64),
                        ],
                    },
                );
                Ok((Value::Local(result, field_ty.ptr()), new_blocks))
            }
            other => Err(CodegenError::new(
                ErrorKind::InvalidLValue,
                "expression does not denote a storage location",
                other.position(),
            )),
        }
    }

    // ------------------------------------------------------------------
    // composite literals
    // ------------------------------------------------------------------

    fn gen_composite(
        &mut self,
        block: BlockId,
        lit: &CompositeLit,
    ) -> CgResult<(Value, Vec<BlockId>)> {
        let ty = self.table.types.parse_type(&lit.ty)?;
        self.gen_composite_value(block, &ty, &lit.elements, lit.position)
    }

    fn gen_composite_value(
        &mut self,
        block: BlockId,
        ty: &Type,
        elements: &[KeyedElement],
        position: Position,
    ) -> CgResult<(Value, Vec<BlockId>)> {
        match ty {
            Type::Struct(def) => self.gen_struct_literal(block, def.clone(), elements, position),
            Type::Array(len, element) => {
                self.gen_array_literal(block, *len, element.as_ref().clone(), elements, position)
            }
            other => Err(CodegenError::new(
                ErrorKind::InvalidComposite,
                format!("composite literal of non-aggregate type {other}"),
                position,
            )),
        }
    }

    fn gen_struct_literal(
        &mut self,
        block: BlockId,
        def: StructRef,
        elements: &[KeyedElement],
        position: Position,
    ) -> CgResult<(Value, Vec<BlockId>)> {
        let ty = Type::Struct(def.clone());
        let slot_name = self.frame.named("slit");
        self.frame.push(
            block,
            Instruction::Alloca {
                result: slot_name.clone(),
                ty: ty.clone(),
            },
        );
        let slot = Value::Local(slot_name, ty.clone().ptr());
        self.frame.push(
            block,
            Instruction::Store {
                value: Value::ZeroAggregate(ty.clone()),
                ptr: slot.clone(),
            },
        );

        let mut new_blocks = vec![];
        let mut used = vec![];
        for (position_in_literal, element) in elements.iter().enumerate() {
            let cur = current_block(block, &new_blocks);
            let value = match &element.value {
                ElementValue::Expr(expr) => {
                    let (value, blocks) = self.gen_single(cur, expr)?;
                    new_blocks.extend(blocks);
                    value
                }
                ElementValue::Literal(_, nested_position) => {
                    return Err(CodegenError::new(
                        ErrorKind::InvalidComposite,
                        "nested struct literal values not supported yet",
                        *nested_position,
                    ))
                }
            };
            let cur = current_block(block, &new_blocks);

            let ordinal = match &element.key {
                Some(Expression::Ident(key)) => {
                    def.compute_offset(&key.name)
                        .ok_or_else(|| {
                            CodegenError::new(
                                ErrorKind::UndefinedName,
                                format!("field {} not found in type {}", key.name, def.name),
                                key.position,
                            )
                        })?
                        .0
                }
                Some(other) => {
                    return Err(CodegenError::new(
                        ErrorKind::InvalidComposite,
                        "struct literal keys must be field names",
                        other.position(),
                    ))
                }
                None => position_in_literal,
            };
            if ordinal >= def.fields.borrow().len() {
                return Err(CodegenError::new(
                    ErrorKind::InvalidComposite,
                    "too many elements in struct literal",
                    element.position,
                ));
            }
            if used.contains(&ordinal) {
                return Err(CodegenError::new(
                    ErrorKind::InvalidComposite,
                    "duplicate field name in struct literal",
                    element.position,
                ));
            }

            let field_ty = def.fields.borrow()[ordinal].ty.clone();
            let value = retype_nil(value, &field_ty);
            let field_ptr = self.frame.temp();
            self.frame.push(
                cur,
                Instruction::GetElementPtr {
                    result: field_ptr.clone(),
                    base_ty: ty.clone(),
                    ptr: slot.clone(),
                    indices: vec![
                        Value::ConstInt(Type::Int(32), 0),
                        Value::ConstInt(Type::Int(32), ordinal as i64),
                    ],
                },
            );
            self.frame.push(
                cur,
                Instruction::Store {
                    value,
                    ptr: Value::Local(field_ptr, field_ty.ptr()),
                },
            );
            used.push(ordinal);
        }

        let cur = current_block(block, &new_blocks);
        let value = self.load(cur, &slot, position)?;
        Ok((value, new_blocks))
    }

    fn gen_array_literal(
        &mut self,
        block: BlockId,
        len: u64,
        element_ty: Type,
        elements: &[KeyedElement],
        position: Position,
    ) -> CgResult<(Value, Vec<BlockId>)> {
        let ty = Type::Array(len, Box::new(element_ty.clone()));
        let slot_name = self.frame.named("alit");
        self.frame.push(
            block,
            Instruction::Alloca {
                result: slot_name.clone(),
                ty: ty.clone(),
            },
        );
        let slot = Value::Local(slot_name, ty.clone().ptr());
        self.frame.push(
            block,
            Instruction::Store {
                value: Value::ZeroAggregate(ty.clone()),
                ptr: slot.clone(),
            },
        );

        let mut new_blocks = vec![];
        let mut inited: Vec<i64> = vec![];
        let mut index: i64 = 0;
        for element in elements {
            let cur = current_block(block, &new_blocks);

            if let Some(key) = &element.key {
                index = match key {
                    Expression::IntLit(lit) => lit.value,
                    other => {
                        return Err(CodegenError::new(
                            ErrorKind::InvalidComposite,
                            "array literal keys must be integer literals",
                            other.position(),
                        ))
                    }
                };
            }
            if index < 0 || index >= len as i64 {
                return Err(CodegenError::new(
                    ErrorKind::InvalidComposite,
                    "literal array index out of bounds",
                    element.position,
                ));
            }
            if inited.contains(&index) {
                return Err(CodegenError::new(
                    ErrorKind::InvalidComposite,
                    "duplicate index in array literal",
                    element.position,
                ));
            }

            let value = match &element.value {
                ElementValue::Expr(expr) => {
                    let (value, blocks) = self.gen_single(cur, expr)?;
                    new_blocks.extend(blocks);
                    value
                }
                ElementValue::Literal(nested, nested_position) => {
                    let (value, blocks) =
                        self.gen_composite_value(cur, &element_ty, nested, *nested_position)?;
                    new_blocks.extend(blocks);
                    value
                }
            };
            let cur = current_block(block, &new_blocks);

            let value = retype_nil(value, &element_ty);
            let element_ptr = self.frame.temp();
            self.frame.push(
                cur,
                Instruction::GetElementPtr {
                    result: element_ptr.clone(),
                    base_ty: ty.clone(),
                    ptr: slot.clone(),
                    indices: vec![
                        Value::ConstInt(Type::Int(32), 0),
                        Value::ConstInt(Type::Int(32), index),
                    ],
                },
            );
            self.frame.push(
                cur,
                Instruction::Store {
                    value,
                    ptr: Value::Local(element_ptr, element_ty.clone().ptr()),
                },
            );
            inited.push(index);
            index += 1;
        }

        let cur = current_block(block, &new_blocks);
        let value = self.load(cur, &slot, position)?;
        Ok((value, new_blocks))
    }
}

/// An untyped nil adopts the pointer type its context expects.
pub(super) fn retype_nil(value: Value, target: &Type) -> Value {
    match (&value, target) {
        (Value::Null(_), Type::Ptr(_)) => Value::Null(target.clone()),
        _ => value,
    }
}
