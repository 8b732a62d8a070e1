//! Lowering of `defer` statements.
//!
//! Each function keeps a stack-allocated head pointer to a linked list of
//! heap records `{ thunk, args blob, next }`. A defer site evaluates its
//! arguments immediately, packs them into a per-callee args struct allocated
//! through the runtime allocator, and prepends a node; every return site
//! walks the list and invokes each thunk, giving LIFO order and defer-time
//! argument capture.
use crate::ast::{DeferStatement, Expression};
use crate::llir::{
    Block, FuncType, Function, Instruction, IPred, Param, StructDef, StructField, StructRef,
    Terminator, Type, Value,
};

use super::context::BlockId;
use super::error::{CgResult, CodegenError, ErrorKind};
use super::expression::retype_nil;
use super::{current_block, CodeGen};

/// Per-function defer state plus the lazily created module-level machinery.
#[derive(Default)]
pub struct DeferState {
    /// Slot holding the list head in the current function.
    pub head: Option<Value>,
    /// Defer sites lowered so far in the current function.
    pub count: usize,
}

impl DeferState {
    pub fn clear(&mut self) {
        self.head = None;
        self.count = 0;
    }
}

impl CodeGen {
    /// The `__defer_node` record type: `{ void(i8*)* thunk, i8* args,
    /// %__defer_node* next }`.
    fn defer_node_type(&mut self) -> StructRef {
        if let Some(def) = &self.defer_node {
            return def.clone();
        }
        let def = StructDef::placeholder("__defer_node");
        let thunk_ty = Type::Func(Box::new(FuncType {
            ret: Type::Void,
            params: vec![Type::Int(8).ptr()],
            variadic: false,
        }))
        .ptr();
        *def.fields.borrow_mut() = vec![
            StructField {
                name: "thunk".into(),
                ty: thunk_ty,
            },
            StructField {
                name: "args".into(),
                ty: Type::Int(8).ptr(),
            },
            StructField {
                name: "next".into(),
                ty: Type::Struct(def.clone()).ptr(),
            },
        ];
        self.ctx.module.typedefs.push(def.clone());
        self.defer_node = Some(def.clone());
        def
    }

    /// The head slot of the current function, allocated and nulled in the
    /// entry block on first use.
    fn defer_head(&mut self) -> Value {
        if let Some(head) = &self.defers.head {
            return head.clone();
        }
        let node_ptr = Type::Struct(self.defer_node_type()).ptr();
        let name = self.frame.named("defer.head");
        let head = self.frame.entry_alloca(name, node_ptr.clone());
        self.frame.entry_prologue(Instruction::Store {
            value: Value::Null(node_ptr),
            ptr: head.clone(),
        });
        self.defers.head = Some(head.clone());
        head
    }

    /// The per-callee args struct and wrapper thunk, created on the first
    /// defer of that callee.
    fn defer_thunk(
        &mut self,
        callee: &Value,
        decl: Option<&super::package::FunctionDecl>,
        arg_types: &[Type],
    ) -> CgResult<(StructRef, Value)> {
        let Value::Func(callee_name, _) = callee else {
            unreachable!("defer callee resolved to a non-function");
        };
        if let Some(cached) = self.defer_thunks.get(callee_name) {
            return Ok(cached.clone());
        }

        let frame_def = StructDef::placeholder(format!("__df_{callee_name}"));
        *frame_def.fields.borrow_mut() = arg_types
            .iter()
            .enumerate()
            .map(|(i, ty)| StructField {
                name: format!("arg{i}"),
                ty: ty.clone(),
            })
            .collect();
        self.ctx.module.typedefs.push(frame_def.clone());

        let wrapper = self.build_defer_wrapper(callee, decl, &frame_def, arg_types);
        let reference = wrapper.reference();
        self.ctx.module.defines.push(wrapper);

        let entry = (frame_def, reference);
        self.defer_thunks
            .insert(callee_name.clone(), entry.clone());
        Ok(entry)
    }

    /// `__df_wrpr_<callee>(args: i8*)`: cast the blob back to the args
    /// struct, reload every captured argument and invoke the real callee.
    /// Multi-return callees get throwaway out-parameter slots.
    fn build_defer_wrapper(
        &self,
        callee: &Value,
        decl: Option<&super::package::FunctionDecl>,
        frame_def: &StructRef,
        arg_types: &[Type],
    ) -> Function {
        let Value::Func(callee_name, callee_ty) = callee else {
            unreachable!("defer callee resolved to a non-function");
        };
        let frame_ty = Type::Struct(frame_def.clone());
        let mut entry = Block::new("entry");
        let mut tmp = 0;
        let mut temp = || {
            let name = format!("t{tmp}");
            tmp += 1;
            name
        };

        let frame_ptr = temp();
        entry.push(Instruction::Bitcast {
            result: frame_ptr.clone(),
            value: Value::Local("args".into(), Type::Int(8).ptr()),
            ty: frame_ty.clone().ptr(),
        });
        let frame_ptr = Value::Local(frame_ptr, frame_ty.clone().ptr());

        let mut call_args = vec![];
        if let Some(decl) = decl {
            if decl.rets.len() > 1 {
                // the deferred call's results are discarded
                for (i, ret) in decl.rets.iter().enumerate() {
                    let slot = format!("discard{i}");
                    entry.push(Instruction::Alloca {
                        result: slot.clone(),
                        ty: ret.ty.clone(),
                    });
                    call_args.push(Value::Local(slot, ret.ty.clone().ptr()));
                }
            }
        }
        for (i, ty) in arg_types.iter().enumerate() {
            let field_ptr = temp();
            entry.push(Instruction::GetElementPtr {
                result: field_ptr.clone(),
                base_ty: frame_ty.clone(),
                ptr: frame_ptr.clone(),
                indices: vec![
                    Value::ConstInt(Type::Int(32), 0),
                    Value::ConstInt(Type::Int(32), i as i64),
                ],
            });
            let loaded = temp();
            entry.push(Instruction::Load {
                result: loaded.clone(),
                ty: ty.clone(),
                ptr: Value::Local(field_ptr, ty.clone().ptr()),
            });
            call_args.push(Value::Local(loaded, ty.clone()));
        }

        let result = if callee_ty.ret == Type::Void {
            None
        } else {
            Some(temp())
        };
        entry.push(Instruction::Call {
            result,
            callee: callee.clone(),
            args: call_args,
        });
        entry.terminate(Terminator::Ret(None));

        Function {
            name: format!("__df_wrpr_{callee_name}"),
            ret: Type::Void,
            params: vec![Param {
                name: "args".into(),
                ty: Type::Int(8).ptr(),
            }],
            variadic: false,
            blocks: vec![entry],
        }
    }

    pub(super) fn gen_defer(
        &mut self,
        block: BlockId,
        stmt: &DeferStatement,
    ) -> CgResult<Vec<BlockId>> {
        // only a plain function call can be deferred
        let Expression::Call(call) = &stmt.call else {
            return Err(CodegenError::new(
                ErrorKind::ParseRejected,
                "defer statement must be a function or method call",
                stmt.position,
            ));
        };

        let (callee, decl) = match call.callee.as_ref() {
            Expression::Ident(ident) => {
                self.ctx.lookup_func(&ident.name).ok_or_else(|| {
                    CodegenError::new(
                        ErrorKind::UndefinedName,
                        format!("function {} not defined", ident.name),
                        ident.position,
                    )
                })?
            }
            Expression::Selector(selector) => {
                self.resolve_module_member(selector).ok_or_else(|| {
                    CodegenError::new(
                        ErrorKind::Unimplemented,
                        "method calls not supported",
                        selector.position,
                    )
                })?
            }
            other => {
                return Err(CodegenError::new(
                    ErrorKind::Unimplemented,
                    "unsupported defer target",
                    other.position(),
                ))
            }
        };

        // capture semantics: the arguments are evaluated here and now
        let mut new_blocks = vec![];
        let mut args = vec![];
        for arg in &call.args {
            let cur = current_block(block, &new_blocks);
            let (value, blocks) = self.gen_single(cur, arg)?;
            new_blocks.extend(blocks);
            args.push(value);
        }
        if let Some(decl) = &decl {
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
        }
        let cur = current_block(block, &new_blocks);

        let arg_types: Vec<Type> = args.iter().map(Value::ty).collect();
        let node_def = self.defer_node_type();
        let node_ty = Type::Struct(node_def.clone());
        let head = self.defer_head();
        let (frame_def, wrapper) = self.defer_thunk(&callee, decl.as_ref(), &arg_types)?;
        let frame_ty = Type::Struct(frame_def.clone());

        if frame_def.fields.borrow().len() != args.len() {
            return Err(CodegenError::new(
                ErrorKind::Unimplemented,
                "deferred callee used with differing argument shapes",
                call.position,
            ));
        }

        let node_size = node_ty.byte_size().unwrap_or(24);
        let frame_size = frame_ty.byte_size().unwrap_or(0);

        // node and argument blob live on the runtime heap
        let node_raw = self.emit_gc_malloc(cur, node_size);
        let node = self.emit_bitcast(cur, node_raw, node_ty.clone().ptr());
        let blob_raw = self.emit_gc_malloc(cur, frame_size);
        let blob = self.emit_bitcast(cur, blob_raw.clone(), frame_ty.clone().ptr());

        for (i, value) in args.into_iter().enumerate() {
            let field_ty = frame_def.fields.borrow()[i].ty.clone();
            let field_ptr = self.emit_gep(cur, frame_ty.clone(), blob.clone(), i as i64);
            self.frame.push(
                cur,
                Instruction::Store {
                    value,
                    ptr: Value::Local(field_ptr, field_ty.ptr()),
                },
            );
        }

        let thunk_ty = node_def.fields.borrow()[0].ty.clone();
        let thunk_ptr = self.emit_gep(cur, node_ty.clone(), node.clone(), 0);
        self.frame.push(
            cur,
            Instruction::Store {
                value: wrapper,
                ptr: Value::Local(thunk_ptr, thunk_ty.ptr()),
            },
        );
        let args_ptr = self.emit_gep(cur, node_ty.clone(), node.clone(), 1);
        self.frame.push(
            cur,
            Instruction::Store {
                value: blob_raw,
                ptr: Value::Local(args_ptr, Type::Int(8).ptr().ptr()),
            },
        );

        // prepend: node.next = head; head = node
        let old_head = self.load(cur, &head, stmt.position)?;
        let next_ptr = self.emit_gep(cur, node_ty.clone(), node.clone(), 2);
        self.frame.push(
            cur,
            Instruction::Store {
                value: old_head,
                ptr: Value::Local(next_ptr, node_ty.clone().ptr().ptr()),
            },
        );
        self.frame.push(
            cur,
            Instruction::Store {
                value: node,
                ptr: head,
            },
        );

        self.defers.count += 1;
        Ok(new_blocks)
    }

    /// Walk the defer list at a function-exit point. Emits nothing when the
    /// function has no defers so far; otherwise three blocks whose last one
    /// receives the actual return.
    pub(super) fn emit_defer_flush(&mut self, block: BlockId) -> Vec<BlockId> {
        if self.defers.count == 0 {
            return vec![];
        }
        let head = self.defer_head();
        let node_def = self.defer_node_type();
        let node_ty = Type::Struct(node_def.clone());
        let node_ptr_ty = node_ty.clone().ptr();

        let uid = self.frame.next_uid();
        let cond = self.frame.new_block(format!("defer.cond.{uid}"));
        let body = self.frame.new_block(format!("defer.body.{uid}"));
        let end = self.frame.new_block(format!("defer.end.{uid}"));

        self.frame.terminate(block, Terminator::Br(self.frame.label(cond)));

        // while head != null
        let current = {
            let result = self.frame.temp();
            self.frame.push(
                cond,
                Instruction::Load {
                    result: result.clone(),
                    ty: node_ptr_ty.clone(),
                    ptr: head.clone(),
                },
            );
            Value::Local(result, node_ptr_ty.clone())
        };
        let is_null = self.frame.temp();
        self.frame.push(
            cond,
            Instruction::ICmp {
                result: is_null.clone(),
                pred: IPred::Eq,
                lhs: current.clone(),
                rhs: Value::Null(node_ptr_ty.clone()),
            },
        );
        self.frame.terminate(
            cond,
            Terminator::CondBr(
                Value::Local(is_null, Type::BOOL),
                self.frame.label(end),
                self.frame.label(body),
            ),
        );

        // call node.thunk(node.args), then advance head
        let thunk_ty = node_def.fields.borrow()[0].ty.clone();
        let thunk_ptr = self.emit_gep(body, node_ty.clone(), current.clone(), 0);
        let thunk = self.frame.temp();
        self.frame.push(
            body,
            Instruction::Load {
                result: thunk.clone(),
                ty: thunk_ty.clone(),
                ptr: Value::Local(thunk_ptr, thunk_ty.clone().ptr()),
            },
        );
        let args_ptr = self.emit_gep(body, node_ty.clone(), current.clone(), 1);
        let args = self.frame.temp();
        self.frame.push(
            body,
            Instruction::Load {
                result: args.clone(),
                ty: Type::Int(8).ptr(),
                ptr: Value::Local(args_ptr, Type::Int(8).ptr().ptr()),
            },
        );
        self.frame.push(
            body,
            Instruction::Call {
                result: None,
                callee: Value::Local(thunk, thunk_ty),
                args: vec![Value::Local(args, Type::Int(8).ptr())],
            },
        );
        let next_ptr = self.emit_gep(body, node_ty.clone(), current, 2);
        let next = self.frame.temp();
        self.frame.push(
            body,
            Instruction::Load {
                result: next.clone(),
                ty: node_ptr_ty.clone(),
                ptr: Value::Local(next_ptr, node_ptr_ty.clone().ptr()),
            },
        );
        self.frame.push(
            body,
            Instruction::Store {
                value: Value::Local(next, node_ptr_ty),
                ptr: head,
            },
        );
        self.frame.terminate(body, Terminator::Br(self.frame.label(cond)));

        vec![cond, body, end]
    }

    fn emit_gc_malloc(&mut self, block: BlockId, size: i64) -> Value {
        let result = self.frame.temp();
        self.frame.push(
            block,
            Instruction::Call {
                result: Some(result.clone()),
                callee: self.ctx.gc_malloc.clone(),
                args: vec![Value::ConstInt(Type::Int(64), size)],
            },
        );
        Value::Local(result, Type::Int(8).ptr())
    }

    fn emit_bitcast(&mut self, block: BlockId, value: Value, ty: Type) -> Value {
        let result = self.frame.temp();
        self.frame.push(
            block,
            Instruction::Bitcast {
                result: result.clone(),
                value,
                ty: ty.clone(),
            },
        );
        Value::Local(result, ty)
    }

    fn emit_gep(&mut self, block: BlockId, base_ty: Type, ptr: Value, index: i64) -> String {
        let result = self.frame.temp();
        self.frame.push(
            block,
            Instruction::GetElementPtr {
                result: result.clone(),
                base_ty,
                ptr,
                indices: vec![
                    Value::ConstInt(Type::Int(32), 0),
                    Value::ConstInt(Type::Int(32), index),
                ],
            },
        );
        result
    }
}
