//! The two-pass semantic lowering engine.
//!
//! Pass one collects the package symbol table (types, imports, function and
//! method signatures); pass two generates typed LLIR for global
//! initializers and every function body, then the assembler synthesizes the
//! init/cleanup/main trio and installs the collected type definitions.
mod assembler;
mod context;
mod control;
mod defer;
mod error;
mod expression;
mod package;
mod scope;
mod statement;
mod types;

pub use error::{CgResult, CodegenError, ErrorKind};
pub use package::{FunctionDecl, PackageTable};

use std::collections::HashMap;

use crate::ast::{Declaration, FunctionDef, SourceFile, TopLevelDecl};
use crate::llir::{Module, StructRef, Terminator, Value};

use self::context::{ir_signature, BlockId, FuncFrame, GenContext};
use self::control::{LabelManager, LoopLabels};
use self::defer::DeferState;
use self::scope::Binding;

/// Lower a parsed source file to an LLIR module.
pub fn generate(file: &SourceFile) -> CgResult<Module> {
    let table = PackageTable::collect(file)?;
    CodeGen::new(table).generate(file)
}

/// The block that subsequent instructions go into after a lowering step: the
/// last newly created block, or the one lowering started in.
fn current_block(block: BlockId, new_blocks: &[BlockId]) -> BlockId {
    new_blocks.last().copied().unwrap_or(block)
}

struct InitFrame {
    frame: FuncFrame,
    block: BlockId,
}

pub struct CodeGen {
    pub(crate) table: PackageTable,
    pub(crate) ctx: GenContext,
    pub(crate) frame: FuncFrame,
    pub(crate) loops: Vec<LoopLabels>,
    pub(crate) labels: LabelManager,
    pub(crate) defers: DeferState,
    pub(crate) defer_node: Option<StructRef>,
    pub(crate) defer_thunks: HashMap<String, (StructRef, Value)>,
    pub(crate) current: Option<FunctionDecl>,
    init: Option<InitFrame>,
}

impl CodeGen {
    pub fn new(table: PackageTable) -> Self {
        let ctx = GenContext::new(&table);
        CodeGen {
            table,
            ctx,
            frame: FuncFrame::default(),
            loops: vec![],
            labels: LabelManager::default(),
            defers: DeferState::default(),
            defer_node: None,
            defer_thunks: HashMap::new(),
            current: None,
            init: None,
        }
    }

    pub fn generate(mut self, file: &SourceFile) -> CgResult<Module> {
        // global initializers come first so every body sees the globals
        self.gen_globals(file)?;

        for decl in &file.decls {
            if let TopLevelDecl::Function(def) = decl {
                self.gen_function(def)?;
            }
            // method bodies are not lowered; only their signatures were
            // collected
        }

        self.assemble()?;
        Ok(self.ctx.module)
    }

    /// Lower all top-level var/const declarations into the start of the
    /// package init function, creating module globals and root-scope
    /// bindings as their types become known.
    fn gen_globals(&mut self, file: &SourceFile) -> CgResult<()> {
        self.frame = FuncFrame::new();
        let entry = self.frame.entry();

        // the conservative allocator is initialized before anything else
        self.frame.push(
            entry,
            crate::llir::Instruction::Call {
                result: None,
                callee: self.ctx.gc_init.clone(),
                args: vec![],
            },
        );

        let mut cur = entry;
        for decl in &file.decls {
            let TopLevelDecl::Declaration(declaration) = decl else {
                continue;
            };
            match declaration {
                Declaration::Var(specs) => {
                    for spec in specs {
                        cur = self.gen_global_spec(
                            cur,
                            &spec.names,
                            spec.ty.as_ref(),
                            &spec.values,
                            spec.position,
                            false,
                        )?;
                    }
                }
                Declaration::Const(specs) => {
                    for spec in specs {
                        cur = self.gen_global_spec(
                            cur,
                            &spec.names,
                            spec.ty.as_ref(),
                            &spec.values,
                            spec.position,
                            true,
                        )?;
                    }
                }
                Declaration::Type(_) => {
                    // already handled by the collection pass
                }
            }
        }

        self.init = Some(InitFrame {
            frame: std::mem::take(&mut self.frame),
            block: cur,
        });
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn gen_global_spec(
        &mut self,
        block: BlockId,
        names: &[String],
        ty: Option<&crate::ast::TypeExpr>,
        values: &[crate::ast::Expression],
        position: crate::ast::Position,
        values_required: bool,
    ) -> CgResult<BlockId> {
        let declared_ty = ty
            .map(|expr| self.table.types.parse_type(expr))
            .transpose()?;

        let mut new_blocks = vec![];
        let mut lowered = vec![];
        for expression in values {
            let cur = current_block(block, &new_blocks);
            let (produced, blocks) = self.gen_expr(cur, expression)?;
            new_blocks.extend(blocks);
            lowered.extend(produced);
        }
        if (values_required || !lowered.is_empty()) && lowered.len() != names.len() {
            return Err(CodegenError::new(
                ErrorKind::ArityMismatch,
                format!(
                    "declaration count mismatch: {} names, {} values",
                    names.len(),
                    lowered.len()
                ),
                position,
            ));
        }

        let cur = current_block(block, &new_blocks);
        for (i, name) in names.iter().enumerate() {
            if name == "_" {
                continue;
            }
            let value = lowered.get(i).cloned();
            let ty = match (&declared_ty, &value) {
                (Some(ty), _) => ty.clone(),
                (None, Some(value)) => value.ty(),
                (None, None) => {
                    return Err(CodegenError::new(
                        ErrorKind::UnknownType,
                        format!("missing type in declaration of {name}"),
                        position,
                    ))
                }
            };

            let global_name = self.table.qualify(name);
            self.ctx.module.globals.push(crate::llir::Global {
                name: global_name.clone(),
                ty: ty.clone(),
                init: crate::llir::GlobalInit::Zero,
            });
            let slot = Value::Global(global_name, ty.clone());
            if let Some(value) = value {
                let value = expression::retype_nil(value, &ty);
                self.frame.push(
                    cur,
                    crate::llir::Instruction::Store {
                        value,
                        ptr: slot.clone(),
                    },
                );
            }
            self.ctx
                .scope
                .add(name, Binding::Slot(slot))
                .map_err(|message| {
                    CodegenError::new(ErrorKind::DuplicateSymbol, message, position)
                })?;
        }
        Ok(current_block(block, &new_blocks))
    }

    fn gen_function(&mut self, def: &FunctionDef) -> CgResult<()> {
        let qualified = self.table.qualify(&def.name);
        let decl = self
            .table
            .functions
            .get(&qualified)
            .cloned()
            .expect("function body without collected signature");
        let (func_type, params) = ir_signature(&decl);

        self.frame = FuncFrame::new();
        self.labels.clear();
        self.defers.clear();
        self.loops.clear();
        self.current = Some(decl.clone());
        let entry = self.frame.entry();

        self.ctx.scope.push();
        let result = (|| {
            let out_params = decl.rets.len().min(params.len());
            if decl.rets.len() > 1 {
                // leading out-parameters are the return slots themselves
                for (ret, param) in decl.rets.iter().zip(&params[..out_params]) {
                    let slot = Value::Local(param.name.clone(), param.ty.clone());
                    self.ctx
                        .scope
                        .add(&ret.name, Binding::Slot(slot))
                        .map_err(|message| {
                            CodegenError::new(ErrorKind::DuplicateSymbol, message, def.position)
                        })?;
                }
            }
            let arg_params = if decl.rets.len() > 1 {
                &params[out_params..]
            } else {
                &params[..]
            };
            for (arg, param) in decl.args.iter().zip(arg_params) {
                let incoming = Value::Local(param.name.clone(), param.ty.clone());
                self.bind_local(entry, &arg.name, arg.ty.clone(), Some(incoming), def.position)?;
            }

            let new_blocks = self.gen_block(entry, &def.body)?;
            let last = current_block(entry, &new_blocks);

            if !self.frame.is_terminated(last) {
                if decl.rets.is_empty() {
                    // implicit trailing return, with the defer flush first
                    let flush = self.emit_defer_flush(last);
                    let end = current_block(last, &flush);
                    self.frame.terminate(end, Terminator::Ret(None));
                } else if self.frame.is_dead(last) {
                    // unreachable continuation after goto/break/return
                    let term = match decl.rets.len() {
                        1 => Terminator::Ret(Some(Value::zero(&decl.rets[0].ty))),
                        _ => Terminator::Ret(None),
                    };
                    self.frame.terminate(last, term);
                } else {
                    return Err(CodegenError::new(
                        ErrorKind::MissingReturn,
                        format!("missing return at end of function {}", def.name),
                        def.position,
                    ));
                }
            }

            self.labels.check_defined()
        })();
        self.ctx.scope.pop();
        result?;

        let frame = std::mem::take(&mut self.frame);
        let function = frame.finish(qualified, func_type.ret, params, false);
        self.ctx.module.defines.push(function);
        self.current = None;
        Ok(())
    }
}
