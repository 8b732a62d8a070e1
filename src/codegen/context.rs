//! The code-generation session state.
use std::collections::HashMap;

use crate::llir::{
    Block, FuncType, Function, Global, GlobalInit, Instruction, Module, Param, Terminator, Type,
    Value,
};

use super::package::{FunctionDecl, PackageTable};
use super::scope::VariableContext;

pub type BlockId = usize;

/// Block arena and counters for the function currently being generated.
///
/// Blocks are created detached and identified by index; the layout order is
/// creation order, which keeps the entry block first and every branch target
/// present. Entry-block allocas collected during lowering are prepended to
/// the entry block when the frame is finished, so out-parameter temporaries
/// dominate every use.
#[derive(Debug, Default)]
pub struct FuncFrame {
    blocks: Vec<Block>,
    prologue: Vec<Instruction>,
    dead: Vec<BlockId>,
    tmp: usize,
    uid: usize,
}

impl FuncFrame {
    pub fn new() -> Self {
        let mut frame = FuncFrame::default();
        frame.blocks.push(Block::new("entry"));
        frame
    }

    pub fn entry(&self) -> BlockId {
        0
    }

    pub fn new_block(&mut self, label: impl ToString) -> BlockId {
        self.blocks.push(Block::new(label));
        self.blocks.len() - 1
    }

    /// A continuation block for statements following `goto`/`break`/
    /// `continue`; anything lowered into it is unreachable and dropped by
    /// the backend.
    pub fn new_dead_block(&mut self) -> BlockId {
        let uid = self.next_uid();
        let block = self.new_block(format!("dead.{uid}"));
        self.dead.push(block);
        block
    }

    pub fn is_dead(&self, block: BlockId) -> bool {
        self.dead.contains(&block)
    }

    pub fn push(&mut self, block: BlockId, inst: Instruction) {
        self.blocks[block].push(inst);
    }

    /// Terminate `block` unless it already has a terminator.
    pub fn terminate(&mut self, block: BlockId, term: Terminator) {
        self.blocks[block].terminate(term);
    }

    pub fn is_terminated(&self, block: BlockId) -> bool {
        self.blocks[block].is_terminated()
    }

    pub fn label(&self, block: BlockId) -> String {
        self.blocks[block].label.clone()
    }

    /// A fresh `%tN` temporary name.
    pub fn temp(&mut self) -> String {
        let name = format!("t{}", self.tmp);
        self.tmp += 1;
        name
    }

    /// A fresh uniquified name for a variable slot, e.g. `n.3`.
    pub fn named(&mut self, prefix: &str) -> String {
        let name = format!("{prefix}.{}", self.tmp);
        self.tmp += 1;
        name
    }

    pub fn next_uid(&mut self) -> usize {
        let uid = self.uid;
        self.uid += 1;
        uid
    }

    /// Allocate a slot in the entry block and return it as a pointer value.
    pub fn entry_alloca(&mut self, name: String, ty: Type) -> Value {
        self.prologue.push(Instruction::Alloca {
            result: name.clone(),
            ty: ty.clone(),
        });
        Value::Local(name, ty.ptr())
    }

    /// Append an instruction to the entry prologue (after the allocas
    /// collected so far).
    pub fn entry_prologue(&mut self, inst: Instruction) {
        self.prologue.push(inst);
    }

    pub fn finish(mut self, name: String, ret: Type, params: Vec<Param>, variadic: bool) -> Function {
        let prologue = std::mem::take(&mut self.prologue);
        self.blocks[0].insts.splice(0..0, prologue);
        Function {
            name,
            ret,
            params,
            variadic,
            blocks: self.blocks,
        }
    }
}

/// Session-wide generation state: the output module, pre-created function
/// signatures, the extern "special" functions, interned string literals and
/// the variable scope chain.
pub struct GenContext {
    pub module: Module,
    pub package_name: String,
    pub funcs: HashMap<String, FuncType>,
    pub decls: HashMap<String, FunctionDecl>,
    pub specials: HashMap<String, Value>,
    consts: HashMap<Vec<u8>, Value>,
    pub scope: VariableContext,
    pub gc_init: Value,
    pub gc_malloc: Value,
}

impl GenContext {
    pub fn new(table: &PackageTable) -> Self {
        let mut module = Module::default();

        let gc_init = extern_decl(&mut module, "GC_init", Type::Void, vec![], false);
        let gc_malloc = extern_decl(
            &mut module,
            "GC_malloc",
            Type::Int(8).ptr(),
            vec![Param {
                name: "size".into(),
                ty: Type::Int(64),
            }],
            false,
        );
        let printf = extern_decl(
            &mut module,
            "printf",
            Type::Int(32),
            vec![Param {
                name: "format".into(),
                ty: Type::Int(8).ptr(),
            }],
            true,
        );
        let scanf = extern_decl(
            &mut module,
            "scanf",
            Type::Int(32),
            vec![Param {
                name: "format".into(),
                ty: Type::Int(8).ptr(),
            }],
            true,
        );

        // the formatted print/scan pair is reachable both unqualified and
        // through the fmt import alias
        let mut specials = HashMap::new();
        specials.insert("printf".to_string(), printf.clone());
        specials.insert("scanf".to_string(), scanf.clone());
        specials.insert("fmt__Printf".to_string(), printf);
        specials.insert("fmt__Scanf".to_string(), scanf);

        // pre-create a handle for every collected free function
        let mut funcs = HashMap::new();
        let mut decls = HashMap::new();
        for (name, decl) in &table.functions {
            let (func_type, _) = ir_signature(decl);
            funcs.insert(name.clone(), func_type);
            decls.insert(name.clone(), decl.clone());
        }

        GenContext {
            module,
            package_name: table.name.clone(),
            funcs,
            decls,
            specials,
            consts: HashMap::new(),
            scope: VariableContext::new(),
            gc_init,
            gc_malloc,
        }
    }

    /// Resolve a bare callee name: extern specials first, then the
    /// package-qualified free functions.
    pub fn lookup_func(&self, name: &str) -> Option<(Value, Option<FunctionDecl>)> {
        if let Some(special) = self.specials.get(name) {
            return Some((special.clone(), None));
        }
        let qualified = format!("{}__{name}", self.package_name);
        self.funcs.get(&qualified).map(|func_type| {
            (
                Value::Func(qualified.clone(), func_type.clone()),
                self.decls.get(&qualified).cloned(),
            )
        })
    }

    /// Resolve `alias.member` through the import-alias convention
    /// `<alias>__<member>`.
    pub fn lookup_module_func(
        &self,
        alias: &str,
        member: &str,
    ) -> Option<(Value, Option<FunctionDecl>)> {
        let key = format!("{alias}__{member}");
        if let Some(special) = self.specials.get(&key) {
            return Some((special.clone(), None));
        }
        self.funcs.get(&key).map(|func_type| {
            (
                Value::Func(key.clone(), func_type.clone()),
                self.decls.get(&key).cloned(),
            )
        })
    }

    /// One global per distinct decoded literal; the payload is
    /// NUL-terminated and the value is the address of its first byte.
    pub fn intern_string(&mut self, decoded: &[u8]) -> Value {
        if let Some(existing) = self.consts.get(decoded) {
            return existing.clone();
        }
        let name = format!("str.{}", self.consts.len());
        let mut bytes = decoded.to_vec();
        bytes.push(0);
        let len = bytes.len() as u64;
        self.module.globals.push(Global {
            name: name.clone(),
            ty: Type::Array(len, Box::new(Type::Int(8))),
            init: GlobalInit::Bytes(bytes),
        });
        let value = Value::StrPtr { global: name, len };
        self.consts.insert(decoded.to_vec(), value.clone());
        value
    }
}

/// The IR-level signature for a declared function: one or zero declared
/// results map through directly; `k > 1` results return void and prepend `k`
/// pointer-typed out-parameters in declaration order.
pub fn ir_signature(decl: &FunctionDecl) -> (FuncType, Vec<Param>) {
    let mut params = vec![];
    let ret = if decl.rets.len() > 1 {
        for ret in &decl.rets {
            params.push(Param {
                name: ret.name.clone(),
                ty: ret.ty.clone().ptr(),
            });
        }
        Type::Void
    } else {
        decl.rets
            .first()
            .map(|ret| ret.ty.clone())
            .unwrap_or(Type::Void)
    };
    for arg in &decl.args {
        params.push(Param {
            name: arg.name.clone(),
            ty: arg.ty.clone(),
        });
    }
    let func_type = FuncType {
        ret: ret.clone(),
        params: params.iter().map(|param| param.ty.clone()).collect(),
        variadic: false,
    };
    (func_type, params)
}

fn extern_decl(
    module: &mut Module,
    name: &str,
    ret: Type,
    params: Vec<Param>,
    variadic: bool,
) -> Value {
    let function = Function {
        name: name.to_string(),
        ret,
        params,
        variadic,
        blocks: vec![],
    };
    let reference = function.reference();
    module.declares.push(function);
    reference
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_interning() {
        let table = PackageTable {
            name: "p".into(),
            imports: vec![],
            types: super::super::types::TypeManager::new(),
            functions: HashMap::new(),
            methods: HashMap::new(),
        };
        let mut ctx = GenContext::new(&table);
        let a = ctx.intern_string(b"hello");
        let b = ctx.intern_string(b"hello");
        let c = ctx.intern_string(b"world");
        assert_eq!(a.to_string(), b.to_string());
        assert_ne!(a.to_string(), c.to_string());
        assert_eq!(ctx.module.globals.len(), 2);
    }

    #[test]
    fn test_frame_prologue_prepended() {
        let mut frame = FuncFrame::new();
        let entry = frame.entry();
        frame.push(
            entry,
            Instruction::Store {
                value: Value::ConstInt(Type::Int(32), 1),
                ptr: Value::Local("x.0".into(), Type::Int(32).ptr()),
            },
        );
        frame.entry_alloca("x.0".into(), Type::Int(32));
        frame.terminate(entry, Terminator::Ret(None));
        let function = frame.finish("f".into(), Type::Void, vec![], false);
        assert!(matches!(
            function.blocks[0].insts[0],
            Instruction::Alloca { .. }
        ));
    }
}
