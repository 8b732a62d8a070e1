//! Synthesis of the module entry points: `<package>_init`,
//! `<package>_cleanup` and the real `main` wrapper.
use crate::llir::{Block, Function, Instruction, Terminator, Type, Value};

use super::error::{CgResult, CodegenError, ErrorKind};
use super::CodeGen;

impl CodeGen {
    pub(super) fn assemble(&mut self) -> CgResult<()> {
        let package = self.ctx.package_name.clone();

        // the init constructor was started before body generation: runtime
        // allocator init plus all global initializers in source order
        let init = self.init.take().expect("init frame not started");
        self.frame = init.frame;
        self.frame.terminate(init.block, Terminator::Ret(None));
        let init_name = format!("{package}_init");
        let frame = std::mem::take(&mut self.frame);
        let init_fn = frame.finish(init_name.clone(), Type::Void, vec![], false);
        let init_ref = init_fn.reference();
        self.ctx.module.defines.push(init_fn);

        // reserved for future global teardown
        let cleanup_name = format!("{package}_cleanup");
        let mut cleanup_entry = Block::new("entry");
        cleanup_entry.terminate(Terminator::Ret(None));
        let cleanup_fn = Function {
            name: cleanup_name,
            ret: Type::Void,
            params: vec![],
            variadic: false,
            blocks: vec![cleanup_entry],
        };
        let cleanup_ref = cleanup_fn.reference();
        self.ctx.module.defines.push(cleanup_fn);

        // main() -> i32: init, user main, cleanup, 0
        let user_main = format!("{package}__main");
        let Some(main_type) = self.ctx.funcs.get(&user_main).cloned() else {
            return Err(CodegenError::global(
                ErrorKind::MissingMain,
                format!("function {user_main} not defined"),
            ));
        };
        if !main_type.params.is_empty() {
            return Err(CodegenError::global(
                ErrorKind::MissingMain,
                "function main must not take arguments",
            ));
        }

        let mut entry = Block::new("entry");
        entry.push(Instruction::Call {
            result: None,
            callee: init_ref,
            args: vec![],
        });
        let result = match main_type.ret {
            Type::Void => None,
            _ => Some("t0".to_string()),
        };
        entry.push(Instruction::Call {
            result,
            callee: Value::Func(user_main, main_type),
            args: vec![],
        });
        entry.push(Instruction::Call {
            result: None,
            callee: cleanup_ref,
            args: vec![],
        });
        entry.terminate(Terminator::Ret(Some(Value::ConstInt(Type::Int(32), 0))));
        self.ctx.module.defines.push(Function {
            name: "main".into(),
            ret: Type::Int(32),
            params: vec![],
            variadic: false,
            blocks: vec![entry],
        });

        // user-named struct types go on the module last
        self.table.types.update_module(&mut self.ctx.module);
        Ok(())
    }
}
