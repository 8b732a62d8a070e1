//! Control-flow lowering: if/else chains, the three for flavors, break and
//! continue through the loop stack, and labels with goto forward references.
use std::collections::HashMap;

use crate::ast::{
    ClauseFor, Expression, ForStatement, GotoStatement, IfStatement, InfiniteFor,
    LabeledStatement, Position, WhileFor,
};
use crate::llir::Terminator;

use super::context::{BlockId, FuncFrame};
use super::error::{CgResult, CodegenError, ErrorKind};
use super::{current_block, CodeGen};

/// Branch targets of the innermost enclosing loop: where `continue` goes
/// (condition or post block) and where `break` goes.
#[derive(Debug, Clone)]
pub struct LoopLabels {
    pub continue_to: String,
    pub break_to: String,
}

/// Labels of the current function, in two states: defined (the block is
/// materialized and branched into) or forward-referenced by a goto that ran
/// ahead of the definition.
#[derive(Debug, Default)]
pub struct LabelManager {
    labels: HashMap<String, SmartLabel>,
}

#[derive(Debug)]
struct SmartLabel {
    block: BlockId,
    forward: bool,
    position: Position,
}

impl LabelManager {
    pub fn clear(&mut self) {
        self.labels.clear();
    }

    /// Materialize a label definition: reuse the forward placeholder if a
    /// goto created one, otherwise make a fresh block.
    fn define(
        &mut self,
        frame: &mut FuncFrame,
        label: &str,
        position: Position,
    ) -> CgResult<BlockId> {
        if let Some(existing) = self.labels.get_mut(label) {
            if !existing.forward {
                return Err(CodegenError::new(
                    ErrorKind::DuplicateLabel,
                    format!("label {label} already defined"),
                    position,
                ));
            }
            existing.forward = false;
            return Ok(existing.block);
        }
        let block = frame.new_block(format!("label.{label}"));
        self.labels.insert(
            label.to_string(),
            SmartLabel {
                block,
                forward: false,
                position,
            },
        );
        Ok(block)
    }

    /// The target block of a goto, created as a forward reference when the
    /// label has not been defined yet.
    fn mention(&mut self, frame: &mut FuncFrame, label: &str, position: Position) -> BlockId {
        if let Some(existing) = self.labels.get(label) {
            return existing.block;
        }
        let block = frame.new_block(format!("label.forward.{label}"));
        self.labels.insert(
            label.to_string(),
            SmartLabel {
                block,
                forward: true,
                position,
            },
        );
        block
    }

    /// Any label still in the forward state at function end was never
    /// defined.
    pub fn check_defined(&self) -> CgResult<()> {
        for (label, entry) in &self.labels {
            if entry.forward {
                return Err(CodegenError::new(
                    ErrorKind::UndefinedLabel,
                    format!("label {label} not defined"),
                    entry.position,
                ));
            }
        }
        Ok(())
    }
}

impl CodeGen {
    pub(super) fn gen_if(&mut self, block: BlockId, stmt: &IfStatement) -> CgResult<Vec<BlockId>> {
        let mut new_blocks = vec![];
        let (cond, blocks) = self.gen_single(block, &stmt.condition)?;
        new_blocks.extend(blocks);
        let cur = current_block(block, &new_blocks);
        if !cond.ty().is_bool() {
            return Err(CodegenError::new(
                ErrorKind::TypeMismatch,
                "if condition must have boolean type",
                stmt.condition.position(),
            ));
        }

        let uid = self.frame.next_uid();
        let btrue = self.frame.new_block(format!("btrue.{uid}"));
        let bfalse = self.frame.new_block(format!("bfalse.{uid}"));
        self.frame.terminate(
            cur,
            Terminator::CondBr(cond, self.frame.label(btrue), self.frame.label(bfalse)),
        );

        new_blocks.push(btrue);
        let true_blocks = self.gen_block(btrue, &stmt.then_block)?;
        new_blocks.extend(true_blocks);
        let true_end = current_block(block, &new_blocks);

        new_blocks.push(bfalse);
        if let Some(else_branch) = &stmt.else_branch {
            let blocks = match else_branch {
                crate::ast::ElseBranch::If(nested) => self.gen_if(bfalse, nested)?,
                crate::ast::ElseBranch::Block(body) => self.gen_block(bfalse, body)?,
            };
            new_blocks.extend(blocks);
        }
        let false_end = current_block(block, &new_blocks);

        // only open sides need the join block
        if !self.frame.is_terminated(true_end) || !self.frame.is_terminated(false_end) {
            let bend = self.frame.new_block(format!("bend.{uid}"));
            let bend_label = self.frame.label(bend);
            self.frame.terminate(true_end, Terminator::Br(bend_label.clone()));
            self.frame.terminate(false_end, Terminator::Br(bend_label));
            new_blocks.push(bend);
        }

        Ok(new_blocks)
    }

    pub(super) fn gen_for(&mut self, block: BlockId, stmt: &ForStatement) -> CgResult<Vec<BlockId>> {
        self.ctx.scope.push();
        let result = match stmt {
            ForStatement::While(while_for) => self.gen_while_loop(block, while_for),
            ForStatement::Clause(clause_for) => self.gen_claused_loop(block, clause_for),
            ForStatement::Infinite(infinite) => self.gen_endless_loop(block, infinite),
            ForStatement::Range(range_for) => Err(CodegenError::new(
                ErrorKind::Unimplemented,
                "range for loop not implemented yet",
                range_for.position,
            )),
        };
        self.ctx.scope.pop();
        result
    }

    fn gen_loop_condition(
        &mut self,
        block: BlockId,
        condition: &Expression,
    ) -> CgResult<(crate::llir::Value, Vec<BlockId>)> {
        let (value, blocks) = self.gen_single(block, condition)?;
        if !value.ty().is_bool() {
            return Err(CodegenError::new(
                ErrorKind::TypeMismatch,
                "for condition must have boolean type",
                condition.position(),
            ));
        }
        Ok((value, blocks))
    }

    fn gen_while_loop(&mut self, block: BlockId, stmt: &WhileFor) -> CgResult<Vec<BlockId>> {
        let uid = self.frame.next_uid();
        let cond = self.frame.new_block(format!("while.cond.{uid}"));
        let body = self.frame.new_block(format!("while.body.{uid}"));
        let end = self.frame.new_block(format!("while.end.{uid}"));
        self.loops.push(LoopLabels {
            continue_to: self.frame.label(cond),
            break_to: self.frame.label(end),
        });

        let mut new_blocks = vec![cond];
        self.frame.terminate(block, Terminator::Br(self.frame.label(cond)));

        let result = (|| {
            let (value, blocks) = self.gen_loop_condition(cond, &stmt.condition)?;
            new_blocks.extend(blocks);
            let cur = current_block(block, &new_blocks);
            self.frame.terminate(
                cur,
                Terminator::CondBr(value, self.frame.label(body), self.frame.label(end)),
            );

            new_blocks.push(body);
            let blocks = self.gen_block(body, &stmt.body)?;
            new_blocks.extend(blocks);
            let cur = current_block(block, &new_blocks);
            self.frame.terminate(cur, Terminator::Br(self.frame.label(cond)));

            new_blocks.push(end);
            Ok(std::mem::take(&mut new_blocks))
        })();
        self.loops.pop();
        result
    }

    fn gen_claused_loop(&mut self, block: BlockId, stmt: &ClauseFor) -> CgResult<Vec<BlockId>> {
        let mut new_blocks = vec![];

        if let Some(init) = &stmt.init {
            let blocks = self.gen_simple(block, init)?;
            new_blocks.extend(blocks);
        }
        let after_init = current_block(block, &new_blocks);

        let uid = self.frame.next_uid();
        let cond = self.frame.new_block(format!("for.cond.{uid}"));
        let body = self.frame.new_block(format!("for.body.{uid}"));
        let post = self.frame.new_block(format!("for.post.{uid}"));
        let end = self.frame.new_block(format!("for.end.{uid}"));
        self.loops.push(LoopLabels {
            continue_to: self.frame.label(post),
            break_to: self.frame.label(end),
        });

        let result = (|| {
            new_blocks.push(cond);
            self.frame
                .terminate(after_init, Terminator::Br(self.frame.label(cond)));
            let (value, blocks) = self.gen_loop_condition(cond, &stmt.condition)?;
            new_blocks.extend(blocks);
            let cur = current_block(block, &new_blocks);
            self.frame.terminate(
                cur,
                Terminator::CondBr(value, self.frame.label(body), self.frame.label(end)),
            );

            new_blocks.push(body);
            let blocks = self.gen_block(body, &stmt.body)?;
            new_blocks.extend(blocks);
            let cur = current_block(block, &new_blocks);
            // the body falls through to the post statement
            self.frame.terminate(cur, Terminator::Br(self.frame.label(post)));

            new_blocks.push(post);
            if let Some(post_stmt) = &stmt.post {
                let blocks = self.gen_simple(post, post_stmt)?;
                new_blocks.extend(blocks);
            }
            let cur = current_block(block, &new_blocks);
            self.frame.terminate(cur, Terminator::Br(self.frame.label(cond)));

            new_blocks.push(end);
            Ok(std::mem::take(&mut new_blocks))
        })();
        self.loops.pop();
        result
    }

    fn gen_endless_loop(&mut self, block: BlockId, stmt: &InfiniteFor) -> CgResult<Vec<BlockId>> {
        let uid = self.frame.next_uid();
        let uroboros = self.frame.new_block(format!("uroboros.{uid}"));
        let end = self.frame.new_block(format!("uroboros.end.{uid}"));
        self.loops.push(LoopLabels {
            continue_to: self.frame.label(uroboros),
            break_to: self.frame.label(end),
        });

        let mut new_blocks = vec![uroboros];
        self.frame
            .terminate(block, Terminator::Br(self.frame.label(uroboros)));

        let result = (|| {
            let blocks = self.gen_block(uroboros, &stmt.body)?;
            new_blocks.extend(blocks);
            let cur = current_block(block, &new_blocks);
            self.frame
                .terminate(cur, Terminator::Br(self.frame.label(uroboros)));
            new_blocks.push(end);
            Ok(std::mem::take(&mut new_blocks))
        })();
        self.loops.pop();
        result
    }

    pub(super) fn gen_break(&mut self, block: BlockId, position: Position) -> CgResult<Vec<BlockId>> {
        let Some(labels) = self.loops.last() else {
            return Err(CodegenError::new(
                ErrorKind::ParseRejected,
                "break outside loop",
                position,
            ));
        };
        self.frame
            .terminate(block, Terminator::Br(labels.break_to.clone()));
        Ok(vec![])
    }

    pub(super) fn gen_continue(
        &mut self,
        block: BlockId,
        position: Position,
    ) -> CgResult<Vec<BlockId>> {
        let Some(labels) = self.loops.last() else {
            return Err(CodegenError::new(
                ErrorKind::ParseRejected,
                "continue outside loop",
                position,
            ));
        };
        self.frame
            .terminate(block, Terminator::Br(labels.continue_to.clone()));
        Ok(vec![])
    }

    pub(super) fn gen_labeled(
        &mut self,
        block: BlockId,
        stmt: &LabeledStatement,
    ) -> CgResult<Vec<BlockId>> {
        let label_block = self
            .labels
            .define(&mut self.frame, &stmt.label, stmt.position)?;
        self.frame
            .terminate(block, Terminator::Br(self.frame.label(label_block)));

        let mut new_blocks = vec![label_block];
        let blocks = self.gen_statement(label_block, &stmt.statement)?;
        new_blocks.extend(blocks);
        Ok(new_blocks)
    }

    /// Statements after a goto lower into a fresh block the backend drops as
    /// unreachable.
    pub(super) fn gen_goto(&mut self, block: BlockId, stmt: &GotoStatement) -> CgResult<Vec<BlockId>> {
        let target = self
            .labels
            .mention(&mut self.frame, &stmt.label, stmt.position);
        self.frame
            .terminate(block, Terminator::Br(self.frame.label(target)));
        Ok(vec![self.frame.new_dead_block()])
    }
}
