//! Comparisons and conditional branches.
//!
//! A conditional branch ends the block: operands are popped, the remaining frame is spilled so
//! both successors see a slot-resident entry state, the two-way branch is emitted with both the
//! target and the fall-through bci, and both successors are queued.

use bytecode::PrimitiveType;

use crate::codegen::{CodeGenerator, Condition, NanBias};
use crate::compile::{Flow, MethodCompiler};
use crate::error::CompileError;
use crate::runtime::Runtime;

impl<'a, G: CodeGenerator, R: Runtime> MethodCompiler<'a, G, R> {
    /// lcmp / fcmpl / fcmpg / dcmpl / dcmpg: pop two, push a single-word int.
    pub(super) fn do_compare(
        &mut self,
        kind: PrimitiveType,
        nan: NanBias,
    ) -> Result<(), CompileError> {
        let y = self.frame.pop_kind(kind)?;
        let x = self.frame.pop_kind(kind)?;
        let result = self.gen.gen_compare(kind, nan, x, y)?;
        Ok(self.frame.push1(result)?)
    }

    pub(super) fn do_if_zero(&mut self, cond: Condition) -> Result<Flow, CompileError> {
        let target = self.stream.read_branch_dest()?;
        let fall_through = self.stream.next_bci();
        let x = self.frame.pop1()?;
        self.frame.spill_all(&mut self.gen, true)?;
        self.gen.gen_if_zero(cond, x, target, fall_through)?;
        self.end_conditional(target, fall_through)
    }

    pub(super) fn do_if_same(
        &mut self,
        cond: Condition,
        kind: PrimitiveType,
    ) -> Result<Flow, CompileError> {
        let target = self.stream.read_branch_dest()?;
        let fall_through = self.stream.next_bci();
        let y = self.frame.pop1()?;
        let x = self.frame.pop1()?;
        self.frame.spill_all(&mut self.gen, true)?;
        self.gen.gen_if_same(cond, kind, x, y, target, fall_through)?;
        self.end_conditional(target, fall_through)
    }

    pub(super) fn do_if_null(&mut self, cond: Condition) -> Result<Flow, CompileError> {
        let target = self.stream.read_branch_dest()?;
        let fall_through = self.stream.next_bci();
        let x = self.frame.pop1()?;
        self.frame.spill_all(&mut self.gen, true)?;
        self.gen.gen_if_null(cond, x, target, fall_through)?;
        self.end_conditional(target, fall_through)
    }

    /// Queue both successors of a two-way branch. The taken side was named in the emitted
    /// branch; the fall-through side additionally needs a jump when its block already exists,
    /// because it will not be the next block emitted.
    fn end_conditional(&mut self, target: u32, fall_through: u32) -> Result<Flow, CompileError> {
        self.enqueue_target(target);
        if self.enqueue_target(fall_through) {
            self.gen.gen_goto(fall_through)?;
        }
        Ok(Flow::End)
    }
}
