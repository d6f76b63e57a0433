//! Unconditional control transfer: goto, jsr/ret, the switches, returns and throw. Every
//! instruction here ends the current block.

use bytecode::{LookupSwitch, TableSwitch};

use crate::codegen::CodeGenerator;
use crate::compile::{Flow, MethodCompiler};
use crate::error::CompileError;
use crate::runtime::Runtime;

impl<'a, G: CodeGenerator, R: Runtime> MethodCompiler<'a, G, R> {
    pub(super) fn do_goto(&mut self, far: bool) -> Result<Flow, CompileError> {
        let target = if far {
            self.stream.read_far_branch_dest()?
        } else {
            self.stream.read_branch_dest()?
        };
        self.frame.spill_all(&mut self.gen, true)?;
        self.gen.gen_goto(target)?;
        self.enqueue_target(target);
        Ok(Flow::End)
    }

    /// jsr and jsr_w behave identically: emit the jump, push the returnAddress register, queue
    /// the subroutine entry, end the block.
    pub(super) fn do_jsr(&mut self, far: bool) -> Result<Flow, CompileError> {
        let target = if far {
            self.stream.read_far_branch_dest()?
        } else {
            self.stream.read_branch_dest()?
        };
        self.frame.spill_all(&mut self.gen, true)?;
        let return_address = self.gen.gen_jsr(target)?;
        self.frame.push1(return_address)?;
        self.enqueue_target(target);
        Ok(Flow::End)
    }

    /// ret jumps through the returnAddress stored in a local. Its targets are not statically
    /// known, so nothing is queued; the after-jsr blocks are only compiled when some other edge
    /// reaches them.
    pub(super) fn do_ret(&mut self) -> Result<Flow, CompileError> {
        let index = self.stream.read_local_index()? as usize;
        let target = self.frame.local(index)?;
        self.gen.gen_ret(target)?;
        Ok(Flow::End)
    }

    pub(super) fn do_tableswitch(&mut self, bci: u32) -> Result<Flow, CompileError> {
        let table = TableSwitch::decode(self.stream.code(), bci)?;
        let key = self.frame.pop1()?;
        self.frame.spill_all(&mut self.gen, true)?;
        self.gen.gen_tableswitch(key, &table)?;
        for target in table.targets.iter().copied() {
            self.enqueue_target(target);
        }
        self.enqueue_target(table.default_target);
        Ok(Flow::End)
    }

    pub(super) fn do_lookupswitch(&mut self, bci: u32) -> Result<Flow, CompileError> {
        let table = LookupSwitch::decode(self.stream.code(), bci)?;
        let key = self.frame.pop1()?;
        self.frame.spill_all(&mut self.gen, true)?;
        self.gen.gen_lookupswitch(key, &table)?;
        for (_, target) in table.pairs.iter().copied() {
            self.enqueue_target(target);
        }
        self.enqueue_target(table.default_target);
        Ok(Flow::End)
    }

    pub(super) fn do_return1(&mut self) -> Result<Flow, CompileError> {
        let value = self.frame.pop1()?;
        self.gen.gen_return(Some(value))?;
        Ok(Flow::End)
    }

    pub(super) fn do_return2(&mut self) -> Result<Flow, CompileError> {
        let value = self.frame.pop2()?;
        self.gen.gen_return(Some(value))?;
        Ok(Flow::End)
    }

    pub(super) fn do_return_void(&mut self) -> Result<Flow, CompileError> {
        self.gen.gen_return(None)?;
        Ok(Flow::End)
    }

    pub(super) fn do_athrow(&mut self) -> Result<Flow, CompileError> {
        let exception = self.frame.pop1()?;
        self.frame.spill_all(&mut self.gen, true)?;
        self.gen.gen_throw(exception)?;
        Ok(Flow::End)
    }
}
