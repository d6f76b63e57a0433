//! Arithmetic dispatch: pop the operands at the right width, emit the kind-specific operation,
//! push the result.

use bytecode::PrimitiveType;

use crate::codegen::{ArithOp, CodeGenerator};
use crate::compile::MethodCompiler;
use crate::error::CompileError;
use crate::runtime::Runtime;

impl<'a, G: CodeGenerator, R: Runtime> MethodCompiler<'a, G, R> {
    pub(super) fn do_int_op2(&mut self, op: ArithOp) -> Result<(), CompileError> {
        let y = self.frame.pop1()?;
        let x = self.frame.pop1()?;
        let result = self.gen.gen_int_op2(op, x, y)?;
        Ok(self.frame.push1(result)?)
    }

    pub(super) fn do_long_op2(&mut self, op: ArithOp) -> Result<(), CompileError> {
        let y = self.frame.pop2()?;
        let x = self.frame.pop2()?;
        let result = self.gen.gen_long_op2(op, x, y)?;
        Ok(self.frame.push2(result)?)
    }

    /// Long shift counts are single-word ints.
    pub(super) fn do_long_shift(&mut self, op: ArithOp) -> Result<(), CompileError> {
        let count = self.frame.pop1()?;
        let value = self.frame.pop2()?;
        let result = self.gen.gen_long_shift(op, value, count)?;
        Ok(self.frame.push2(result)?)
    }

    pub(super) fn do_float_op2(&mut self, op: ArithOp) -> Result<(), CompileError> {
        let y = self.frame.pop1()?;
        let x = self.frame.pop1()?;
        let result = self.gen.gen_float_op2(op, x, y)?;
        Ok(self.frame.push1(result)?)
    }

    pub(super) fn do_double_op2(&mut self, op: ArithOp) -> Result<(), CompileError> {
        let y = self.frame.pop2()?;
        let x = self.frame.pop2()?;
        let result = self.gen.gen_double_op2(op, x, y)?;
        Ok(self.frame.push2(result)?)
    }

    pub(super) fn do_neg(&mut self, kind: PrimitiveType) -> Result<(), CompileError> {
        let x = self.frame.pop_kind(kind)?;
        let result = self.gen.gen_neg(kind, x)?;
        Ok(self.frame.push_kind(result, kind)?)
    }
}
