//! Primitive conversions. The source kind decides the pop width, the target kind the push
//! width; i2b/i2c/i2s land back on the stack as ints.

use bytecode::PrimitiveType;

use crate::codegen::CodeGenerator;
use crate::compile::MethodCompiler;
use crate::error::CompileError;
use crate::runtime::Runtime;

impl<'a, G: CodeGenerator, R: Runtime> MethodCompiler<'a, G, R> {
    pub(super) fn do_convert(
        &mut self,
        from: PrimitiveType,
        to: PrimitiveType,
    ) -> Result<(), CompileError> {
        let x = self.frame.pop_kind(from)?;
        let result = self.gen.gen_convert(from, to, x)?;
        Ok(self.frame.push_kind(result, to.stack_type())?)
    }
}
