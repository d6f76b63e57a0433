//! Array access and creation.

use bytecode::PrimitiveType;

use crate::codegen::CodeGenerator;
use crate::compile::MethodCompiler;
use crate::error::CompileError;
use crate::runtime::Runtime;

impl<'a, G: CodeGenerator, R: Runtime> MethodCompiler<'a, G, R> {
    /// Element kinds below int still land on the stack as ints.
    pub(super) fn do_array_load(&mut self, kind: PrimitiveType) -> Result<(), CompileError> {
        let index = self.frame.pop1()?;
        let array = self.frame.pop1()?;
        let result = self.gen.gen_array_load(kind, array, index)?;
        Ok(self.frame.push_kind(result, kind.stack_type())?)
    }

    pub(super) fn do_array_store(&mut self, kind: PrimitiveType) -> Result<(), CompileError> {
        let value = self.frame.pop_kind(kind.stack_type())?;
        let index = self.frame.pop1()?;
        let array = self.frame.pop1()?;
        self.gen.gen_array_store(kind, array, index, value)
    }

    pub(super) fn do_array_length(&mut self) -> Result<(), CompileError> {
        let array = self.frame.pop1()?;
        let result = self.gen.gen_array_length(array)?;
        Ok(self.frame.push1(result)?)
    }

    pub(super) fn do_newarray(&mut self) -> Result<(), CompileError> {
        let atype = self.stream.read_unsigned_byte()?;
        let kind = PrimitiveType::from_array_type(atype).ok_or_else(|| {
            CompileError::Malformed(format!("newarray with element type code {}", atype))
        })?;
        let length = self.frame.pop1()?;
        self.frame.spill_all(&mut self.gen, true)?;
        let result = self.gen.gen_new_array(kind, length)?;
        Ok(self.frame.push1(result)?)
    }

    pub(super) fn do_anewarray(&mut self, cpi: u16) -> Result<(), CompileError> {
        let class = self.runtime.lookup_type(cpi)?;
        let length = self.frame.pop1()?;
        self.frame.spill_all(&mut self.gen, true)?;
        let result = self.gen.gen_new_object_array(&class, length)?;
        Ok(self.frame.push1(result)?)
    }

    /// multianewarray pops `rank` int lengths, outermost dimension deepest.
    pub(super) fn do_multianewarray(&mut self, bci: u32) -> Result<(), CompileError> {
        let cpi = self.stream.read_cpi()?;
        let rank = self.stream.read_ubyte(bci + 3)? as usize;
        if rank == 0 {
            return Err(CompileError::Malformed(format!(
                "multianewarray with zero dimensions at {}",
                bci
            )));
        }
        let class = self.runtime.lookup_type(cpi)?;
        let dims = self.frame.pop_many(rank)?;
        self.frame.spill_all(&mut self.gen, true)?;
        let result = self.gen.gen_new_multi_array(&class, &dims)?;
        Ok(self.frame.push1(result)?)
    }
}
