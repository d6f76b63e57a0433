//! Local-variable instructions that emit code. Plain loads and stores are pure frame motion and
//! are handled inline in the dispatch; iinc is the one local operation that produces code.

use crate::codegen::CodeGenerator;
use crate::compile::MethodCompiler;
use crate::error::CompileError;
use crate::runtime::Runtime;

impl<'a, G: CodeGenerator, R: Runtime> MethodCompiler<'a, G, R> {
    /// iinc updates the local in place: no stack traffic, the local's location is simply
    /// replaced by the increment's result.
    pub(super) fn do_iinc(&mut self) -> Result<(), CompileError> {
        let index = self.stream.read_local_index()? as usize;
        let delta = if self.stream.in_wide() {
            self.stream.read_short()? as i32
        } else {
            self.stream.read_byte()? as i32
        };

        let current = self.frame.local(index)?;
        let result = self.gen.gen_increment(current, delta)?;
        Ok(self.frame.set_local(index, result)?)
    }
}
