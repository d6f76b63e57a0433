//! Field access, method invocation, allocation, type checks and monitors.
//!
//! Calls, allocations and monitor operations are runtime-visible points: the remaining frame is
//! spilled (after the operands come off) so the stack picture is materialized before control
//! can leave the method.

use crate::codegen::CodeGenerator;
use crate::compile::MethodCompiler;
use crate::error::CompileError;
use crate::runtime::{MethodRef, Runtime};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(super) enum InvokeKind {
    Virtual,
    Special,
    Static,
    Interface,
}

impl<'a, G: CodeGenerator, R: Runtime> MethodCompiler<'a, G, R> {
    pub(super) fn do_get_field(&mut self, cpi: u16) -> Result<(), CompileError> {
        let field = self.runtime.lookup_get_field(cpi)?;
        let object = self.frame.pop1()?;
        let result = self.gen.gen_get_field(&field, object)?;
        Ok(self.frame.push_kind(result, field.kind.stack_type())?)
    }

    pub(super) fn do_put_field(&mut self, cpi: u16) -> Result<(), CompileError> {
        let field = self.runtime.lookup_put_field(cpi)?;
        let value = self.frame.pop_kind(field.kind.stack_type())?;
        let object = self.frame.pop1()?;
        self.gen.gen_put_field(&field, object, value)
    }

    pub(super) fn do_get_static(&mut self, cpi: u16) -> Result<(), CompileError> {
        let field = self.runtime.lookup_get_static(cpi)?;
        let result = self.gen.gen_get_static(&field)?;
        Ok(self.frame.push_kind(result, field.kind.stack_type())?)
    }

    pub(super) fn do_put_static(&mut self, cpi: u16) -> Result<(), CompileError> {
        let field = self.runtime.lookup_put_static(cpi)?;
        let value = self.frame.pop_kind(field.kind.stack_type())?;
        self.gen.gen_put_static(&field, value)
    }

    /// All four invoke forms share one shape: collect the argument slots off the stack (receiver
    /// first for the non-static forms), materialize the rest of the frame, emit the call, push
    /// the result if the return kind is non-void.
    pub(super) fn do_invoke(&mut self, kind: InvokeKind, cpi: u16) -> Result<(), CompileError> {
        let method: MethodRef = match kind {
            InvokeKind::Virtual => self.runtime.lookup_invoke_virtual(cpi)?,
            InvokeKind::Special => self.runtime.lookup_invoke_special(cpi)?,
            InvokeKind::Static => self.runtime.lookup_invoke_static(cpi)?,
            InvokeKind::Interface => self.runtime.lookup_invoke_interface(cpi)?,
        };

        let with_receiver = kind != InvokeKind::Static;
        let args = self.frame.pop_many(method.invoke_slots(with_receiver))?;
        self.frame.spill_all(&mut self.gen, true)?;

        let result = match kind {
            InvokeKind::Virtual => self.gen.gen_invoke_virtual(&method, &args)?,
            InvokeKind::Special => self.gen.gen_invoke_special(&method, &args)?,
            InvokeKind::Static => self.gen.gen_invoke_static(&method, &args)?,
            InvokeKind::Interface => self.gen.gen_invoke_interface(&method, &args)?,
        };
        Ok(self.frame.push_result(result, method.signature.ret)?)
    }

    pub(super) fn do_new(&mut self, cpi: u16) -> Result<(), CompileError> {
        let class = self.runtime.lookup_type(cpi)?;
        self.frame.spill_all(&mut self.gen, true)?;
        let result = self.gen.gen_new_instance(&class)?;
        Ok(self.frame.push1(result)?)
    }

    /// checkcast asserts the type but does not change the value; the popped location goes
    /// straight back.
    pub(super) fn do_checkcast(&mut self, cpi: u16) -> Result<(), CompileError> {
        let class = self.runtime.lookup_type(cpi)?;
        let object = self.frame.pop1()?;
        self.gen.gen_checkcast(&class, object)?;
        Ok(self.frame.push1(object)?)
    }

    pub(super) fn do_instanceof(&mut self, cpi: u16) -> Result<(), CompileError> {
        let class = self.runtime.lookup_type(cpi)?;
        let object = self.frame.pop1()?;
        let result = self.gen.gen_instance_of(&class, object)?;
        Ok(self.frame.push1(result)?)
    }

    pub(super) fn do_monitor(&mut self, enter: bool) -> Result<(), CompileError> {
        let object = self.frame.pop1()?;
        self.frame.spill_all(&mut self.gen, true)?;
        if enter {
            self.gen.gen_monitor_enter(object)
        } else {
            self.gen.gen_monitor_exit(object)
        }
    }
}
