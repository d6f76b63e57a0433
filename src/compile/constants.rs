//! Constant-pushing instructions, including the ldc family.

use crate::codegen::CodeGenerator;
use crate::compile::MethodCompiler;
use crate::error::CompileError;
use crate::runtime::{PoolConstant, Runtime};

impl<'a, G: CodeGenerator, R: Runtime> MethodCompiler<'a, G, R> {
    pub(super) fn do_int_constant(&mut self, value: i32) -> Result<(), CompileError> {
        let result = self.gen.gen_int_constant(value)?;
        Ok(self.frame.push1(result)?)
    }

    pub(super) fn do_long_constant(&mut self, value: i64) -> Result<(), CompileError> {
        let result = self.gen.gen_long_constant(value)?;
        Ok(self.frame.push2(result)?)
    }

    pub(super) fn do_float_constant(&mut self, value: f32) -> Result<(), CompileError> {
        let result = self.gen.gen_float_constant(value)?;
        Ok(self.frame.push1(result)?)
    }

    pub(super) fn do_double_constant(&mut self, value: f64) -> Result<(), CompileError> {
        let result = self.gen.gen_double_constant(value)?;
        Ok(self.frame.push2(result)?)
    }

    pub(super) fn do_null_constant(&mut self) -> Result<(), CompileError> {
        let result = self.gen.gen_null_constant()?;
        Ok(self.frame.push1(result)?)
    }

    /// ldc / ldc_w. A type constant for a class the runtime has not loaded yet becomes a
    /// resolution call; everything else is a plain constant producer.
    pub(super) fn do_ldc(&mut self, cpi: u16) -> Result<(), CompileError> {
        match self.runtime.lookup_constant(cpi)? {
            PoolConstant::Int(value) => self.do_int_constant(value),
            PoolConstant::Float(value) => self.do_float_constant(value),
            PoolConstant::String(value) => {
                let result = self.gen.gen_string_constant(&value)?;
                Ok(self.frame.push1(result)?)
            }
            PoolConstant::Type(class) => {
                let result = if class.resolved {
                    self.gen.gen_class_constant(&class)?
                } else {
                    self.gen.gen_resolve_class(&class)?
                };
                Ok(self.frame.push1(result)?)
            }
            PoolConstant::Long(_) | PoolConstant::Double(_) => {
                Err(CompileError::Malformed(format!(
                    "ldc of a double-word constant at pool index {}",
                    cpi
                )))
            }
        }
    }

    /// ldc2_w only loads the double-word kinds.
    pub(super) fn do_ldc2(&mut self, cpi: u16) -> Result<(), CompileError> {
        match self.runtime.lookup_constant(cpi)? {
            PoolConstant::Long(value) => self.do_long_constant(value),
            PoolConstant::Double(value) => self.do_double_constant(value),
            _ => Err(CompileError::Malformed(format!(
                "ldc2_w of a single-word constant at pool index {}",
                cpi
            ))),
        }
    }
}
