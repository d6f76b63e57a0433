//! A single-pass baseline compiler for JVM method bytecode.
//!
//! One method goes in (code bytes, handler table, frame metadata) and one compiled artifact
//! comes out, mirroring the bytecode closely enough to debug at bytecode granularity and never
//! needing deoptimization. The compiler walks each basic block once, tracking a symbolic frame
//! that maps every local and operand-stack slot to a virtual register or its canonical spill
//! slot, and drives an abstract code generator; there is no IR, no liveness analysis and no
//! cross-block register allocation beyond spill-on-divergence at block boundaries.

// Ensure each result error is either unwrapped or returned
#![deny(unused_must_use)]

#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate log;

pub mod blocks;
pub mod codegen;
pub mod compile;
pub mod error;
pub mod frame;
pub mod location;
pub mod runtime;
pub mod target;

#[cfg(test)]
pub(crate) mod testing;

pub use bytecode;

pub use codegen::{AdapterStub, ArithOp, CodeGenerator, CompiledMethod, Condition, NanBias};
pub use compile::{compile_method, MethodCompiler};
pub use error::{Bailout, CompileError};
pub use frame::{FrameError, FrameState};
pub use location::{Location, Registers};
pub use runtime::{FieldRef, MethodRef, PoolConstant, ResolveError, Runtime, TypeRef};
pub use target::Target;
