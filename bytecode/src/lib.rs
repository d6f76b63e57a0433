// Ensure each result error is either unwrapped or returned
#![deny(unused_must_use)]

#[macro_use]
extern crate num_derive;

pub mod method;
pub mod opcode;
pub mod stream;
pub mod types;

pub use method::{ExceptionRange, MethodInfo, MethodSignature};
pub use opcode::Opcode;
pub use stream::{
    BytecodeStream, ExtendedOp, ExtensionResolver, LookupSwitch, StreamError, TableSwitch,
};
pub use types::PrimitiveType;
