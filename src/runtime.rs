//! The runtime's view of the constant pool, consumed as pure queries.
//!
//! Every accessor is keyed by a constant-pool index and the kind of use the instruction makes of
//! it. The queries carry no compilation state; a failing lookup reports an unresolved or invalid
//! entry and aborts the compilation at the orchestrator.

use thiserror::Error;

use bytecode::{MethodSignature, PrimitiveType};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("constant pool entry {cpi} is not usable as {expected}")]
pub struct ResolveError {
    pub cpi: u16,
    pub expected: &'static str,
}

impl ResolveError {
    pub fn new(cpi: u16, expected: &'static str) -> Self {
        ResolveError { cpi, expected }
    }
}

/// A loadable constant-pool entry (the ldc family).
#[derive(Debug, Clone, PartialEq)]
pub enum PoolConstant {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Type(TypeRef),
}

/// A symbolic class reference. `resolved` reports whether the runtime has loaded the class; an
/// unresolved type forces the compiler to emit a resolution call instead of a constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub cpi: u16,
    pub name: String,
    pub resolved: bool,
}

/// A symbolic field reference. The kind is always known statically from the descriptor, even
/// when the field itself is unresolved; the compiler only needs the kind to shape the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub cpi: u16,
    pub name: String,
    pub kind: PrimitiveType,
    pub resolved: bool,
}

/// A symbolic method reference with its decoded signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRef {
    pub cpi: u16,
    pub name: String,
    pub signature: MethodSignature,
    pub resolved: bool,
}

impl MethodRef {
    /// Operand-stack slots consumed by a call through this reference.
    pub fn invoke_slots(&self, with_receiver: bool) -> usize {
        self.signature.arg_slots() + with_receiver as usize
    }
}

/// Constant-pool lookups, split by use site the way the bytecode distinguishes them. All
/// queries are pure and must be callable from any number of concurrent compilations.
pub trait Runtime {
    fn lookup_constant(&self, cpi: u16) -> Result<PoolConstant, ResolveError>;
    fn lookup_type(&self, cpi: u16) -> Result<TypeRef, ResolveError>;

    fn lookup_get_field(&self, cpi: u16) -> Result<FieldRef, ResolveError>;
    fn lookup_put_field(&self, cpi: u16) -> Result<FieldRef, ResolveError>;
    fn lookup_get_static(&self, cpi: u16) -> Result<FieldRef, ResolveError>;
    fn lookup_put_static(&self, cpi: u16) -> Result<FieldRef, ResolveError>;

    fn lookup_invoke_virtual(&self, cpi: u16) -> Result<MethodRef, ResolveError>;
    fn lookup_invoke_special(&self, cpi: u16) -> Result<MethodRef, ResolveError>;
    fn lookup_invoke_static(&self, cpi: u16) -> Result<MethodRef, ResolveError>;
    fn lookup_invoke_interface(&self, cpi: u16) -> Result<MethodRef, ResolveError>;
}
