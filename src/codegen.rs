//! The typed facade the dispatcher drives, and the artifact a compilation produces.
//!
//! Every operation takes already-resolved [`Location`]s and hands back a fresh one (or
//! nothing). How a virtual register is lowered to a physical one, and what bytes an operation
//! becomes, is entirely the implementor's business; the core only sequences calls and observes
//! `code_offset` to build its maps. Branch operations receive bytecode indices as targets and
//! resolve them against the block-offset map passed to [`CodeGenerator::finish`].

use hashbrown::HashMap;

use bytecode::{ExtendedOp, LookupSwitch, PrimitiveType, TableSwitch};

use crate::error::CompileError;
use crate::location::{Location, Registers};
use crate::runtime::{FieldRef, MethodRef, TypeRef};

pub type EmitResult<T = ()> = Result<T, CompileError>;

/// Two-operand arithmetic selector. Shifts only apply to the integral kinds; the float kinds
/// stop at `Rem`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    Ushr,
    And,
    Or,
    Xor,
}

/// Branch condition against zero, null, or a second operand.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Condition {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

/// Which way a floating-point comparison collapses when an operand is NaN: `Low` pushes -1
/// (fcmpl/dcmpl), `High` pushes +1 (fcmpg/dcmpg).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NanBias {
    Low,
    High,
}

pub trait CodeGenerator {
    /// The compilation's register factory; all fresh locations returned by the producers below
    /// must be minted from it.
    fn registers(&mut self) -> &mut Registers;

    /// Current offset into the emitted code buffer.
    fn code_offset(&self) -> usize;

    // Marker emissions; permitted no-ops.
    fn block_start(&mut self, _bci: u32) {}
    fn bytecode_start(&mut self, _bci: u32) {}
    fn gen_instrumentation(&mut self, _bci: u32) -> EmitResult {
        Ok(())
    }

    fn gen_safepoint(&mut self) -> EmitResult;
    fn gen_breakpoint(&mut self) -> EmitResult;
    /// Move a value into a canonical stack slot (or between locations) for spills and merges.
    fn gen_move(&mut self, dest: Location, src: Location) -> EmitResult;
    /// Load the pending exception reference in a handler prologue.
    fn gen_exception_load(&mut self) -> EmitResult<Location>;

    fn gen_int_constant(&mut self, value: i32) -> EmitResult<Location>;
    fn gen_long_constant(&mut self, value: i64) -> EmitResult<Location>;
    fn gen_float_constant(&mut self, value: f32) -> EmitResult<Location>;
    fn gen_double_constant(&mut self, value: f64) -> EmitResult<Location>;
    fn gen_null_constant(&mut self) -> EmitResult<Location>;
    fn gen_string_constant(&mut self, value: &str) -> EmitResult<Location>;
    /// The class object of a resolved type.
    fn gen_class_constant(&mut self, class: &TypeRef) -> EmitResult<Location>;
    /// Runtime resolution call for a type that is not loaded yet; yields the class object.
    fn gen_resolve_class(&mut self, class: &TypeRef) -> EmitResult<Location>;

    fn gen_int_op2(&mut self, op: ArithOp, x: Location, y: Location) -> EmitResult<Location>;
    fn gen_long_op2(&mut self, op: ArithOp, x: Location, y: Location) -> EmitResult<Location>;
    fn gen_float_op2(&mut self, op: ArithOp, x: Location, y: Location) -> EmitResult<Location>;
    fn gen_double_op2(&mut self, op: ArithOp, x: Location, y: Location) -> EmitResult<Location>;
    /// Long shifts take a single-word count.
    fn gen_long_shift(&mut self, op: ArithOp, value: Location, count: Location)
        -> EmitResult<Location>;
    fn gen_neg(&mut self, kind: PrimitiveType, x: Location) -> EmitResult<Location>;
    /// In-place integer increment (iinc); returns the new location of the local.
    fn gen_increment(&mut self, x: Location, delta: i32) -> EmitResult<Location>;
    fn gen_convert(
        &mut self,
        from: PrimitiveType,
        to: PrimitiveType,
        x: Location,
    ) -> EmitResult<Location>;
    /// Three-way comparison pushing an int; `nan` is ignored for the long kind.
    fn gen_compare(
        &mut self,
        kind: PrimitiveType,
        nan: NanBias,
        x: Location,
        y: Location,
    ) -> EmitResult<Location>;

    fn gen_array_load(
        &mut self,
        kind: PrimitiveType,
        array: Location,
        index: Location,
    ) -> EmitResult<Location>;
    fn gen_array_store(
        &mut self,
        kind: PrimitiveType,
        array: Location,
        index: Location,
        value: Location,
    ) -> EmitResult;
    fn gen_array_length(&mut self, array: Location) -> EmitResult<Location>;
    fn gen_new_array(&mut self, kind: PrimitiveType, length: Location) -> EmitResult<Location>;
    fn gen_new_object_array(&mut self, class: &TypeRef, length: Location) -> EmitResult<Location>;
    /// `dims` is slot-shaped like an argument list; every entry is a single-word int here.
    fn gen_new_multi_array(
        &mut self,
        class: &TypeRef,
        dims: &[Option<Location>],
    ) -> EmitResult<Location>;
    fn gen_new_instance(&mut self, class: &TypeRef) -> EmitResult<Location>;

    fn gen_get_field(&mut self, field: &FieldRef, object: Location) -> EmitResult<Location>;
    fn gen_put_field(&mut self, field: &FieldRef, object: Location, value: Location) -> EmitResult;
    fn gen_get_static(&mut self, field: &FieldRef) -> EmitResult<Location>;
    fn gen_put_static(&mut self, field: &FieldRef, value: Location) -> EmitResult;

    // Invokes receive the popped slot window in source order: the receiver (if any) first,
    // `None` under each double-word argument's sentinel slot. The result is `Some` exactly when
    // the return kind is non-void.
    fn gen_invoke_virtual(
        &mut self,
        method: &MethodRef,
        args: &[Option<Location>],
    ) -> EmitResult<Option<Location>>;
    fn gen_invoke_special(
        &mut self,
        method: &MethodRef,
        args: &[Option<Location>],
    ) -> EmitResult<Option<Location>>;
    fn gen_invoke_static(
        &mut self,
        method: &MethodRef,
        args: &[Option<Location>],
    ) -> EmitResult<Option<Location>>;
    fn gen_invoke_interface(
        &mut self,
        method: &MethodRef,
        args: &[Option<Location>],
    ) -> EmitResult<Option<Location>>;
    /// An extended bytecode decoded by the extension resolver.
    fn gen_invoke_extended(
        &mut self,
        opcode: u8,
        op: &ExtendedOp,
        args: &[Option<Location>],
    ) -> EmitResult<Option<Location>>;

    /// Assert the object's type; the value itself is unchanged and keeps its location.
    fn gen_checkcast(&mut self, class: &TypeRef, object: Location) -> EmitResult;
    fn gen_instance_of(&mut self, class: &TypeRef, object: Location) -> EmitResult<Location>;
    fn gen_monitor_enter(&mut self, object: Location) -> EmitResult;
    fn gen_monitor_exit(&mut self, object: Location) -> EmitResult;

    fn gen_goto(&mut self, target: u32) -> EmitResult;
    /// Jump to subroutine; returns the returnAddress-typed register the dispatcher pushes.
    fn gen_jsr(&mut self, target: u32) -> EmitResult<Location>;
    /// Indirect jump through a returnAddress value.
    fn gen_ret(&mut self, target: Location) -> EmitResult;
    fn gen_if_zero(
        &mut self,
        cond: Condition,
        x: Location,
        target: u32,
        fall_through: u32,
    ) -> EmitResult;
    fn gen_if_same(
        &mut self,
        cond: Condition,
        kind: PrimitiveType,
        x: Location,
        y: Location,
        target: u32,
        fall_through: u32,
    ) -> EmitResult;
    fn gen_if_null(
        &mut self,
        cond: Condition,
        x: Location,
        target: u32,
        fall_through: u32,
    ) -> EmitResult;
    fn gen_tableswitch(&mut self, key: Location, table: &TableSwitch) -> EmitResult;
    fn gen_lookupswitch(&mut self, key: Location, table: &LookupSwitch) -> EmitResult;
    /// `None` for a void return.
    fn gen_return(&mut self, value: Option<Location>) -> EmitResult;
    fn gen_throw(&mut self, exception: Location) -> EmitResult;

    /// Resolve branch targets against the final block offsets, emit any constant/data area, and
    /// hand over the finished bytes.
    fn finish(&mut self, block_offsets: &HashMap<u32, usize>) -> EmitResult<Vec<u8>>;
}

/// A materialized exception adapter: the stub at `code_offset` spills the snapshotted frame and
/// jumps to the handler block.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AdapterStub {
    pub trap_bci: u32,
    pub handler_bci: u32,
    pub code_offset: usize,
}

/// The observable output of one successful compilation.
#[derive(Debug)]
pub struct CompiledMethod {
    pub code: Vec<u8>,
    /// bci -> code offset for every compiled instruction start, in emission order. This is what
    /// lets a debugger step at bytecode granularity.
    pub bytecode_map: Vec<(u32, usize)>,
    /// bci -> code offset for every generated block.
    pub block_offsets: HashMap<u32, usize>,
    pub adapters: Vec<AdapterStub>,
    /// Byte size of the spill frame: one word per local and operand-stack slot.
    pub frame_size: usize,
}

impl CompiledMethod {
    /// Code offset recorded for the instruction at `bci`, if it was compiled.
    pub fn offset_of(&self, bci: u32) -> Option<usize> {
        self.bytecode_map
            .iter()
            .find(|(at, _)| *at == bci)
            .map(|(_, offset)| *offset)
    }
}
