//! Test doubles: a code generator that records every facade call, a table-backed runtime, and a
//! flat register-per-parameter target.

use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::HashMap;
use smallvec::SmallVec;

use bytecode::{ExtendedOp, LookupSwitch, MethodSignature, PrimitiveType, TableSwitch};

use crate::codegen::{ArithOp, CodeGenerator, Condition, EmitResult, NanBias};
use crate::location::{Location, Registers};
use crate::runtime::{FieldRef, MethodRef, PoolConstant, ResolveError, Runtime, TypeRef};
use crate::target::Target;

/// One recorded facade call. Result locations are captured alongside the operands so tests can
/// assert whole emission sequences.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    IntConstant(i32, Location),
    LongConstant(i64, Location),
    FloatConstant(f32, Location),
    DoubleConstant(f64, Location),
    NullConstant(Location),
    StringConstant(String, Location),
    ClassConstant(u16, Location),
    ResolveClass(u16, Location),
    IntOp2(ArithOp, Location, Location, Location),
    LongOp2(ArithOp, Location, Location, Location),
    FloatOp2(ArithOp, Location, Location, Location),
    DoubleOp2(ArithOp, Location, Location, Location),
    LongShift(ArithOp, Location, Location, Location),
    Neg(PrimitiveType, Location, Location),
    Increment(Location, i32, Location),
    Convert(PrimitiveType, PrimitiveType, Location, Location),
    Compare(PrimitiveType, NanBias, Location, Location, Location),
    ArrayLoad(PrimitiveType, Location, Location, Location),
    ArrayStore(PrimitiveType, Location, Location, Location),
    ArrayLength(Location, Location),
    NewArray(PrimitiveType, Location, Location),
    NewObjectArray(u16, Location, Location),
    NewMultiArray(u16, Vec<Option<Location>>, Location),
    NewInstance(u16, Location),
    GetField(u16, Location, Location),
    PutField(u16, Location, Location),
    GetStatic(u16, Location),
    PutStatic(u16, Location),
    InvokeVirtual(u16, Vec<Option<Location>>, Option<Location>),
    InvokeSpecial(u16, Vec<Option<Location>>, Option<Location>),
    InvokeStatic(u16, Vec<Option<Location>>, Option<Location>),
    InvokeInterface(u16, Vec<Option<Location>>, Option<Location>),
    InvokeExtended(u8, Vec<Option<Location>>, Option<Location>),
    Checkcast(u16, Location),
    InstanceOf(u16, Location, Location),
    MonitorEnter(Location),
    MonitorExit(Location),
    Goto(u32),
    Jsr(u32, Location),
    Ret(Location),
    IfZero(Condition, Location, u32, u32),
    IfSame(Condition, PrimitiveType, Location, Location, u32, u32),
    IfNull(Condition, Location, u32, u32),
    TableSwitchOp(Location, u32, Vec<u32>),
    LookupSwitchOp(Location, u32, Vec<(i32, u32)>),
    Return(Option<Location>),
    Throw(Location),
    Breakpoint,
    Safepoint,
    ExceptionLoad(Location),
    Move { dest: Location, src: Location },
}

pub type CallLog = Rc<RefCell<Vec<Call>>>;

/// Records the call sequence and hands out fresh registers; every call advances the code offset
/// by four bytes so offset-derived maps stay observable.
pub struct RecordingGen {
    calls: CallLog,
    registers: Registers,
    offset: usize,
}

impl RecordingGen {
    pub fn new() -> Self {
        RecordingGen {
            calls: Rc::new(RefCell::new(Vec::new())),
            registers: Registers::new(),
            offset: 0,
        }
    }

    /// A handle onto the call log that survives the generator being moved into a compilation.
    pub fn log(&self) -> CallLog {
        self.calls.clone()
    }

    pub fn take_calls(&self) -> Vec<Call> {
        self.calls.borrow_mut().drain(..).collect()
    }

    fn record(&mut self, call: Call) {
        self.calls.borrow_mut().push(call);
        self.offset += 4;
    }

    fn fresh(&mut self, kind: PrimitiveType) -> Location {
        self.registers.allocate(kind)
    }
}

impl CodeGenerator for RecordingGen {
    fn registers(&mut self) -> &mut Registers {
        &mut self.registers
    }

    fn code_offset(&self) -> usize {
        self.offset
    }

    fn gen_safepoint(&mut self) -> EmitResult {
        self.record(Call::Safepoint);
        Ok(())
    }

    fn gen_breakpoint(&mut self) -> EmitResult {
        self.record(Call::Breakpoint);
        Ok(())
    }

    fn gen_move(&mut self, dest: Location, src: Location) -> EmitResult {
        self.record(Call::Move { dest, src });
        Ok(())
    }

    fn gen_exception_load(&mut self) -> EmitResult<Location> {
        let result = self.fresh(PrimitiveType::Object);
        self.record(Call::ExceptionLoad(result));
        Ok(result)
    }

    fn gen_int_constant(&mut self, value: i32) -> EmitResult<Location> {
        let result = self.fresh(PrimitiveType::Int);
        self.record(Call::IntConstant(value, result));
        Ok(result)
    }

    fn gen_long_constant(&mut self, value: i64) -> EmitResult<Location> {
        let result = self.fresh(PrimitiveType::Long);
        self.record(Call::LongConstant(value, result));
        Ok(result)
    }

    fn gen_float_constant(&mut self, value: f32) -> EmitResult<Location> {
        let result = self.fresh(PrimitiveType::Float);
        self.record(Call::FloatConstant(value, result));
        Ok(result)
    }

    fn gen_double_constant(&mut self, value: f64) -> EmitResult<Location> {
        let result = self.fresh(PrimitiveType::Double);
        self.record(Call::DoubleConstant(value, result));
        Ok(result)
    }

    fn gen_null_constant(&mut self) -> EmitResult<Location> {
        let result = self.fresh(PrimitiveType::Object);
        self.record(Call::NullConstant(result));
        Ok(result)
    }

    fn gen_string_constant(&mut self, value: &str) -> EmitResult<Location> {
        let result = self.fresh(PrimitiveType::Object);
        self.record(Call::StringConstant(value.to_string(), result));
        Ok(result)
    }

    fn gen_class_constant(&mut self, class: &TypeRef) -> EmitResult<Location> {
        let result = self.fresh(PrimitiveType::Object);
        self.record(Call::ClassConstant(class.cpi, result));
        Ok(result)
    }

    fn gen_resolve_class(&mut self, class: &TypeRef) -> EmitResult<Location> {
        let result = self.fresh(PrimitiveType::Object);
        self.record(Call::ResolveClass(class.cpi, result));
        Ok(result)
    }

    fn gen_int_op2(&mut self, op: ArithOp, x: Location, y: Location) -> EmitResult<Location> {
        let result = self.fresh(PrimitiveType::Int);
        self.record(Call::IntOp2(op, x, y, result));
        Ok(result)
    }

    fn gen_long_op2(&mut self, op: ArithOp, x: Location, y: Location) -> EmitResult<Location> {
        let result = self.fresh(PrimitiveType::Long);
        self.record(Call::LongOp2(op, x, y, result));
        Ok(result)
    }

    fn gen_float_op2(&mut self, op: ArithOp, x: Location, y: Location) -> EmitResult<Location> {
        let result = self.fresh(PrimitiveType::Float);
        self.record(Call::FloatOp2(op, x, y, result));
        Ok(result)
    }

    fn gen_double_op2(&mut self, op: ArithOp, x: Location, y: Location) -> EmitResult<Location> {
        let result = self.fresh(PrimitiveType::Double);
        self.record(Call::DoubleOp2(op, x, y, result));
        Ok(result)
    }

    fn gen_long_shift(
        &mut self,
        op: ArithOp,
        value: Location,
        count: Location,
    ) -> EmitResult<Location> {
        let result = self.fresh(PrimitiveType::Long);
        self.record(Call::LongShift(op, value, count, result));
        Ok(result)
    }

    fn gen_neg(&mut self, kind: PrimitiveType, x: Location) -> EmitResult<Location> {
        let result = self.fresh(kind);
        self.record(Call::Neg(kind, x, result));
        Ok(result)
    }

    fn gen_increment(&mut self, x: Location, delta: i32) -> EmitResult<Location> {
        let result = self.fresh(PrimitiveType::Int);
        self.record(Call::Increment(x, delta, result));
        Ok(result)
    }

    fn gen_convert(
        &mut self,
        from: PrimitiveType,
        to: PrimitiveType,
        x: Location,
    ) -> EmitResult<Location> {
        let result = self.fresh(to.stack_type());
        self.record(Call::Convert(from, to, x, result));
        Ok(result)
    }

    fn gen_compare(
        &mut self,
        kind: PrimitiveType,
        nan: NanBias,
        x: Location,
        y: Location,
    ) -> EmitResult<Location> {
        let result = self.fresh(PrimitiveType::Int);
        self.record(Call::Compare(kind, nan, x, y, result));
        Ok(result)
    }

    fn gen_array_load(
        &mut self,
        kind: PrimitiveType,
        array: Location,
        index: Location,
    ) -> EmitResult<Location> {
        let result = self.fresh(kind.stack_type());
        self.record(Call::ArrayLoad(kind, array, index, result));
        Ok(result)
    }

    fn gen_array_store(
        &mut self,
        kind: PrimitiveType,
        array: Location,
        index: Location,
        value: Location,
    ) -> EmitResult {
        self.record(Call::ArrayStore(kind, array, index, value));
        Ok(())
    }

    fn gen_array_length(&mut self, array: Location) -> EmitResult<Location> {
        let result = self.fresh(PrimitiveType::Int);
        self.record(Call::ArrayLength(array, result));
        Ok(result)
    }

    fn gen_new_array(&mut self, kind: PrimitiveType, length: Location) -> EmitResult<Location> {
        let result = self.fresh(PrimitiveType::Object);
        self.record(Call::NewArray(kind, length, result));
        Ok(result)
    }

    fn gen_new_object_array(&mut self, class: &TypeRef, length: Location) -> EmitResult<Location> {
        let result = self.fresh(PrimitiveType::Object);
        self.record(Call::NewObjectArray(class.cpi, length, result));
        Ok(result)
    }

    fn gen_new_multi_array(
        &mut self,
        class: &TypeRef,
        dims: &[Option<Location>],
    ) -> EmitResult<Location> {
        let result = self.fresh(PrimitiveType::Object);
        self.record(Call::NewMultiArray(class.cpi, dims.to_vec(), result));
        Ok(result)
    }

    fn gen_new_instance(&mut self, class: &TypeRef) -> EmitResult<Location> {
        let result = self.fresh(PrimitiveType::Object);
        self.record(Call::NewInstance(class.cpi, result));
        Ok(result)
    }

    fn gen_get_field(&mut self, field: &FieldRef, object: Location) -> EmitResult<Location> {
        let result = self.fresh(field.kind.stack_type());
        self.record(Call::GetField(field.cpi, object, result));
        Ok(result)
    }

    fn gen_put_field(&mut self, field: &FieldRef, object: Location, value: Location) -> EmitResult {
        self.record(Call::PutField(field.cpi, object, value));
        Ok(())
    }

    fn gen_get_static(&mut self, field: &FieldRef) -> EmitResult<Location> {
        let result = self.fresh(field.kind.stack_type());
        self.record(Call::GetStatic(field.cpi, result));
        Ok(result)
    }

    fn gen_put_static(&mut self, field: &FieldRef, value: Location) -> EmitResult {
        self.record(Call::PutStatic(field.cpi, value));
        Ok(())
    }

    fn gen_invoke_virtual(
        &mut self,
        method: &MethodRef,
        args: &[Option<Location>],
    ) -> EmitResult<Option<Location>> {
        let result = self.invoke_result(method);
        self.record(Call::InvokeVirtual(method.cpi, args.to_vec(), result));
        Ok(result)
    }

    fn gen_invoke_special(
        &mut self,
        method: &MethodRef,
        args: &[Option<Location>],
    ) -> EmitResult<Option<Location>> {
        let result = self.invoke_result(method);
        self.record(Call::InvokeSpecial(method.cpi, args.to_vec(), result));
        Ok(result)
    }

    fn gen_invoke_static(
        &mut self,
        method: &MethodRef,
        args: &[Option<Location>],
    ) -> EmitResult<Option<Location>> {
        let result = self.invoke_result(method);
        self.record(Call::InvokeStatic(method.cpi, args.to_vec(), result));
        Ok(result)
    }

    fn gen_invoke_interface(
        &mut self,
        method: &MethodRef,
        args: &[Option<Location>],
    ) -> EmitResult<Option<Location>> {
        let result = self.invoke_result(method);
        self.record(Call::InvokeInterface(method.cpi, args.to_vec(), result));
        Ok(result)
    }

    fn gen_invoke_extended(
        &mut self,
        opcode: u8,
        op: &ExtendedOp,
        args: &[Option<Location>],
    ) -> EmitResult<Option<Location>> {
        let result = if op.return_kind == PrimitiveType::Void {
            None
        } else {
            Some(self.fresh(op.return_kind.stack_type()))
        };
        self.record(Call::InvokeExtended(opcode, args.to_vec(), result));
        Ok(result)
    }

    fn gen_checkcast(&mut self, class: &TypeRef, object: Location) -> EmitResult {
        self.record(Call::Checkcast(class.cpi, object));
        Ok(())
    }

    fn gen_instance_of(&mut self, class: &TypeRef, object: Location) -> EmitResult<Location> {
        let result = self.fresh(PrimitiveType::Int);
        self.record(Call::InstanceOf(class.cpi, object, result));
        Ok(result)
    }

    fn gen_monitor_enter(&mut self, object: Location) -> EmitResult {
        self.record(Call::MonitorEnter(object));
        Ok(())
    }

    fn gen_monitor_exit(&mut self, object: Location) -> EmitResult {
        self.record(Call::MonitorExit(object));
        Ok(())
    }

    fn gen_goto(&mut self, target: u32) -> EmitResult {
        self.record(Call::Goto(target));
        Ok(())
    }

    fn gen_jsr(&mut self, target: u32) -> EmitResult<Location> {
        let result = self.fresh(PrimitiveType::ReturnAddress);
        self.record(Call::Jsr(target, result));
        Ok(result)
    }

    fn gen_ret(&mut self, target: Location) -> EmitResult {
        self.record(Call::Ret(target));
        Ok(())
    }

    fn gen_if_zero(
        &mut self,
        cond: Condition,
        x: Location,
        target: u32,
        fall_through: u32,
    ) -> EmitResult {
        self.record(Call::IfZero(cond, x, target, fall_through));
        Ok(())
    }

    fn gen_if_same(
        &mut self,
        cond: Condition,
        kind: PrimitiveType,
        x: Location,
        y: Location,
        target: u32,
        fall_through: u32,
    ) -> EmitResult {
        self.record(Call::IfSame(cond, kind, x, y, target, fall_through));
        Ok(())
    }

    fn gen_if_null(
        &mut self,
        cond: Condition,
        x: Location,
        target: u32,
        fall_through: u32,
    ) -> EmitResult {
        self.record(Call::IfNull(cond, x, target, fall_through));
        Ok(())
    }

    fn gen_tableswitch(&mut self, key: Location, table: &TableSwitch) -> EmitResult {
        self.record(Call::TableSwitchOp(
            key,
            table.default_target,
            table.targets.clone(),
        ));
        Ok(())
    }

    fn gen_lookupswitch(&mut self, key: Location, table: &LookupSwitch) -> EmitResult {
        self.record(Call::LookupSwitchOp(
            key,
            table.default_target,
            table.pairs.clone(),
        ));
        Ok(())
    }

    fn gen_return(&mut self, value: Option<Location>) -> EmitResult {
        self.record(Call::Return(value));
        Ok(())
    }

    fn gen_throw(&mut self, exception: Location) -> EmitResult {
        self.record(Call::Throw(exception));
        Ok(())
    }

    fn finish(&mut self, _block_offsets: &HashMap<u32, usize>) -> EmitResult<Vec<u8>> {
        Ok(vec![0; self.offset])
    }
}

impl RecordingGen {
    fn invoke_result(&mut self, method: &MethodRef) -> Option<Location> {
        if method.signature.ret == PrimitiveType::Void {
            None
        } else {
            Some(self.fresh(method.signature.ret.stack_type()))
        }
    }
}

/// Constant-pool lookups backed by plain tables.
#[derive(Default)]
pub struct TableRuntime {
    pub constants: HashMap<u16, PoolConstant>,
    pub types: HashMap<u16, TypeRef>,
    pub fields: HashMap<u16, FieldRef>,
    pub methods: HashMap<u16, MethodRef>,
}

impl TableRuntime {
    fn field(&self, cpi: u16, expected: &'static str) -> Result<FieldRef, ResolveError> {
        self.fields
            .get(&cpi)
            .cloned()
            .ok_or_else(|| ResolveError::new(cpi, expected))
    }

    fn method(&self, cpi: u16, expected: &'static str) -> Result<MethodRef, ResolveError> {
        self.methods
            .get(&cpi)
            .cloned()
            .ok_or_else(|| ResolveError::new(cpi, expected))
    }
}

impl Runtime for TableRuntime {
    fn lookup_constant(&self, cpi: u16) -> Result<PoolConstant, ResolveError> {
        self.constants
            .get(&cpi)
            .cloned()
            .ok_or_else(|| ResolveError::new(cpi, "a loadable constant"))
    }

    fn lookup_type(&self, cpi: u16) -> Result<TypeRef, ResolveError> {
        self.types
            .get(&cpi)
            .cloned()
            .ok_or_else(|| ResolveError::new(cpi, "a class reference"))
    }

    fn lookup_get_field(&self, cpi: u16) -> Result<FieldRef, ResolveError> {
        self.field(cpi, "an instance field read")
    }

    fn lookup_put_field(&self, cpi: u16) -> Result<FieldRef, ResolveError> {
        self.field(cpi, "an instance field write")
    }

    fn lookup_get_static(&self, cpi: u16) -> Result<FieldRef, ResolveError> {
        self.field(cpi, "a static field read")
    }

    fn lookup_put_static(&self, cpi: u16) -> Result<FieldRef, ResolveError> {
        self.field(cpi, "a static field write")
    }

    fn lookup_invoke_virtual(&self, cpi: u16) -> Result<MethodRef, ResolveError> {
        self.method(cpi, "a virtual call site")
    }

    fn lookup_invoke_special(&self, cpi: u16) -> Result<MethodRef, ResolveError> {
        self.method(cpi, "a special call site")
    }

    fn lookup_invoke_static(&self, cpi: u16) -> Result<MethodRef, ResolveError> {
        self.method(cpi, "a static call site")
    }

    fn lookup_invoke_interface(&self, cpi: u16) -> Result<MethodRef, ResolveError> {
        self.method(cpi, "an interface call site")
    }
}

/// Eight-byte words; every parameter arrives in its own fresh register.
pub struct TestTarget;

impl Target for TestTarget {
    fn word_size(&self) -> usize {
        8
    }

    fn parameter_locations(
        &self,
        signature: &MethodSignature,
        is_static: bool,
        registers: &mut Registers,
    ) -> SmallVec<[Location; 8]> {
        let mut locations = SmallVec::new();
        if !is_static {
            locations.push(registers.allocate(PrimitiveType::Object));
        }
        for kind in &signature.args {
            locations.push(registers.allocate(kind.stack_type()));
        }
        locations
    }
}

/// Helpers shared by the compiler tests.
pub fn method_ref(cpi: u16, name: &str, descriptor: &str) -> MethodRef {
    MethodRef {
        cpi,
        name: name.to_string(),
        signature: MethodSignature::from_descriptor(descriptor).unwrap(),
        resolved: true,
    }
}

pub fn field_ref(cpi: u16, name: &str, kind: PrimitiveType) -> FieldRef {
    FieldRef {
        cpi,
        name: name.to_string(),
        kind,
        resolved: true,
    }
}

pub fn type_ref(cpi: u16, name: &str, resolved: bool) -> TypeRef {
    TypeRef {
        cpi,
        name: name.to_string(),
        resolved,
    }
}
