//! The per-method compilation driver.
//!
//! One [`MethodCompiler`] owns everything a compilation touches: the bytecode stream, the
//! current frame state, the block table and worklist, the exception-adapter queue and the
//! bci -> code offset maps. Nothing is shared between compilations; the runtime queries and the
//! target description are the only read-only collaborators.
//!
//! Compilation is a single monotonic emission sequence: drain the worklist block by block, then
//! materialize the queued exception adapters, then let the code generator finalize branches.

mod array;
mod class;
mod cmp;
mod constants;
mod control;
mod convert;
mod locals;
mod math;

use std::mem;

use smallvec::SmallVec;

use bytecode::{BytecodeStream, ExtensionResolver, MethodInfo, Opcode, PrimitiveType};

use crate::blocks::{BlockMap, Blocks};
use crate::codegen::{AdapterStub, CodeGenerator, CompiledMethod};
use crate::error::{Bailout, CompileError};
use crate::frame::FrameState;
use crate::runtime::Runtime;
use crate::target::Target;

/// Whether the instruction just dispatched ended the current block.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    End,
}

/// A deferred exception edge: the frame as it stood at a trapping instruction, waiting to be
/// materialized as a spill-and-jump adapter once all mainline blocks are emitted.
#[derive(Debug)]
struct AdapterRecord {
    snapshot: FrameState,
    bci: u32,
    handler: usize,
}

/// Compile one method against the given runtime, target and code generator.
pub fn compile_method<'a, G, R>(
    method: &'a MethodInfo,
    runtime: &'a R,
    target: &'a dyn Target,
    gen: G,
    ext: Option<&'a dyn ExtensionResolver>,
) -> Result<CompiledMethod, Bailout>
where
    G: CodeGenerator,
    R: Runtime,
{
    MethodCompiler::new(method, runtime, target, gen, ext).compile()
}

pub struct MethodCompiler<'a, G, R> {
    method: &'a MethodInfo,
    runtime: &'a R,
    target: &'a dyn Target,
    ext: Option<&'a dyn ExtensionResolver>,
    gen: G,
    stream: BytecodeStream<'a>,
    frame: FrameState,
    blocks: Blocks,
    adapters: Vec<AdapterRecord>,
    bytecode_map: Vec<(u32, usize)>,
}

impl<'a, G: CodeGenerator, R: Runtime> MethodCompiler<'a, G, R> {
    pub fn new(
        method: &'a MethodInfo,
        runtime: &'a R,
        target: &'a dyn Target,
        gen: G,
        ext: Option<&'a dyn ExtensionResolver>,
    ) -> Self {
        MethodCompiler {
            stream: BytecodeStream::new(&method.code, ext),
            frame: FrameState::new(method.max_locals as usize, method.max_stack as usize),
            blocks: Blocks::default(),
            adapters: Vec::new(),
            bytecode_map: Vec::new(),
            method,
            runtime,
            target,
            gen,
            ext,
        }
    }

    /// Run the compilation to completion. Any internal failure is converted into a [`Bailout`]
    /// here and nothing is returned; the partially emitted code dies with the compiler.
    pub fn compile(mut self) -> Result<CompiledMethod, Bailout> {
        debug!(
            "compiling {} ({} bytes of bytecode, {} handlers)",
            self.method.name,
            self.method.code.len(),
            self.method.handlers.len()
        );
        match self.run() {
            Ok(artifact) => Ok(artifact),
            Err(cause) => {
                let bailout = Bailout::new(&self.method.name, self.stream.current_bci(), cause);
                warn!("{}", bailout);
                Err(bailout)
            }
        }
    }

    fn run(&mut self) -> Result<CompiledMethod, CompileError> {
        let map = BlockMap::build(&self.method.code, &self.method.handlers, self.ext)?;
        self.blocks = Blocks::new(map);

        let entry = self.entry_state()?;
        self.blocks.enqueue(0, entry);
        while let Some(bci) = self.blocks.dequeue() {
            self.compile_block(bci)?;
        }

        let adapters = self.emit_adapters()?;
        let block_offsets = self.blocks.block_offsets();
        let code = self.gen.finish(&block_offsets)?;

        let slots = self.method.max_locals as usize + self.method.max_stack as usize;
        Ok(CompiledMethod {
            code,
            bytecode_map: mem::take(&mut self.bytecode_map),
            block_offsets,
            adapters,
            frame_size: slots * self.target.word_size(),
        })
    }

    /// Block 0's frame: each parameter sits in a calling-convention register, receiver first
    /// for instance methods.
    fn entry_state(&mut self) -> Result<FrameState, CompileError> {
        let method = self.method;
        let mut frame = FrameState::new(method.max_locals as usize, method.max_stack as usize);

        let mut kinds: SmallVec<[PrimitiveType; 8]> = SmallVec::new();
        if !method.is_static {
            kinds.push(PrimitiveType::Object);
        }
        kinds.extend(method.signature.args.iter().copied());

        let locations =
            self.target
                .parameter_locations(&method.signature, method.is_static, self.gen.registers());
        if locations.len() != kinds.len() {
            return Err(CompileError::Emit(format!(
                "calling convention produced {} locations for {} parameters",
                locations.len(),
                kinds.len()
            )));
        }

        let mut slot = 0;
        for (kind, location) in kinds.into_iter().zip(locations) {
            if kind.is_double_word() {
                frame.define_local2(slot, location)?;
                slot += 2;
            } else {
                frame.define_local(slot, location)?;
                slot += 1;
            }
        }
        Ok(frame)
    }

    fn compile_block(&mut self, bci: u32) -> Result<(), CompileError> {
        let offset = self.gen.code_offset();
        {
            let info = self.blocks.info_mut(bci);
            if info.generated {
                return Ok(());
            }
            info.generated = true;
            info.code_offset = Some(offset);
            self.frame = match info.entry_state.clone() {
                Some(state) => state,
                None => {
                    return Err(CompileError::Malformed(format!(
                        "block at {} was queued without an entry state",
                        bci
                    )))
                }
            };
        }
        debug!("block {} starts at code offset {}", bci, offset);
        self.gen.block_start(bci);
        if bci == 0 {
            self.gen.gen_instrumentation(0)?;
        }

        let exception_entry = self.blocks.map.is_exception_entry(bci);
        if exception_entry {
            // The adapter cleared the operand stack; the handler begins with just the pending
            // exception on it.
            self.frame.clear_stack();
            let exception = self.gen.gen_exception_load()?;
            self.frame.push1(exception)?;
        }
        if exception_entry || self.blocks.map.is_backward_target(bci) {
            self.gen.gen_safepoint()?;
        }

        self.stream.set_bci(bci)?;
        loop {
            let bci = self.stream.current_bci();
            self.bytecode_map.push((bci, self.gen.code_offset()));
            self.gen.bytecode_start(bci);

            let op = Opcode::from_byte(self.stream.opcode());
            if let Some(op) = op {
                trace!("{}: {}", bci, op.mnemonic());
                self.record_exception_state(op, bci);
            } else {
                trace!("{}: extended opcode {:#04x}", bci, self.stream.opcode());
            }

            match self.dispatch(op, bci)? {
                Flow::End => break,
                Flow::Continue => {
                    let next = self.stream.next_bci();
                    if next >= self.stream.end_bci() {
                        return Err(CompileError::Malformed(
                            "control flows off the end of the method".into(),
                        ));
                    }
                    if self.blocks.map.is_block_start(next) {
                        self.frame.spill_all(&mut self.gen, true)?;
                        if self.enqueue_target(next) {
                            // The successor is not the next block emitted, so fall-through
                            // needs a real jump.
                            self.gen.gen_goto(next)?;
                        }
                        break;
                    }
                    self.stream.advance()?;
                }
            }
        }
        Ok(())
    }

    /// Queue the current frame as `bci`'s entry state. Returns true when the block already had
    /// one; the stored state stays authoritative and this caller's spilled slots carry the
    /// transition (no reconciliation moves are emitted).
    fn enqueue_target(&mut self, bci: u32) -> bool {
        let state = self.frame.clone();
        match self.blocks.enqueue(bci, state) {
            Some(entry) => {
                if *entry != self.frame {
                    debug!(
                        "block {} entered with a different frame shape; stored entry state wins",
                        bci
                    );
                }
                true
            }
            None => false,
        }
    }

    /// At a trapping instruction inside a protected range, snapshot the frame for the first
    /// matching handler and make sure the handler block is queued for compilation.
    fn record_exception_state(&mut self, op: Opcode, bci: u32) {
        if self.method.handlers.is_empty() || !op.can_trap() {
            return;
        }
        let handler = match self
            .method
            .handlers
            .iter()
            .position(|handler| handler.covers(bci))
        {
            Some(index) => index,
            None => return,
        };

        let handler_bci = self.method.handlers[handler].catch_start as u32;
        let snapshot = self.frame.clone();
        self.blocks.enqueue(handler_bci, snapshot.handler_entry());
        trace!(
            "exception edge {} -> {} queued for adapter emission",
            bci,
            handler_bci
        );
        self.adapters.push(AdapterRecord {
            snapshot,
            bci,
            handler,
        });
    }

    /// Materialize the queued exception edges: each becomes a stub that spills the snapshotted
    /// locals into their homes and jumps to the handler block.
    fn emit_adapters(&mut self) -> Result<Vec<AdapterStub>, CompileError> {
        let records = mem::take(&mut self.adapters);
        let mut stubs = Vec::with_capacity(records.len());
        for record in records {
            let handler_bci = self.method.handlers[record.handler].catch_start as u32;
            if self.blocks.code_offset(handler_bci).is_none() {
                warn!(
                    "skipping exception adapter for bci {}: handler block {} was never generated",
                    record.bci, handler_bci
                );
                continue;
            }
            let code_offset = self.gen.code_offset();
            let mut snapshot = record.snapshot;
            snapshot.spill_locals(&mut self.gen, true)?;
            snapshot.clear_stack();
            self.gen.gen_goto(handler_bci)?;
            stubs.push(AdapterStub {
                trap_bci: record.bci,
                handler_bci,
                code_offset,
            });
        }
        Ok(stubs)
    }

    /// The opcode dispatch. Each arm translates one instruction into frame-state effects plus
    /// code-generator calls, and reports whether the block ends here.
    fn dispatch(&mut self, op: Option<Opcode>, bci: u32) -> Result<Flow, CompileError> {
        use crate::codegen::ArithOp::*;
        use crate::codegen::Condition::*;
        use crate::codegen::NanBias;
        use bytecode::Opcode::*;
        use bytecode::PrimitiveType::{Byte, Char, Double, Float, Int, Long, Object, Short};

        let op = match op {
            Some(op) => op,
            None => {
                let raw = self.stream.opcode();
                return self.do_extension(raw, bci);
            }
        };

        Ok(match op {
            nop => Flow::Continue,

            // Constants
            aconst_null => {
                self.do_null_constant()?;
                Flow::Continue
            }
            iconst_m1 => {
                self.do_int_constant(-1)?;
                Flow::Continue
            }
            iconst_0 => {
                self.do_int_constant(0)?;
                Flow::Continue
            }
            iconst_1 => {
                self.do_int_constant(1)?;
                Flow::Continue
            }
            iconst_2 => {
                self.do_int_constant(2)?;
                Flow::Continue
            }
            iconst_3 => {
                self.do_int_constant(3)?;
                Flow::Continue
            }
            iconst_4 => {
                self.do_int_constant(4)?;
                Flow::Continue
            }
            iconst_5 => {
                self.do_int_constant(5)?;
                Flow::Continue
            }
            lconst_0 => {
                self.do_long_constant(0)?;
                Flow::Continue
            }
            lconst_1 => {
                self.do_long_constant(1)?;
                Flow::Continue
            }
            fconst_0 => {
                self.do_float_constant(0.0)?;
                Flow::Continue
            }
            fconst_1 => {
                self.do_float_constant(1.0)?;
                Flow::Continue
            }
            fconst_2 => {
                self.do_float_constant(2.0)?;
                Flow::Continue
            }
            dconst_0 => {
                self.do_double_constant(0.0)?;
                Flow::Continue
            }
            dconst_1 => {
                self.do_double_constant(1.0)?;
                Flow::Continue
            }
            bipush => {
                let value = self.stream.read_byte()? as i32;
                self.do_int_constant(value)?;
                Flow::Continue
            }
            sipush => {
                let value = self.stream.read_short()? as i32;
                self.do_int_constant(value)?;
                Flow::Continue
            }
            ldc => {
                let cpi = self.stream.read_unsigned_byte()? as u16;
                self.do_ldc(cpi)?;
                Flow::Continue
            }
            ldc_w => {
                let cpi = self.stream.read_cpi()?;
                self.do_ldc(cpi)?;
                Flow::Continue
            }
            ldc2_w => {
                let cpi = self.stream.read_cpi()?;
                self.do_ldc2(cpi)?;
                Flow::Continue
            }

            // Local loads. A load is pure frame motion; no code is emitted.
            iload | fload | aload => {
                let index = self.stream.read_local_index()?;
                self.frame.load1(index as usize)?;
                Flow::Continue
            }
            lload | dload => {
                let index = self.stream.read_local_index()?;
                self.frame.load2(index as usize)?;
                Flow::Continue
            }
            iload_0 | fload_0 | aload_0 => {
                self.frame.load1(0)?;
                Flow::Continue
            }
            iload_1 | fload_1 | aload_1 => {
                self.frame.load1(1)?;
                Flow::Continue
            }
            iload_2 | fload_2 | aload_2 => {
                self.frame.load1(2)?;
                Flow::Continue
            }
            iload_3 | fload_3 | aload_3 => {
                self.frame.load1(3)?;
                Flow::Continue
            }
            lload_0 | dload_0 => {
                self.frame.load2(0)?;
                Flow::Continue
            }
            lload_1 | dload_1 => {
                self.frame.load2(1)?;
                Flow::Continue
            }
            lload_2 | dload_2 => {
                self.frame.load2(2)?;
                Flow::Continue
            }
            lload_3 | dload_3 => {
                self.frame.load2(3)?;
                Flow::Continue
            }

            // Local stores
            istore | fstore | astore => {
                let index = self.stream.read_local_index()?;
                self.frame.store1(index as usize)?;
                Flow::Continue
            }
            lstore | dstore => {
                let index = self.stream.read_local_index()?;
                self.frame.store2(index as usize)?;
                Flow::Continue
            }
            istore_0 | fstore_0 | astore_0 => {
                self.frame.store1(0)?;
                Flow::Continue
            }
            istore_1 | fstore_1 | astore_1 => {
                self.frame.store1(1)?;
                Flow::Continue
            }
            istore_2 | fstore_2 | astore_2 => {
                self.frame.store1(2)?;
                Flow::Continue
            }
            istore_3 | fstore_3 | astore_3 => {
                self.frame.store1(3)?;
                Flow::Continue
            }
            lstore_0 | dstore_0 => {
                self.frame.store2(0)?;
                Flow::Continue
            }
            lstore_1 | dstore_1 => {
                self.frame.store2(1)?;
                Flow::Continue
            }
            lstore_2 | dstore_2 => {
                self.frame.store2(2)?;
                Flow::Continue
            }
            lstore_3 | dstore_3 => {
                self.frame.store2(3)?;
                Flow::Continue
            }

            // Arrays
            iaload => {
                self.do_array_load(Int)?;
                Flow::Continue
            }
            laload => {
                self.do_array_load(Long)?;
                Flow::Continue
            }
            faload => {
                self.do_array_load(Float)?;
                Flow::Continue
            }
            daload => {
                self.do_array_load(Double)?;
                Flow::Continue
            }
            aaload => {
                self.do_array_load(Object)?;
                Flow::Continue
            }
            baload => {
                self.do_array_load(Byte)?;
                Flow::Continue
            }
            caload => {
                self.do_array_load(Char)?;
                Flow::Continue
            }
            saload => {
                self.do_array_load(Short)?;
                Flow::Continue
            }
            iastore => {
                self.do_array_store(Int)?;
                Flow::Continue
            }
            lastore => {
                self.do_array_store(Long)?;
                Flow::Continue
            }
            fastore => {
                self.do_array_store(Float)?;
                Flow::Continue
            }
            dastore => {
                self.do_array_store(Double)?;
                Flow::Continue
            }
            aastore => {
                self.do_array_store(Object)?;
                Flow::Continue
            }
            bastore => {
                self.do_array_store(Byte)?;
                Flow::Continue
            }
            castore => {
                self.do_array_store(Char)?;
                Flow::Continue
            }
            sastore => {
                self.do_array_store(Short)?;
                Flow::Continue
            }

            // Stack shuffles; symbolic only, no code
            pop => {
                self.frame.drop_slots(1)?;
                Flow::Continue
            }
            pop2 => {
                self.frame.drop_slots(2)?;
                Flow::Continue
            }
            dup => {
                self.frame.dup_slots(1, 0)?;
                Flow::Continue
            }
            dup_x1 => {
                self.frame.dup_slots(1, 1)?;
                Flow::Continue
            }
            dup_x2 => {
                self.frame.dup_slots(1, 2)?;
                Flow::Continue
            }
            dup2 => {
                self.frame.dup_slots(2, 0)?;
                Flow::Continue
            }
            dup2_x1 => {
                self.frame.dup_slots(2, 1)?;
                Flow::Continue
            }
            dup2_x2 => {
                self.frame.dup_slots(2, 2)?;
                Flow::Continue
            }
            swap => {
                self.frame.swap()?;
                Flow::Continue
            }

            // Arithmetic
            iadd => {
                self.do_int_op2(Add)?;
                Flow::Continue
            }
            isub => {
                self.do_int_op2(Sub)?;
                Flow::Continue
            }
            imul => {
                self.do_int_op2(Mul)?;
                Flow::Continue
            }
            idiv => {
                self.do_int_op2(Div)?;
                Flow::Continue
            }
            irem => {
                self.do_int_op2(Rem)?;
                Flow::Continue
            }
            ishl => {
                self.do_int_op2(Shl)?;
                Flow::Continue
            }
            ishr => {
                self.do_int_op2(Shr)?;
                Flow::Continue
            }
            iushr => {
                self.do_int_op2(Ushr)?;
                Flow::Continue
            }
            iand => {
                self.do_int_op2(And)?;
                Flow::Continue
            }
            ior => {
                self.do_int_op2(Or)?;
                Flow::Continue
            }
            ixor => {
                self.do_int_op2(Xor)?;
                Flow::Continue
            }
            ladd => {
                self.do_long_op2(Add)?;
                Flow::Continue
            }
            lsub => {
                self.do_long_op2(Sub)?;
                Flow::Continue
            }
            lmul => {
                self.do_long_op2(Mul)?;
                Flow::Continue
            }
            ldiv => {
                self.do_long_op2(Div)?;
                Flow::Continue
            }
            lrem => {
                self.do_long_op2(Rem)?;
                Flow::Continue
            }
            land => {
                self.do_long_op2(And)?;
                Flow::Continue
            }
            lor => {
                self.do_long_op2(Or)?;
                Flow::Continue
            }
            lxor => {
                self.do_long_op2(Xor)?;
                Flow::Continue
            }
            lshl => {
                self.do_long_shift(Shl)?;
                Flow::Continue
            }
            lshr => {
                self.do_long_shift(Shr)?;
                Flow::Continue
            }
            lushr => {
                self.do_long_shift(Ushr)?;
                Flow::Continue
            }
            fadd => {
                self.do_float_op2(Add)?;
                Flow::Continue
            }
            fsub => {
                self.do_float_op2(Sub)?;
                Flow::Continue
            }
            fmul => {
                self.do_float_op2(Mul)?;
                Flow::Continue
            }
            fdiv => {
                self.do_float_op2(Div)?;
                Flow::Continue
            }
            frem => {
                self.do_float_op2(Rem)?;
                Flow::Continue
            }
            dadd => {
                self.do_double_op2(Add)?;
                Flow::Continue
            }
            dsub => {
                self.do_double_op2(Sub)?;
                Flow::Continue
            }
            dmul => {
                self.do_double_op2(Mul)?;
                Flow::Continue
            }
            ddiv => {
                self.do_double_op2(Div)?;
                Flow::Continue
            }
            drem => {
                self.do_double_op2(Rem)?;
                Flow::Continue
            }
            ineg => {
                self.do_neg(Int)?;
                Flow::Continue
            }
            lneg => {
                self.do_neg(Long)?;
                Flow::Continue
            }
            fneg => {
                self.do_neg(Float)?;
                Flow::Continue
            }
            dneg => {
                self.do_neg(Double)?;
                Flow::Continue
            }
            iinc => {
                self.do_iinc()?;
                Flow::Continue
            }

            // Conversions
            i2l => {
                self.do_convert(Int, Long)?;
                Flow::Continue
            }
            i2f => {
                self.do_convert(Int, Float)?;
                Flow::Continue
            }
            i2d => {
                self.do_convert(Int, Double)?;
                Flow::Continue
            }
            l2i => {
                self.do_convert(Long, Int)?;
                Flow::Continue
            }
            l2f => {
                self.do_convert(Long, Float)?;
                Flow::Continue
            }
            l2d => {
                self.do_convert(Long, Double)?;
                Flow::Continue
            }
            f2i => {
                self.do_convert(Float, Int)?;
                Flow::Continue
            }
            f2l => {
                self.do_convert(Float, Long)?;
                Flow::Continue
            }
            f2d => {
                self.do_convert(Float, Double)?;
                Flow::Continue
            }
            d2i => {
                self.do_convert(Double, Int)?;
                Flow::Continue
            }
            d2l => {
                self.do_convert(Double, Long)?;
                Flow::Continue
            }
            d2f => {
                self.do_convert(Double, Float)?;
                Flow::Continue
            }
            i2b => {
                self.do_convert(Int, Byte)?;
                Flow::Continue
            }
            i2c => {
                self.do_convert(Int, Char)?;
                Flow::Continue
            }
            i2s => {
                self.do_convert(Int, Short)?;
                Flow::Continue
            }

            // Comparisons
            lcmp => {
                self.do_compare(Long, NanBias::Low)?;
                Flow::Continue
            }
            fcmpl => {
                self.do_compare(Float, NanBias::Low)?;
                Flow::Continue
            }
            fcmpg => {
                self.do_compare(Float, NanBias::High)?;
                Flow::Continue
            }
            dcmpl => {
                self.do_compare(Double, NanBias::Low)?;
                Flow::Continue
            }
            dcmpg => {
                self.do_compare(Double, NanBias::High)?;
                Flow::Continue
            }

            // Branches
            ifeq => self.do_if_zero(Eq)?,
            ifne => self.do_if_zero(Ne)?,
            iflt => self.do_if_zero(Lt)?,
            ifge => self.do_if_zero(Ge)?,
            ifgt => self.do_if_zero(Gt)?,
            ifle => self.do_if_zero(Le)?,
            if_icmpeq => self.do_if_same(Eq, Int)?,
            if_icmpne => self.do_if_same(Ne, Int)?,
            if_icmplt => self.do_if_same(Lt, Int)?,
            if_icmpge => self.do_if_same(Ge, Int)?,
            if_icmpgt => self.do_if_same(Gt, Int)?,
            if_icmple => self.do_if_same(Le, Int)?,
            if_acmpeq => self.do_if_same(Eq, Object)?,
            if_acmpne => self.do_if_same(Ne, Object)?,
            ifnull => self.do_if_null(Eq)?,
            ifnonnull => self.do_if_null(Ne)?,
            goto => self.do_goto(false)?,
            goto_w => self.do_goto(true)?,
            jsr => self.do_jsr(false)?,
            jsr_w => self.do_jsr(true)?,
            ret => self.do_ret()?,
            tableswitch => self.do_tableswitch(bci)?,
            lookupswitch => self.do_lookupswitch(bci)?,

            // Returns and throw
            ireturn | freturn | areturn => self.do_return1()?,
            lreturn | dreturn => self.do_return2()?,
            r#return => self.do_return_void()?,
            athrow => self.do_athrow()?,

            // Field access and calls
            getstatic => {
                let cpi = self.stream.read_cpi()?;
                self.do_get_static(cpi)?;
                Flow::Continue
            }
            putstatic => {
                let cpi = self.stream.read_cpi()?;
                self.do_put_static(cpi)?;
                Flow::Continue
            }
            getfield => {
                let cpi = self.stream.read_cpi()?;
                self.do_get_field(cpi)?;
                Flow::Continue
            }
            putfield => {
                let cpi = self.stream.read_cpi()?;
                self.do_put_field(cpi)?;
                Flow::Continue
            }
            invokevirtual => {
                let cpi = self.stream.read_cpi()?;
                self.do_invoke(class::InvokeKind::Virtual, cpi)?;
                Flow::Continue
            }
            invokespecial => {
                let cpi = self.stream.read_cpi()?;
                self.do_invoke(class::InvokeKind::Special, cpi)?;
                Flow::Continue
            }
            invokestatic => {
                let cpi = self.stream.read_cpi()?;
                self.do_invoke(class::InvokeKind::Static, cpi)?;
                Flow::Continue
            }
            invokeinterface => {
                let cpi = self.stream.read_cpi()?;
                self.do_invoke(class::InvokeKind::Interface, cpi)?;
                Flow::Continue
            }

            // Allocation and type checks
            new => {
                let cpi = self.stream.read_cpi()?;
                self.do_new(cpi)?;
                Flow::Continue
            }
            newarray => {
                self.do_newarray()?;
                Flow::Continue
            }
            anewarray => {
                let cpi = self.stream.read_cpi()?;
                self.do_anewarray(cpi)?;
                Flow::Continue
            }
            multianewarray => {
                self.do_multianewarray(bci)?;
                Flow::Continue
            }
            arraylength => {
                self.do_array_length()?;
                Flow::Continue
            }
            checkcast => {
                let cpi = self.stream.read_cpi()?;
                self.do_checkcast(cpi)?;
                Flow::Continue
            }
            instanceof => {
                let cpi = self.stream.read_cpi()?;
                self.do_instanceof(cpi)?;
                Flow::Continue
            }
            monitorenter => {
                self.do_monitor(true)?;
                Flow::Continue
            }
            monitorexit => {
                self.do_monitor(false)?;
                Flow::Continue
            }

            breakpoint => {
                self.gen.gen_breakpoint()?;
                Flow::Continue
            }

            // The stream folds wide prefixes away, so seeing one here is a decoder bug
            wide => {
                return Err(CompileError::Malformed(format!(
                    "unhandled wide prefix at {}",
                    bci
                )))
            }
        })
    }

    /// An opcode outside the standard set: behave like a call with the resolver-described
    /// signature.
    fn do_extension(&mut self, opcode: u8, bci: u32) -> Result<Flow, CompileError> {
        let resolver = match self.ext {
            Some(resolver) => resolver,
            None => return Err(CompileError::UnknownExtension { opcode, bci }),
        };
        let decoded = resolver
            .resolve(opcode, bci, &self.method.code)
            .ok_or(CompileError::UnknownExtension { opcode, bci })?;

        let args = self.frame.pop_many(decoded.arg_slots)?;
        let result = self.gen.gen_invoke_extended(opcode, &decoded, &args)?;
        self.frame.push_result(result, decoded.return_kind)?;
        Ok(Flow::Continue)
    }
}
