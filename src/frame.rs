//! The symbolic frame: which Location currently holds each local-variable and operand-stack
//! slot, and what is resident in each slot's spill home.
//!
//! Double-word values occupy two consecutive slots. The value's Location sits at the lower
//! index; the slot above it holds a `None` sentinel. Every stack operator below preserves that
//! shape, including the dup/swap family, which permutes raw slots without interpreting them.

use smallvec::SmallVec;
use thiserror::Error;

use bytecode::PrimitiveType;

use crate::codegen::CodeGenerator;
use crate::error::CompileError;
use crate::location::Location;

pub type SlotVec = SmallVec<[Option<Location>; 8]>;

#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Triggered when a push would exceed the method's max_locals + max_stack slots
    #[error("operand stack overflow")]
    Overflow,
    /// Triggered when a pop would drop below the first operand-stack slot
    #[error("operand stack underflow")]
    Underflow,
    /// The index of a local variable is out of bounds
    #[error("local variable index out of bounds")]
    LocalIndexOutOfBounds,
    /// A slot with no defined value was read, e.g. the sentinel half of a long
    #[error("use of an undefined frame slot")]
    UndefinedSlot,
}

/// Per-block abstract value environment. `state[i]` is the most recent authoritative location
/// for slot `i` (`None` = undefined); `memory[i]` is the location whose value currently sits in
/// slot `i`'s spill home. `stack_index` is the next free operand-stack position and starts at
/// `max_locals`.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameState {
    state: Vec<Option<Location>>,
    memory: Vec<Option<Location>>,
    stack_index: usize,
    max_locals: usize,
}

impl FrameState {
    pub fn new(max_locals: usize, max_stack: usize) -> Self {
        let slots = max_locals + max_stack;
        FrameState {
            state: vec![None; slots],
            memory: vec![None; slots],
            stack_index: max_locals,
            max_locals,
        }
    }

    pub fn max_locals(&self) -> usize {
        self.max_locals
    }

    pub fn stack_index(&self) -> usize {
        self.stack_index
    }

    fn check_room(&self, slots: usize) -> Result<(), FrameError> {
        if self.stack_index + slots > self.state.len() {
            return Err(FrameError::Overflow);
        }
        Ok(())
    }

    fn check_depth(&self, slots: usize) -> Result<(), FrameError> {
        if self.stack_index < self.max_locals + slots {
            return Err(FrameError::Underflow);
        }
        Ok(())
    }

    pub fn push1(&mut self, value: Location) -> Result<(), FrameError> {
        self.check_room(1)?;
        self.state[self.stack_index] = Some(value);
        self.stack_index += 1;
        Ok(())
    }

    pub fn push2(&mut self, value: Location) -> Result<(), FrameError> {
        self.check_room(2)?;
        self.state[self.stack_index] = Some(value);
        self.state[self.stack_index + 1] = None;
        self.stack_index += 2;
        Ok(())
    }

    pub fn pop1(&mut self) -> Result<Location, FrameError> {
        self.check_depth(1)?;
        self.stack_index -= 1;
        self.state[self.stack_index]
            .take()
            .ok_or(FrameError::UndefinedSlot)
    }

    /// Pop a double-word value: the sentinel slot above must be empty, the value slot below
    /// holds the location.
    pub fn pop2(&mut self) -> Result<Location, FrameError> {
        self.check_depth(2)?;
        self.stack_index -= 2;
        if self.state[self.stack_index + 1].take().is_some() {
            return Err(FrameError::UndefinedSlot);
        }
        self.state[self.stack_index]
            .take()
            .ok_or(FrameError::UndefinedSlot)
    }

    /// Pop the top `n` raw slots, returned in source order (bottom-most first). Sentinel slots
    /// come back as `None`; this is the shape invoke argument lists are collected in.
    pub fn pop_many(&mut self, n: usize) -> Result<SlotVec, FrameError> {
        self.check_depth(n)?;
        let bottom = self.stack_index - n;
        let values = self.state[bottom..self.stack_index].iter().copied().collect();
        for slot in &mut self.state[bottom..self.stack_index] {
            *slot = None;
        }
        self.stack_index = bottom;
        Ok(values)
    }

    /// Push according to the kind's width; void pushes nothing.
    pub fn push_kind(&mut self, value: Location, kind: PrimitiveType) -> Result<(), FrameError> {
        match kind.slots() {
            2 => self.push2(value),
            1 => self.push1(value),
            _ => Ok(()),
        }
    }

    pub fn pop_kind(&mut self, kind: PrimitiveType) -> Result<Location, FrameError> {
        if kind.is_double_word() {
            self.pop2()
        } else {
            self.pop1()
        }
    }

    /// Push a call-site result only when the return kind is non-void.
    pub fn push_result(
        &mut self,
        value: Option<Location>,
        kind: PrimitiveType,
    ) -> Result<(), FrameError> {
        match value {
            Some(value) if kind != PrimitiveType::Void => self.push_kind(value, kind),
            _ => Ok(()),
        }
    }

    fn check_local(&self, index: usize, slots: usize) -> Result<(), FrameError> {
        if index + slots > self.max_locals {
            return Err(FrameError::LocalIndexOutOfBounds);
        }
        Ok(())
    }

    /// The current location of local `index`.
    pub fn local(&self, index: usize) -> Result<Location, FrameError> {
        self.check_local(index, 1)?;
        self.state[index].ok_or(FrameError::UndefinedSlot)
    }

    pub fn set_local(&mut self, index: usize, value: Location) -> Result<(), FrameError> {
        self.check_local(index, 1)?;
        self.state[index] = Some(value);
        Ok(())
    }

    pub fn set_local2(&mut self, index: usize, value: Location) -> Result<(), FrameError> {
        self.check_local(index, 2)?;
        self.state[index] = Some(value);
        self.state[index + 1] = None;
        Ok(())
    }

    /// Install an incoming parameter. The calling convention has already stored the value in
    /// the local's frame home, so the slot starts out resident and needs no spill until it is
    /// overwritten.
    pub fn define_local(&mut self, index: usize, value: Location) -> Result<(), FrameError> {
        self.set_local(index, value)?;
        self.memory[index] = Some(value);
        Ok(())
    }

    pub fn define_local2(&mut self, index: usize, value: Location) -> Result<(), FrameError> {
        self.set_local2(index, value)?;
        self.memory[index] = Some(value);
        self.memory[index + 1] = None;
        Ok(())
    }

    /// Push the location of local `index`. No fresh register is produced: a load is pure frame
    /// motion.
    pub fn load1(&mut self, index: usize) -> Result<(), FrameError> {
        let value = self.local(index)?;
        self.push1(value)
    }

    pub fn load2(&mut self, index: usize) -> Result<(), FrameError> {
        self.check_local(index, 2)?;
        let value = self.state[index].ok_or(FrameError::UndefinedSlot)?;
        if self.state[index + 1].is_some() {
            return Err(FrameError::UndefinedSlot);
        }
        self.push2(value)
    }

    pub fn store1(&mut self, index: usize) -> Result<(), FrameError> {
        let value = self.pop1()?;
        self.set_local(index, value)
    }

    /// Pop a double-word value and place it at local `index`, clearing the sentinel slot above.
    pub fn store2(&mut self, index: usize) -> Result<(), FrameError> {
        let value = self.pop2()?;
        self.set_local2(index, value)
    }

    /// Drop the top slots of a cleared operand stack (the `pop`/`pop2` opcodes).
    pub fn drop_slots(&mut self, n: usize) -> Result<(), FrameError> {
        self.pop_many(n).map(|_| ())
    }

    /// Duplicate the top `dup` slots and insert the copy `skip` slots further down. Covers the
    /// whole dup family: dup = (1,0), dup_x1 = (1,1), dup_x2 = (1,2), dup2 = (2,0),
    /// dup2_x1 = (2,1), dup2_x2 = (2,2).
    pub fn dup_slots(&mut self, dup: usize, skip: usize) -> Result<(), FrameError> {
        self.check_depth(dup + skip)?;
        self.check_room(dup)?;
        let top = self.stack_index;
        let window: SlotVec = self.state[top - dup..top].iter().copied().collect();
        self.state.copy_within(top - dup - skip..top, top - dup - skip + dup);
        self.state[top - dup - skip..top - dup - skip + dup].copy_from_slice(&window);
        self.stack_index += dup;
        Ok(())
    }

    pub fn swap(&mut self) -> Result<(), FrameError> {
        self.check_depth(2)?;
        self.state.swap(self.stack_index - 1, self.stack_index - 2);
        Ok(())
    }

    /// Discard the operand stack, e.g. on entry to an exception handler.
    pub fn clear_stack(&mut self) {
        for slot in &mut self.state[self.max_locals..self.stack_index] {
            *slot = None;
        }
        self.stack_index = self.max_locals;
    }

    /// Spill slots `[0, up_to)`: every slot whose location is not already resident in its spill
    /// home gets a move to the canonical stack slot. With `kill`, the slot's authoritative
    /// location is redirected to the stack slot as well, so later uses read the home.
    pub fn spill_some<G: CodeGenerator + ?Sized>(
        &mut self,
        gen: &mut G,
        up_to: usize,
        kill: bool,
    ) -> Result<(), CompileError> {
        let limit = up_to.min(self.state.len());
        for index in 0..limit {
            let current = match self.state[index] {
                Some(location) => location,
                None => continue,
            };
            if self.memory[index] == Some(current) {
                continue;
            }
            let home = Location::stack_slot(index);
            if current != home {
                gen.gen_move(home, current)?;
            }
            self.memory[index] = Some(current);
            if kill {
                self.state[index] = Some(home);
                self.memory[index] = Some(home);
            }
        }
        Ok(())
    }

    /// Spill the local-variable prefix of the frame.
    pub fn spill_locals<G: CodeGenerator + ?Sized>(
        &mut self,
        gen: &mut G,
        kill: bool,
    ) -> Result<(), CompileError> {
        let max_locals = self.max_locals;
        self.spill_some(gen, max_locals, kill)
    }

    /// Spill locals and the live operand stack.
    pub fn spill_all<G: CodeGenerator + ?Sized>(
        &mut self,
        gen: &mut G,
        kill: bool,
    ) -> Result<(), CompileError> {
        let stack_index = self.stack_index;
        self.spill_some(gen, stack_index, kill)
    }

    /// The entry state an exception handler sees: operand stack cleared, every defined local
    /// resident in its spill home. The adapter stub's spill makes this true at run time before
    /// the jump.
    pub fn handler_entry(&self) -> FrameState {
        let mut entry = self.clone();
        entry.clear_stack();
        for slot in &mut entry.memory[entry.max_locals..] {
            *slot = None;
        }
        for index in 0..entry.max_locals {
            if entry.state[index].is_some() {
                let home = Location::stack_slot(index);
                entry.state[index] = Some(home);
                entry.memory[index] = Some(home);
            } else {
                entry.memory[index] = None;
            }
        }
        entry
    }
}
