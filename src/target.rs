//! The abstract target description: word size plus the calling-convention view of a method's
//! parameters.

use smallvec::SmallVec;

use bytecode::MethodSignature;

use crate::location::{Location, Registers};

pub trait Target {
    /// Size in bytes of one machine word, and therefore of one frame slot.
    fn word_size(&self) -> usize;

    /// The incoming parameter layout as a sequence of producer registers typed by the
    /// signature, receiver first for instance methods. The registers are minted from the
    /// compilation's own counter so ids stay unique across the method.
    fn parameter_locations(
        &self,
        signature: &MethodSignature,
        is_static: bool,
        registers: &mut Registers,
    ) -> SmallVec<[Location; 8]>;
}
