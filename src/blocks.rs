//! Basic-block discovery and the compilation worklist.
//!
//! The marker pre-pass scans every instruction exactly once and produces a byte map with three
//! independent bits per bytecode position. Everything else here is bookkeeping for the LIFO
//! worklist drain: per-block state is created lazily, only for positions that turn out to be
//! block entries.

use hashbrown::HashMap;

use bytecode::{BytecodeStream, ExceptionRange, ExtensionResolver, Opcode};
use bytecode::{LookupSwitch, TableSwitch};

use crate::error::CompileError;
use crate::frame::FrameState;

bitflags! {
    pub struct BlockFlags: u8 {
        const START = 0b0000_0001;
        const BACKWARD_TARGET = 0b0000_0010;
        const EXCEPTION_ENTRY = 0b0000_0100;
    }
}

/// One byte of flags per bytecode position.
#[derive(Debug, Default)]
pub struct BlockMap {
    flags: Vec<BlockFlags>,
}

impl BlockMap {
    /// Scan the method once, marking block starts (position 0, every branch/switch target,
    /// everything following a branch, switch, return, throw or ret, handler region starts and
    /// handler entries), backward-branch targets, and exception entries.
    pub fn build(
        code: &[u8],
        handlers: &[ExceptionRange],
        ext: Option<&dyn ExtensionResolver>,
    ) -> Result<BlockMap, CompileError> {
        if code.is_empty() {
            return Err(CompileError::Malformed("method has no bytecode".into()));
        }

        let mut map = BlockMap {
            flags: vec![BlockFlags::empty(); code.len()],
        };
        map.flags[0] |= BlockFlags::START;

        let mut stream = BytecodeStream::new(code, ext);
        let mut bci = 0;
        loop {
            stream.set_bci(bci)?;
            let next = stream.next_bci();

            match Opcode::from_byte(stream.opcode()) {
                Some(
                    Opcode::ifeq
                    | Opcode::ifne
                    | Opcode::iflt
                    | Opcode::ifge
                    | Opcode::ifgt
                    | Opcode::ifle
                    | Opcode::if_icmpeq
                    | Opcode::if_icmpne
                    | Opcode::if_icmplt
                    | Opcode::if_icmpge
                    | Opcode::if_icmpgt
                    | Opcode::if_icmple
                    | Opcode::if_acmpeq
                    | Opcode::if_acmpne
                    | Opcode::ifnull
                    | Opcode::ifnonnull
                    | Opcode::goto
                    | Opcode::jsr,
                ) => {
                    let target = stream.read_branch_dest()?;
                    map.mark_branch(bci, target);
                    map.mark_following(next);
                }
                Some(Opcode::goto_w | Opcode::jsr_w) => {
                    let target = stream.read_far_branch_dest()?;
                    map.mark_branch(bci, target);
                    map.mark_following(next);
                }
                Some(Opcode::tableswitch) => {
                    let table = TableSwitch::decode(code, bci)?;
                    map.mark_branch(bci, table.default_target);
                    for target in &table.targets {
                        map.mark_branch(bci, *target);
                    }
                    map.mark_following(next);
                }
                Some(Opcode::lookupswitch) => {
                    let table = LookupSwitch::decode(code, bci)?;
                    map.mark_branch(bci, table.default_target);
                    for (_, target) in &table.pairs {
                        map.mark_branch(bci, *target);
                    }
                    map.mark_following(next);
                }
                Some(
                    Opcode::ireturn
                    | Opcode::lreturn
                    | Opcode::freturn
                    | Opcode::dreturn
                    | Opcode::areturn
                    | Opcode::r#return
                    | Opcode::athrow
                    | Opcode::ret,
                ) => map.mark_following(next),
                _ => {}
            }

            if next >= stream.end_bci() {
                break;
            }
            bci = next;
        }

        for handler in handlers {
            let end = code.len();
            if handler.try_start as usize > handler.try_end as usize
                || handler.try_end as usize > end
                || handler.catch_start as usize >= end
            {
                return Err(CompileError::Malformed(format!(
                    "exception handler [{}, {}) -> {} is out of range",
                    handler.try_start, handler.try_end, handler.catch_start
                )));
            }
            if (handler.try_start as usize) < end {
                map.flags[handler.try_start as usize] |= BlockFlags::START;
            }
            map.flags[handler.catch_start as usize] |=
                BlockFlags::START | BlockFlags::EXCEPTION_ENTRY;
        }

        Ok(map)
    }

    fn mark_branch(&mut self, source: u32, target: u32) {
        self.flags[target as usize] |= BlockFlags::START;
        if target <= source {
            self.flags[target as usize] |= BlockFlags::BACKWARD_TARGET;
        }
    }

    fn mark_following(&mut self, bci: u32) {
        if (bci as usize) < self.flags.len() {
            self.flags[bci as usize] |= BlockFlags::START;
        }
    }

    pub fn is_block_start(&self, bci: u32) -> bool {
        self.get(bci).contains(BlockFlags::START)
    }

    /// Backward-branch targets need a safepoint in their prologue.
    pub fn is_backward_target(&self, bci: u32) -> bool {
        self.get(bci).contains(BlockFlags::BACKWARD_TARGET)
    }

    pub fn is_exception_entry(&self, bci: u32) -> bool {
        self.get(bci).contains(BlockFlags::EXCEPTION_ENTRY)
    }

    fn get(&self, bci: u32) -> BlockFlags {
        self.flags
            .get(bci as usize)
            .copied()
            .unwrap_or_else(BlockFlags::empty)
    }
}

/// Metadata for one block entry, created the first time an edge reaches the position.
#[derive(Debug, Default)]
pub struct BlockInfo {
    pub generated: bool,
    pub code_offset: Option<usize>,
    pub entry_state: Option<FrameState>,
}

/// The block map, the lazily-populated per-block info table, and the worklist of bcis awaiting
/// compilation.
#[derive(Debug, Default)]
pub struct Blocks {
    pub map: BlockMap,
    info: HashMap<u32, BlockInfo>,
    worklist: Vec<u32>,
}

impl Blocks {
    pub fn new(map: BlockMap) -> Self {
        Blocks {
            map,
            info: HashMap::new(),
            worklist: Vec::new(),
        }
    }

    /// First-writer-wins entry-state policy. Returns `None` when `state` was installed and the
    /// block queued; otherwise returns the stored entry state. No reconciliation is emitted
    /// here: a caller arriving with a different state must have materialized the transition
    /// (spilled to the slot homes) before control reaches the block.
    pub fn enqueue(&mut self, bci: u32, state: FrameState) -> Option<&FrameState> {
        let info = self.info.entry(bci).or_default();
        match info.entry_state {
            None => {
                info.entry_state = Some(state);
                self.worklist.push(bci);
                None
            }
            Some(ref existing) => Some(existing),
        }
    }

    /// Pop the next block to compile, LIFO order.
    pub fn dequeue(&mut self) -> Option<u32> {
        self.worklist.pop()
    }

    pub fn info_mut(&mut self, bci: u32) -> &mut BlockInfo {
        self.info.entry(bci).or_default()
    }

    pub fn code_offset(&self, bci: u32) -> Option<usize> {
        self.info.get(&bci).and_then(|info| info.code_offset)
    }

    /// The bci -> code offset map over every generated block.
    pub fn block_offsets(&self) -> HashMap<u32, usize> {
        self.info
            .iter()
            .filter_map(|(bci, info)| info.code_offset.map(|offset| (*bci, offset)))
            .collect()
    }
}
