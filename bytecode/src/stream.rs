//! Random-access cursor over a method's code array with opcode-aware operand decoding.
//!
//! Decoding here is purely syntactic: the stream never touches frame state or the code
//! generator. All quantities are big-endian, read the same way the class-file loader reads them.

use std::io::Cursor;

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use thiserror::Error;

use crate::opcode::Opcode;
use crate::types::PrimitiveType;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Positioning the stream outside the code array
    #[error("bytecode index {0} is outside the method")]
    OutOfBounds(u32),
    /// An instruction whose operands run past the end of the code array
    #[error("instruction at bci {0} is truncated")]
    Truncated(u32),
    /// An opcode byte with no standard decoding and no extension resolver match
    #[error("unknown opcode {opcode:#04x} at bci {bci}")]
    UnknownOpcode { opcode: u8, bci: u32 },
    /// A wide prefix applied to an instruction that does not take a local index
    #[error("wide prefix applied to {opcode:#04x} at bci {bci}")]
    BadWide { opcode: u8, bci: u32 },
    #[error("malformed switch at bci {bci}: {detail}")]
    BadSwitch { bci: u32, detail: &'static str },
    #[error("branch at bci {bci} targets {target}, outside the method")]
    BadBranch { bci: u32, target: i64 },
}

/// An extended bytecode decoded by an [`ExtensionResolver`]: how many bytes it occupies, how many
/// operand-stack slots it consumes, and the kind it pushes (void for none).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedOp {
    pub length: usize,
    pub arg_slots: usize,
    pub return_kind: PrimitiveType,
}

/// Optional hook for opcode bytes outside the standard set. Without a resolver, an unknown
/// opcode is a compilation-fatal decode error.
pub trait ExtensionResolver {
    fn resolve(&self, opcode: u8, bci: u32, code: &[u8]) -> Option<ExtendedOp>;
}

/// Total encoded length in bytes of the instruction starting at `bci`.
pub fn instruction_length(
    code: &[u8],
    bci: u32,
    ext: Option<&dyn ExtensionResolver>,
) -> Result<usize, StreamError> {
    let byte = *code
        .get(bci as usize)
        .ok_or(StreamError::OutOfBounds(bci))?;

    match Opcode::from_byte(byte) {
        Some(Opcode::wide) => {
            let sub = *code
                .get(bci as usize + 1)
                .ok_or(StreamError::Truncated(bci))?;
            match Opcode::from_byte(sub) {
                Some(Opcode::iinc) => Ok(6),
                Some(
                    Opcode::iload
                    | Opcode::lload
                    | Opcode::fload
                    | Opcode::dload
                    | Opcode::aload
                    | Opcode::istore
                    | Opcode::lstore
                    | Opcode::fstore
                    | Opcode::dstore
                    | Opcode::astore
                    | Opcode::ret,
                ) => Ok(4),
                _ => Err(StreamError::BadWide { opcode: sub, bci }),
            }
        }
        Some(Opcode::tableswitch) => Ok(TableSwitch::decode(code, bci)?.length()),
        Some(Opcode::lookupswitch) => Ok(LookupSwitch::decode(code, bci)?.length()),
        Some(op) => op
            .length()
            .ok_or(StreamError::UnknownOpcode { opcode: byte, bci }),
        None => match ext.and_then(|r| r.resolve(byte, bci, code)) {
            Some(decoded) if decoded.length > 0 => Ok(decoded.length),
            _ => Err(StreamError::UnknownOpcode { opcode: byte, bci }),
        },
    }
}

pub struct BytecodeStream<'a> {
    code: &'a [u8],
    ext: Option<&'a dyn ExtensionResolver>,
    bci: u32,
    next: u32,
    opcode: u8,
    wide: bool,
    // Index of the next operand byte to be read
    cursor: usize,
}

impl<'a> BytecodeStream<'a> {
    pub fn new(code: &'a [u8], ext: Option<&'a dyn ExtensionResolver>) -> Self {
        BytecodeStream {
            code,
            ext,
            bci: 0,
            next: 0,
            opcode: Opcode::nop as u8,
            wide: false,
            cursor: 0,
        }
    }

    /// Position the stream at the start of the instruction at `bci`. A wide prefix is folded
    /// away: `opcode()` reports the prefixed instruction and the index decoders widen.
    pub fn set_bci(&mut self, bci: u32) -> Result<(), StreamError> {
        let at = bci as usize;
        let mut opcode = *self.code.get(at).ok_or(StreamError::OutOfBounds(bci))?;
        let mut wide = false;
        let mut cursor = at + 1;

        if opcode == Opcode::wide as u8 {
            opcode = *self.code.get(at + 1).ok_or(StreamError::Truncated(bci))?;
            wide = true;
            cursor = at + 2;
        }

        let length = instruction_length(self.code, bci, self.ext)?;
        let next = bci as usize + length;
        if next > self.code.len() {
            return Err(StreamError::Truncated(bci));
        }

        self.bci = bci;
        self.next = next as u32;
        self.opcode = opcode;
        self.wide = wide;
        self.cursor = cursor;
        Ok(())
    }

    /// Move to the next instruction.
    pub fn advance(&mut self) -> Result<(), StreamError> {
        self.set_bci(self.next)
    }

    /// The effective opcode byte at the current position (wide prefix already folded).
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    pub fn in_wide(&self) -> bool {
        self.wide
    }

    pub fn current_bci(&self) -> u32 {
        self.bci
    }

    pub fn next_bci(&self) -> u32 {
        self.next
    }

    /// One past the last valid bytecode index.
    pub fn end_bci(&self) -> u32 {
        self.code.len() as u32
    }

    pub fn code(&self) -> &'a [u8] {
        self.code
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], StreamError> {
        if self.cursor + n > self.code.len() {
            return Err(StreamError::Truncated(self.bci));
        }
        let bytes = &self.code[self.cursor..self.cursor + n];
        self.cursor += n;
        Ok(bytes)
    }

    /// Signed immediate byte (bipush, iinc delta).
    pub fn read_byte(&mut self) -> Result<i8, StreamError> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_unsigned_byte(&mut self) -> Result<u8, StreamError> {
        Ok(self.take(1)?[0])
    }

    /// Signed immediate short (sipush, wide iinc delta).
    pub fn read_short(&mut self) -> Result<i16, StreamError> {
        Ok(BigEndian::read_i16(self.take(2)?))
    }

    /// Local variable index, two bytes when a wide prefix is in effect.
    pub fn read_local_index(&mut self) -> Result<u16, StreamError> {
        if self.wide {
            Ok(BigEndian::read_u16(self.take(2)?))
        } else {
            Ok(self.take(1)?[0] as u16)
        }
    }

    /// Unsigned two-byte constant pool index.
    pub fn read_cpi(&mut self) -> Result<u16, StreamError> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    /// Sign-extended two-byte branch offset, resolved against the current bci.
    pub fn read_branch_dest(&mut self) -> Result<u32, StreamError> {
        let offset = self.read_short()? as i64;
        self.dest(offset)
    }

    /// Four-byte branch offset (goto_w, jsr_w).
    pub fn read_far_branch_dest(&mut self) -> Result<u32, StreamError> {
        let offset = BigEndian::read_i32(self.take(4)?) as i64;
        self.dest(offset)
    }

    /// Random-access unsigned byte, used for the rank operand of multianewarray.
    pub fn read_ubyte(&self, at: u32) -> Result<u8, StreamError> {
        self.code
            .get(at as usize)
            .copied()
            .ok_or(StreamError::OutOfBounds(at))
    }

    fn dest(&self, offset: i64) -> Result<u32, StreamError> {
        let target = self.bci as i64 + offset;
        if target < 0 || target >= self.code.len() as i64 {
            return Err(StreamError::BadBranch {
                bci: self.bci,
                target,
            });
        }
        Ok(target as u32)
    }
}

fn switch_cursor(code: &[u8], bci: u32) -> Result<Cursor<&[u8]>, StreamError> {
    let mut cursor = Cursor::new(code);
    cursor.set_position(bci as u64 + 1);
    // 0-3 bytes of padding align the operands to a 4 byte boundary from the method start
    while cursor.position() % 4 != 0 {
        cursor.read_u8().map_err(|_| StreamError::Truncated(bci))?;
    }
    Ok(cursor)
}

fn switch_target(code: &[u8], bci: u32, offset: i32) -> Result<u32, StreamError> {
    let target = bci as i64 + offset as i64;
    if target < 0 || target >= code.len() as i64 {
        return Err(StreamError::BadBranch {
            bci,
            target,
        });
    }
    Ok(target as u32)
}

/// Decoded tableswitch dispatch table with absolute branch targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSwitch {
    pub default_target: u32,
    pub low: i32,
    pub high: i32,
    pub targets: Vec<u32>,
    length: usize,
}

impl TableSwitch {
    pub fn decode(code: &[u8], bci: u32) -> Result<TableSwitch, StreamError> {
        let mut cursor = switch_cursor(code, bci)?;
        let truncated = |_| StreamError::Truncated(bci);

        let default = cursor.read_i32::<BigEndian>().map_err(truncated)?;
        let low = cursor.read_i32::<BigEndian>().map_err(truncated)?;
        let high = cursor.read_i32::<BigEndian>().map_err(truncated)?;

        if low > high {
            return Err(StreamError::BadSwitch {
                bci,
                detail: "low is greater than high",
            });
        }

        let count = high as i64 - low as i64 + 1;
        let remaining = code.len() as u64 - cursor.position();
        if count as u64 * 4 > remaining {
            return Err(StreamError::Truncated(bci));
        }

        let mut targets = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let offset = cursor.read_i32::<BigEndian>().map_err(truncated)?;
            targets.push(switch_target(code, bci, offset)?);
        }

        Ok(TableSwitch {
            default_target: switch_target(code, bci, default)?,
            low,
            high,
            targets,
            length: (cursor.position() - bci as u64) as usize,
        })
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

/// Decoded lookupswitch match/target pairs with absolute branch targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupSwitch {
    pub default_target: u32,
    pub pairs: Vec<(i32, u32)>,
    length: usize,
}

impl LookupSwitch {
    pub fn decode(code: &[u8], bci: u32) -> Result<LookupSwitch, StreamError> {
        let mut cursor = switch_cursor(code, bci)?;
        let truncated = |_| StreamError::Truncated(bci);

        let default = cursor.read_i32::<BigEndian>().map_err(truncated)?;
        let npairs = cursor.read_i32::<BigEndian>().map_err(truncated)?;
        if npairs < 0 {
            return Err(StreamError::BadSwitch {
                bci,
                detail: "negative pair count",
            });
        }

        let remaining = code.len() as u64 - cursor.position();
        if npairs as u64 * 8 > remaining {
            return Err(StreamError::Truncated(bci));
        }

        let mut pairs = Vec::with_capacity(npairs as usize);
        for _ in 0..npairs {
            let key = cursor.read_i32::<BigEndian>().map_err(truncated)?;
            let offset = cursor.read_i32::<BigEndian>().map_err(truncated)?;
            pairs.push((key, switch_target(code, bci, offset)?));
        }

        Ok(LookupSwitch {
            default_target: switch_target(code, bci, default)?,
            pairs,
            length: (cursor.position() - bci as u64) as usize,
        })
    }

    pub fn length(&self) -> usize {
        self.length
    }
}
