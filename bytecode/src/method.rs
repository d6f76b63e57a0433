//! Method-level metadata the compiler consumes: the decoded signature, the exception-handler
//! table and the code array, bundled the way the runtime's method descriptor query hands them
//! over.

use thiserror::Error;

use crate::types::PrimitiveType;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("malformed method descriptor {0:?}")]
pub struct SignatureError(pub String);

/// Argument and return kinds of a method, in declaration order. Reference and array types
/// collapse to [`PrimitiveType::Object`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub args: Vec<PrimitiveType>,
    pub ret: PrimitiveType,
}

impl MethodSignature {
    /// Parse a method descriptor such as `(I[Ljava/lang/String;J)V` (§4.3.3).
    pub fn from_descriptor(desc: &str) -> Result<Self, SignatureError> {
        let malformed = || SignatureError(desc.to_string());
        let mut chars = desc.chars();

        if chars.next() != Some('(') {
            return Err(malformed());
        }

        let mut args = Vec::new();
        let ret = loop {
            match chars.next().ok_or_else(malformed)? {
                ')' => break Self::parse_kind(&mut chars, true).ok_or_else(malformed)?,
                c => {
                    let kind = Self::parse_kind_from(c, &mut chars, false).ok_or_else(malformed)?;
                    args.push(kind);
                }
            }
        };

        if chars.next().is_some() {
            return Err(malformed());
        }
        Ok(MethodSignature { args, ret })
    }

    fn parse_kind(chars: &mut std::str::Chars<'_>, allow_void: bool) -> Option<PrimitiveType> {
        let c = chars.next()?;
        Self::parse_kind_from(c, chars, allow_void)
    }

    fn parse_kind_from(
        c: char,
        chars: &mut std::str::Chars<'_>,
        allow_void: bool,
    ) -> Option<PrimitiveType> {
        Some(match c {
            'Z' => PrimitiveType::Boolean,
            'B' => PrimitiveType::Byte,
            'C' => PrimitiveType::Char,
            'S' => PrimitiveType::Short,
            'I' => PrimitiveType::Int,
            'J' => PrimitiveType::Long,
            'F' => PrimitiveType::Float,
            'D' => PrimitiveType::Double,
            'V' if allow_void => PrimitiveType::Void,
            'L' => {
                // Consume the class name up to the ';' terminator
                loop {
                    match chars.next()? {
                        ';' => break,
                        _ => continue,
                    }
                }
                PrimitiveType::Object
            }
            '[' => {
                // An array is a reference no matter how deep the element type nests
                Self::parse_kind(chars, false)?;
                PrimitiveType::Object
            }
            _ => return None,
        })
    }

    /// Number of local-variable slots the declared arguments occupy (receiver excluded).
    pub fn arg_slots(&self) -> usize {
        self.args.iter().map(|kind| kind.slots()).sum()
    }
}

/// Bounds of one try/catch region. `try_start` is inclusive, `try_end` exclusive; `catch_start`
/// is the handler's entry bci. A zero `catch_type` catches everything.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExceptionRange {
    pub try_start: u16,
    pub try_end: u16,
    pub catch_start: u16,
    pub catch_type: u16,
}

impl ExceptionRange {
    pub fn covers(&self, bci: u32) -> bool {
        self.try_start as u32 <= bci && bci < self.try_end as u32
    }
}

/// Everything the compiler needs to know about one method. Owned by the caller for the duration
/// of a single compilation; nothing here survives it.
#[derive(Debug, Clone)]
pub struct MethodInfo {
    /// Diagnostic identity carried into bailouts, e.g. `java/lang/String.hashCode()I`
    pub name: String,
    pub signature: MethodSignature,
    pub is_static: bool,
    pub max_locals: u16,
    pub max_stack: u16,
    pub code: Vec<u8>,
    pub handlers: Vec<ExceptionRange>,
}
