//! The bytecode instruction set.
//!
//! An instruction is a single opcode byte followed by zero or more operand
//! bytes. Multi-byte operands are little-endian. Raw text is stored inline,
//! prefixed with its length.

use std::fmt::Write;

use crate::buffer::{read_bytes, read_u16, read_u24, read_u8};
use crate::filters;
use crate::{Error, Result, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Ends the instruction stream.
    Leave = 0,
    /// Writes `u8` length prefixed raw text.
    WriteRaw,
    /// Writes `u24` length prefixed raw text.
    WriteRawW,
    /// Renders the sub-node with the given `u16` index.
    WriteNode,
    /// Pops a value and writes it.
    PopWrite,
    /// Pushes the constant with the given `u16` index.
    PushConst,
    PushNil,
    PushTrue,
    PushFalse,
    /// Pushes an `i8` operand.
    PushInt8,
    /// Pushes an `i16` operand.
    PushInt16,
    /// Pushes the variable named by the `u16` constant.
    FindStaticVar,
    /// Pops a key and pushes the variable it names.
    FindVar,
    /// Pops an object and pushes its member named by the `u16` constant.
    LookupConstKey,
    /// Pops a key and an object and pushes the member.
    LookupKey,
    /// Like `LookupConstKey` but falls back to `size`, `first` and `last`.
    LookupCommand,
    /// Pops the end and start and pushes an integer range.
    NewIntRange,
    /// Pops `u8` key/value pairs and pushes a map.
    HashNew,
    /// Calls the filter named by the `u16` constant with `u8` arguments.
    Filter,
    /// Calls a well known filter by `u8` id with `u8` arguments.
    BuiltinFilter,
    /// Marks the start of a variable render unit on the `u24` line.
    RenderVariableRescue,
}

const OPCODES: [Opcode; 21] = [
    Opcode::Leave,
    Opcode::WriteRaw,
    Opcode::WriteRawW,
    Opcode::WriteNode,
    Opcode::PopWrite,
    Opcode::PushConst,
    Opcode::PushNil,
    Opcode::PushTrue,
    Opcode::PushFalse,
    Opcode::PushInt8,
    Opcode::PushInt16,
    Opcode::FindStaticVar,
    Opcode::FindVar,
    Opcode::LookupConstKey,
    Opcode::LookupKey,
    Opcode::LookupCommand,
    Opcode::NewIntRange,
    Opcode::HashNew,
    Opcode::Filter,
    Opcode::BuiltinFilter,
    Opcode::RenderVariableRescue,
];

impl Opcode {
    pub fn from_u8(byte: u8) -> Option<Self> {
        OPCODES.get(usize::from(byte)).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Leave => "leave",
            Self::WriteRaw => "write_raw",
            Self::WriteRawW => "write_raw_w",
            Self::WriteNode => "write_node",
            Self::PopWrite => "pop_write",
            Self::PushConst => "push_const",
            Self::PushNil => "push_nil",
            Self::PushTrue => "push_true",
            Self::PushFalse => "push_false",
            Self::PushInt8 => "push_int8",
            Self::PushInt16 => "push_int16",
            Self::FindStaticVar => "find_static_var",
            Self::FindVar => "find_var",
            Self::LookupConstKey => "lookup_const_key",
            Self::LookupKey => "lookup_key",
            Self::LookupCommand => "lookup_command",
            Self::NewIntRange => "new_int_range",
            Self::HashNew => "hash_new",
            Self::Filter => "filter",
            Self::BuiltinFilter => "builtin_filter",
            Self::RenderVariableRescue => "render_variable_rescue",
        }
    }
}

/// A decoded instruction, borrowing inline raw text from the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instr<'a> {
    Leave,
    WriteRaw(&'a [u8]),
    WriteNode(u16),
    PopWrite,
    PushConst(u16),
    PushNil,
    PushTrue,
    PushFalse,
    PushInt8(i8),
    PushInt16(i16),
    FindStaticVar(u16),
    FindVar,
    LookupConstKey(u16),
    LookupKey,
    LookupCommand(u16),
    NewIntRange,
    HashNew(u8),
    Filter { name: u16, argc: u8 },
    BuiltinFilter { id: u8, argc: u8 },
    RenderVariableRescue { line: u32 },
}

impl<'a> Instr<'a> {
    /// Decodes the instruction at `ip`, returning it along with the offset
    /// of the instruction that follows it.
    pub fn decode(code: &'a [u8], ip: usize) -> Result<(Self, usize)> {
        let byte = read_u8(code, ip)?;
        let op = Opcode::from_u8(byte)
            .ok_or_else(|| Error::internal(format!("invalid opcode {byte:#04x} at {ip:#06x}")))?;
        let at = ip + 1;
        let decoded = match op {
            Opcode::Leave => (Self::Leave, at),
            Opcode::WriteRaw => {
                let len = usize::from(read_u8(code, at)?);
                (Self::WriteRaw(read_bytes(code, at + 1, len)?), at + 1 + len)
            }
            Opcode::WriteRawW => {
                let len = read_u24(code, at)? as usize;
                (Self::WriteRaw(read_bytes(code, at + 3, len)?), at + 3 + len)
            }
            Opcode::WriteNode => (Self::WriteNode(read_u16(code, at)?), at + 2),
            Opcode::PopWrite => (Self::PopWrite, at),
            Opcode::PushConst => (Self::PushConst(read_u16(code, at)?), at + 2),
            Opcode::PushNil => (Self::PushNil, at),
            Opcode::PushTrue => (Self::PushTrue, at),
            Opcode::PushFalse => (Self::PushFalse, at),
            Opcode::PushInt8 => (Self::PushInt8(read_u8(code, at)? as i8), at + 1),
            Opcode::PushInt16 => (Self::PushInt16(read_u16(code, at)? as i16), at + 2),
            Opcode::FindStaticVar => (Self::FindStaticVar(read_u16(code, at)?), at + 2),
            Opcode::FindVar => (Self::FindVar, at),
            Opcode::LookupConstKey => (Self::LookupConstKey(read_u16(code, at)?), at + 2),
            Opcode::LookupKey => (Self::LookupKey, at),
            Opcode::LookupCommand => (Self::LookupCommand(read_u16(code, at)?), at + 2),
            Opcode::NewIntRange => (Self::NewIntRange, at),
            Opcode::HashNew => (Self::HashNew(read_u8(code, at)?), at + 1),
            Opcode::Filter => {
                let name = read_u16(code, at)?;
                let argc = read_u8(code, at + 2)?;
                (Self::Filter { name, argc }, at + 3)
            }
            Opcode::BuiltinFilter => {
                let id = read_u8(code, at)?;
                let argc = read_u8(code, at + 1)?;
                (Self::BuiltinFilter { id, argc }, at + 2)
            }
            Opcode::RenderVariableRescue => {
                let line = read_u24(code, at)?;
                (Self::RenderVariableRescue { line }, at + 3)
            }
        };
        Ok(decoded)
    }
}

/// Returns a human readable listing of the instruction stream, one
/// instruction per line prefixed with its offset.
pub fn disassemble(code: &[u8], constants: &[Value]) -> Result<String> {
    let constant = |i: u16| {
        constants
            .get(usize::from(i))
            .map(inspect)
            .ok_or_else(|| Error::internal(format!("constant {i} out of range")))
    };

    let mut out = String::new();
    let mut ip = 0;
    while ip < code.len() {
        let (instr, next) = Instr::decode(code, ip)?;
        let _ = write!(out, "{ip:#06x}: ");
        let _ = match instr {
            Instr::WriteRaw(bytes) => {
                let name = match code[ip] == Opcode::WriteRaw as u8 {
                    true => "write_raw",
                    false => "write_raw_w",
                };
                writeln!(out, "{name}({:?})", String::from_utf8_lossy(bytes))
            }
            Instr::WriteNode(i) => writeln!(out, "write_node({i})"),
            Instr::PushConst(i) => writeln!(out, "push_const({})", constant(i)?),
            Instr::PushInt8(n) => writeln!(out, "push_int8({n})"),
            Instr::PushInt16(n) => writeln!(out, "push_int16({n})"),
            Instr::FindStaticVar(i) => writeln!(out, "find_static_var({})", constant(i)?),
            Instr::LookupConstKey(i) => writeln!(out, "lookup_const_key({})", constant(i)?),
            Instr::LookupCommand(i) => writeln!(out, "lookup_command({})", constant(i)?),
            Instr::HashNew(n) => writeln!(out, "hash_new({n})"),
            Instr::Filter { name, argc } => {
                writeln!(out, "filter(name: {}, num_args: {argc})", constant(name)?)
            }
            Instr::BuiltinFilter { id, argc } => {
                let name = filters::builtin_name(id)
                    .ok_or_else(|| Error::internal(format!("unknown builtin filter {id}")))?;
                writeln!(out, "builtin_filter(name: {name:?}, num_args: {argc})")
            }
            Instr::RenderVariableRescue { line } => {
                writeln!(out, "render_variable_rescue(line_number: {line})")
            }
            Instr::Leave
            | Instr::PopWrite
            | Instr::PushNil
            | Instr::PushTrue
            | Instr::PushFalse
            | Instr::FindVar
            | Instr::LookupKey
            | Instr::NewIntRange => {
                let op = Opcode::from_u8(code[ip]).map(|op| op.name()).unwrap_or("?");
                writeln!(out, "{op}")
            }
        };
        ip = next;
    }
    Ok(out)
}

/// Formats a constant the way it would be written as a literal.
fn inspect(value: &Value) -> String {
    match value {
        Value::Nil => "nil".into(),
        Value::String(s) => format!("{s:?}"),
        Value::Range(m, n) => format!("({m}..{n})"),
        v => v.to_liquid_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_round_trip() {
        for (i, op) in OPCODES.iter().enumerate() {
            assert_eq!(*op as usize, i);
            assert_eq!(Opcode::from_u8(i as u8), Some(*op));
        }
        assert_eq!(Opcode::from_u8(OPCODES.len() as u8), None);
    }

    #[test]
    fn decode_invalid_opcode() {
        let err = Instr::decode(&[0xff], 0).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Internal);
    }

    #[test]
    fn decode_truncated_operand() {
        let code = [Opcode::PushConst as u8, 0];
        assert!(Instr::decode(&code, 0).is_err());
    }

    #[test]
    fn decode_write_raw() {
        let code = [Opcode::WriteRaw as u8, 3, b'r', b'a', b'w', Opcode::Leave as u8];
        let (instr, next) = Instr::decode(&code, 0).unwrap();
        assert_eq!(instr, Instr::WriteRaw(b"raw"));
        assert_eq!(next, 5);
        assert_eq!(Instr::decode(&code, next).unwrap(), (Instr::Leave, 6));
    }
}
