use std::cmp::max;
use std::collections::BTreeMap;

use crate::buffer::{Buffer, MAX_U24};
use crate::filters;
use crate::instr::{Instr, Opcode};
use crate::{Error, Result, Value};

/// Emits instructions and constants for one block body or expression.
///
/// Every method corresponds to one semantic operation and keeps track of the
/// simulated stack depth so that the renderer can reserve the evaluation
/// stack up front.
#[derive(Debug, Default)]
pub struct Assembler {
    code: Buffer,
    constants: Vec<Value>,
    index: BTreeMap<Key, u16>,
    stack_size: isize,
    max_stack_size: isize,
    leave_at: Option<usize>,
}

/// The interning key for a constant.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Key {
    Integer(i64),
    Float(u64),
    String(String),
    Range(i64, i64),
}

impl Key {
    fn new(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(i) => Some(Self::Integer(*i)),
            Value::Float(f) => Some(Self::Float(f.to_bits())),
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Range(m, n) => Some(Self::Range(*m, *n)),
            _ => None,
        }
    }
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn code(&self) -> &[u8] {
        self.code.as_slice()
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    pub fn max_stack_size(&self) -> usize {
        self.max_stack_size as usize
    }

    pub fn into_parts(self) -> (Buffer, Vec<Value>, usize) {
        let max_stack_size = self.max_stack_size();
        (self.code, self.constants, max_stack_size)
    }

    /// Interns the constant returning its index in the pool.
    fn constant(&mut self, value: Value) -> Result<u16> {
        let key = Key::new(&value);
        if let Some(i) = key.as_ref().and_then(|k| self.index.get(k)) {
            return Ok(*i);
        }
        let i = u16::try_from(self.constants.len())
            .map_err(|_| Error::syntax_msg("too many constants in one block"))?;
        self.constants.push(value);
        if let Some(key) = key {
            self.index.insert(key, i);
        }
        Ok(i)
    }

    fn op(&mut self, op: Opcode, delta: isize) {
        self.code.write_u8(op as u8);
        self.stack_size += delta;
        self.max_stack_size = max(self.max_stack_size, self.stack_size);
    }

    fn op_const(&mut self, op: Opcode, value: Value, delta: isize) -> Result<()> {
        let i = self.constant(value)?;
        self.op(op, delta);
        self.code.write_u16(i);
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////
    // Control
    ////////////////////////////////////////////////////////////////////////

    pub fn add_leave(&mut self) {
        self.leave_at = Some(self.code.len());
        self.op(Opcode::Leave, 0);
    }

    /// Removes a trailing `leave` so that more code can be appended.
    pub fn remove_leave(&mut self) {
        if let Some(at) = self.leave_at.take() {
            if at + 1 == self.code.len() {
                self.code.truncate(at);
            }
        }
    }

    pub fn add_render_variable_rescue(&mut self, line: u32) {
        self.op(Opcode::RenderVariableRescue, 0);
        self.code.write_u24(line.min(MAX_U24));
    }

    ////////////////////////////////////////////////////////////////////////
    // Output
    ////////////////////////////////////////////////////////////////////////

    /// Writes raw text inline, splitting it when it is too long for a single
    /// instruction.
    pub fn add_write_raw(&mut self, mut text: &str) {
        while !text.is_empty() {
            let mut n = text.len().min(MAX_U24 as usize);
            while !text.is_char_boundary(n) {
                n -= 1;
            }
            let (chunk, rest) = text.split_at(n);
            match u8::try_from(chunk.len()) {
                Ok(len) => {
                    self.op(Opcode::WriteRaw, 0);
                    self.code.write_u8(len);
                }
                Err(_) => {
                    self.op(Opcode::WriteRawW, 0);
                    self.code.write_u24(chunk.len() as u32);
                }
            }
            self.code.write_bytes(chunk.as_bytes());
            text = rest;
        }
    }

    pub fn add_write_node(&mut self, node: u16) {
        self.op(Opcode::WriteNode, 0);
        self.code.write_u16(node);
    }

    pub fn add_pop_write(&mut self) {
        self.op(Opcode::PopWrite, -1);
    }

    ////////////////////////////////////////////////////////////////////////
    // Stack
    ////////////////////////////////////////////////////////////////////////

    /// Pushes a literal using the most compact instruction for it.
    pub fn add_push_literal(&mut self, value: Value) -> Result<()> {
        match value {
            Value::Nil => self.op(Opcode::PushNil, 1),
            Value::Bool(true) => self.op(Opcode::PushTrue, 1),
            Value::Bool(false) => self.op(Opcode::PushFalse, 1),
            Value::Integer(i) => {
                if let Ok(n) = i8::try_from(i) {
                    self.op(Opcode::PushInt8, 1);
                    self.code.write_u8(n as u8);
                } else if let Ok(n) = i16::try_from(i) {
                    self.op(Opcode::PushInt16, 1);
                    self.code.write_u16(n as u16);
                } else {
                    self.op_const(Opcode::PushConst, value, 1)?;
                }
            }
            value => self.op_const(Opcode::PushConst, value, 1)?,
        }
        Ok(())
    }

    pub fn add_find_static_variable(&mut self, name: &str) -> Result<()> {
        self.op_const(Opcode::FindStaticVar, Value::from(name), 1)
    }

    pub fn add_find_variable(&mut self) {
        self.op(Opcode::FindVar, 0);
    }

    pub fn add_lookup_const_key(&mut self, key: &str) -> Result<()> {
        self.op_const(Opcode::LookupConstKey, Value::from(key), 0)
    }

    pub fn add_lookup_command(&mut self, name: &str) -> Result<()> {
        self.op_const(Opcode::LookupCommand, Value::from(name), 0)
    }

    pub fn add_lookup_key(&mut self) {
        self.op(Opcode::LookupKey, -1);
    }

    pub fn add_new_int_range(&mut self) {
        self.op(Opcode::NewIntRange, -1);
    }

    pub fn add_hash_new(&mut self, pairs: usize) -> Result<()> {
        let n = u8::try_from(pairs)
            .map_err(|_| Error::syntax_msg("too many keyword arguments"))?;
        self.op(Opcode::HashNew, 1 - 2 * isize::from(n));
        self.code.write_u8(n);
        Ok(())
    }

    /// Calls a filter, `argc` includes the input value.
    pub fn add_filter(&mut self, name: &str, argc: usize) -> Result<()> {
        let argc = u8::try_from(argc).map_err(|_| Error::syntax_msg("too many filter arguments"))?;
        let delta = 1 - isize::from(argc);
        match filters::builtin_id(name) {
            Some(id) => {
                self.op(Opcode::BuiltinFilter, delta);
                self.code.write_u8(id);
            }
            None => {
                self.op_const(Opcode::Filter, Value::from(name), delta)?;
            }
        }
        self.code.write_u8(argc);
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////
    // Splicing
    ////////////////////////////////////////////////////////////////////////

    /// Appends the code of another assembler, re-interning its constants.
    pub fn concat(&mut self, other: &Assembler) -> Result<()> {
        let base = self.stack_size;
        let code = other.code();
        let end = other.leave_at.unwrap_or(code.len());
        let mut ip = 0;
        while ip < end {
            let (instr, next) = Instr::decode(code, ip)?;
            let operand = |i: u16| -> Result<Value> {
                other
                    .constants
                    .get(usize::from(i))
                    .cloned()
                    .ok_or_else(|| Error::internal(format!("constant {i} out of range")))
            };
            match instr {
                Instr::PushConst(i) => self.op_const(Opcode::PushConst, operand(i)?, 1)?,
                Instr::FindStaticVar(i) => self.op_const(Opcode::FindStaticVar, operand(i)?, 1)?,
                Instr::LookupConstKey(i) => {
                    self.op_const(Opcode::LookupConstKey, operand(i)?, 0)?
                }
                Instr::LookupCommand(i) => self.op_const(Opcode::LookupCommand, operand(i)?, 0)?,
                Instr::Filter { name, argc } => {
                    self.op_const(Opcode::Filter, operand(name)?, 1 - isize::from(argc))?;
                    self.code.write_u8(argc);
                }
                _ => {
                    // Everything else has no constant operands and is copied
                    // verbatim.
                    self.code.write_bytes(&code[ip..next]);
                }
            }
            ip = next;
        }
        self.max_stack_size = max(self.max_stack_size, base + other.max_stack_size);
        self.stack_size = base + other.stack_size;
        Ok(())
    }
}
