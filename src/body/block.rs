use crate::body::tag::TagRecordBuilder;
use crate::buffer::{read_u32, Buffer};
use crate::compile::assemble::Assembler;
use crate::instr::Instr;
use crate::Result;

/// The size of the header in front of every block body.
pub const HEADER_SIZE: usize = 32;

const FLAG_BLANK: u32 = 1;

/// A handle to a sealed block body, the byte offset of its header in the
/// document buffer.
///
/// Only [`DocumentBuilder::seal`][crate::body::DocumentBuilder::seal] hands
/// these out, so a parent can only ever refer to a complete body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockBody(pub(crate) u32);

/// A block body under construction.
#[derive(Debug)]
pub struct BlockBodyBuilder {
    pub(crate) asm: Assembler,
    pub(crate) blank: bool,
    pub(crate) render_score: u32,
    pub(crate) tags: Vec<TagRecordBuilder>,
}

/// The fixed size header of a sealed block body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub flags: u32,
    pub render_score: u32,
    pub max_stack: u32,
    pub instructions_bytes: u32,
    /// Relative to the start of the header, zero if there are no tags.
    pub tags_offset: u32,
    pub tags_bytes: u32,
    pub constants_offset: u32,
    pub constants_len: u32,
}

impl Default for BlockBodyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockBodyBuilder {
    pub fn new() -> Self {
        Self {
            asm: Assembler::new(),
            blank: true,
            render_score: 0,
            tags: Vec::new(),
        }
    }

    /// Adds raw text, a body with only whitespace text is still blank.
    pub fn add_write_raw(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if !text.trim().is_empty() {
            self.blank = false;
        }
        self.render_score += 1;
        self.asm.add_write_raw(text);
    }

    /// Returns the instructions to store, raw writes of a nested blank
    /// body are dropped since they only ever contain whitespace.
    pub(crate) fn code(&self, strip_blank: bool) -> Result<Buffer> {
        let code = self.asm.code();
        if !(strip_blank && self.blank) {
            let mut buf = Buffer::with_capacity(code.len());
            buf.write_bytes(code);
            return Ok(buf);
        }
        let mut buf = Buffer::new();
        let mut ip = 0;
        while ip < code.len() {
            let (instr, next) = Instr::decode(code, ip)?;
            if !matches!(instr, Instr::WriteRaw(_)) {
                buf.write_bytes(&code[ip..next]);
            }
            ip = next;
        }
        Ok(buf)
    }
}

impl Header {
    pub fn new(builder: &BlockBodyBuilder) -> Self {
        Self {
            flags: if builder.blank { FLAG_BLANK } else { 0 },
            render_score: builder.render_score,
            max_stack: builder.asm.max_stack_size() as u32,
            instructions_bytes: 0,
            tags_offset: 0,
            tags_bytes: 0,
            constants_offset: 0,
            constants_len: 0,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.flags & FLAG_BLANK != 0
    }

    pub fn write(&self, buf: &mut Buffer) {
        buf.write_u32(self.flags);
        buf.write_u32(self.render_score);
        buf.write_u32(self.max_stack);
        buf.write_u32(self.instructions_bytes);
        buf.write_u32(self.tags_offset);
        buf.write_u32(self.tags_bytes);
        buf.write_u32(self.constants_offset);
        buf.write_u32(self.constants_len);
    }

    pub fn read(data: &[u8], at: usize) -> Result<Self> {
        let field = |i: usize| read_u32(data, at + 4 * i);
        Ok(Self {
            flags: field(0)?,
            render_score: field(1)?,
            max_stack: field(2)?,
            instructions_bytes: field(3)?,
            tags_offset: field(4)?,
            tags_bytes: field(5)?,
            constants_offset: field(6)?,
            constants_len: field(7)?,
        })
    }
}
