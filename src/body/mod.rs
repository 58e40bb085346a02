//! The compiled form of a template.
//!
//! All block bodies of a template are written to one contiguous buffer,
//! every body is 8-byte aligned and starts with a fixed size [`Header`]
//! followed by its instructions and its tag metadata. The constants of all
//! bodies live in one shared pool, each body owns a contiguous sub-range of
//! it.
//!
//! ```text
//! +--------+--------------+-----------+     +--------+--------------+
//! | header | instructions | tag metas | ... | header | instructions |
//! +--------+--------------+-----------+     +--------+--------------+
//! ```

mod block;
pub mod serialize;
mod tag;

pub use crate::body::block::{BlockBody, BlockBodyBuilder, Header, HEADER_SIZE};
pub use crate::body::tag::{TagRecord, TagRecordBuilder, TagRecords};

use crate::buffer::{read_bytes, Buffer};
use crate::instr;
use crate::{Error, Result, Value};

/// The buffer that block bodies are sealed into during compilation.
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    buffer: Buffer,
    constants: Vec<Value>,
}

/// An immutable compiled document.
#[derive(Debug)]
pub struct Document {
    buffer: Vec<u8>,
    constants: Vec<Value>,
    entrypoint: BlockBody,
}

/// A view of one sealed block body.
#[derive(Debug, Clone, Copy)]
pub struct Block<'a> {
    header: Header,
    code: &'a [u8],
    constants: &'a [Value],
    tags: &'a [u8],
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seals a block body into the document.
    ///
    /// Nested blank bodies lose their whitespace-only raw writes.
    pub fn seal(&mut self, builder: BlockBodyBuilder, nested: bool) -> Result<BlockBody> {
        let code = builder.code(nested)?;

        let mut tags = Buffer::new();
        TagRecordBuilder::write_all(&builder.tags, &mut tags);

        let mut header = Header::new(&builder);
        header.instructions_bytes = code.len() as u32;
        if !tags.is_empty() {
            header.tags_offset = (HEADER_SIZE + code.len()) as u32;
            header.tags_bytes = tags.len() as u32;
        }

        let (_, constants, _) = builder.asm.into_parts();
        header.constants_offset = self.constants.len() as u32;
        header.constants_len = constants.len() as u32;
        self.constants.extend(constants);

        self.buffer.align(8);
        let offset = u32::try_from(self.buffer.len())
            .map_err(|_| Error::syntax_msg("template is too large"))?;
        header.write(&mut self.buffer);
        self.buffer.concat(&code);
        self.buffer.concat(&tags);
        Ok(BlockBody(offset))
    }

    /// Reads back the header of a body sealed into this builder.
    pub fn header(&self, body: BlockBody) -> Result<Header> {
        Header::read(self.buffer.as_slice(), body.0 as usize)
    }

    pub fn finish(self, entrypoint: BlockBody) -> Document {
        Document {
            buffer: self.buffer.into_vec(),
            constants: self.constants,
            entrypoint,
        }
    }
}

impl Document {
    pub(crate) fn from_parts(buffer: Vec<u8>, constants: Vec<Value>, entrypoint: BlockBody) -> Self {
        Self {
            buffer,
            constants,
            entrypoint,
        }
    }

    pub fn entrypoint(&self) -> BlockBody {
        self.entrypoint
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    /// Returns a view of the given block body, checking that all of its
    /// regions are in bounds.
    pub fn block(&self, body: BlockBody) -> Result<Block<'_>> {
        let at = body.0 as usize;
        let header = Header::read(&self.buffer, at)?;
        let code = read_bytes(
            &self.buffer,
            at + HEADER_SIZE,
            header.instructions_bytes as usize,
        )?;
        let tags = match header.tags_offset {
            0 => &[][..],
            offset => read_bytes(
                &self.buffer,
                at + offset as usize,
                header.tags_bytes as usize,
            )?,
        };
        let m = header.constants_offset as usize;
        let n = m + header.constants_len as usize;
        let constants = self.constants.get(m..n).ok_or_else(|| {
            Error::internal(format!("constants {m}..{n} of block at {at} out of range"))
        })?;
        Ok(Block {
            header,
            code,
            constants,
            tags,
        })
    }

    /// Returns a human readable listing of the block body's instructions.
    pub fn disassemble(&self, body: BlockBody) -> Result<String> {
        let block = self.block(body)?;
        instr::disassemble(block.code, block.constants)
    }
}

impl<'a> Block<'a> {
    pub fn is_blank(&self) -> bool {
        self.header.is_blank()
    }

    pub fn render_score(&self) -> u32 {
        self.header.render_score
    }

    pub fn max_stack(&self) -> usize {
        self.header.max_stack as usize
    }

    pub fn code(&self) -> &'a [u8] {
        self.code
    }

    pub fn constants(&self) -> &'a [Value] {
        self.constants
    }

    pub fn tags(&self) -> TagRecords<'a> {
        TagRecords::new(self.tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_seal_and_read() {
        let mut doc = DocumentBuilder::new();

        let mut inner = BlockBodyBuilder::new();
        inner.add_write_raw("yes");
        inner.asm.add_find_static_variable("x").unwrap();
        inner.asm.add_pop_write();
        inner.asm.add_leave();
        let inner = doc.seal(inner, true).unwrap();

        let mut outer = BlockBodyBuilder::new();
        let mut record = TagRecordBuilder::new("if", "x", Some(1));
        record.body = Some(inner);
        outer.tags.push(record);
        outer.asm.add_find_static_variable("y").unwrap();
        outer.asm.add_pop_write();
        outer.asm.add_write_node(0);
        outer.asm.add_leave();
        let outer = doc.seal(outer, false).unwrap();

        assert_eq!(inner, BlockBody(0));
        assert_eq!(outer.0 % 8, 0);

        let doc = doc.finish(outer);
        assert_eq!(doc.constants(), [Value::from("x"), Value::from("y")]);

        let block = doc.block(inner).unwrap();
        assert!(!block.is_blank());
        assert_eq!(block.render_score(), 1);
        assert_eq!(block.max_stack(), 1);
        assert_eq!(block.constants(), [Value::from("x")]);
        assert_eq!(block.tags().count(), 0);

        let block = doc.block(doc.entrypoint()).unwrap();
        assert_eq!(block.constants(), [Value::from("y")]);
        let tags: Vec<_> = block.tags().collect::<Result<_>>().unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "if");
        assert_eq!(tags[0].body, Some(inner));

        assert_eq!(
            doc.disassemble(doc.entrypoint()).unwrap(),
            "\
0x0000: find_static_var(\"y\")
0x0003: pop_write
0x0004: write_node(0)
0x0007: leave
"
        );
    }

    #[test]
    fn document_block_out_of_bounds() {
        let doc = DocumentBuilder::new().finish(BlockBody(0));
        assert!(doc.block(doc.entrypoint()).is_err());
    }
}
