//! The binary format of a precompiled template.
//!
//! ```text
//! +---------+------------+--------------+-------------+--------------+-------------+
//! | version | entrypoint | instr offset | instr bytes | const offset | const bytes |
//! +---------+------------+--------------+-------------+--------------+-------------+
//! | document buffer ...                                                            |
//! +--------------------------------------------------------------------------------+
//! | constants (postcard) ...                                                       |
//! +--------------------------------------------------------------------------------+
//! ```
//!
//! All header fields are little-endian `u32`s. Sub-nodes are not part of the
//! format, they are rebuilt from the tag metadata when loading.

use crate::body::{BlockBody, Document};
use crate::buffer::{read_bytes, read_u32, Buffer};
use crate::{Error, Result, Value};

/// Bumped whenever the layout of the document or the instruction set
/// changes.
pub const FORMAT_VERSION: u32 = 1;

const HEADER_SIZE: usize = 24;

/// Serializes a document.
pub fn dump(document: &Document) -> Result<Vec<u8>> {
    let constants = postcard::to_allocvec(document.constants())
        .map_err(|err| Error::internal(format!("failed to serialize constants: {err}")))?;
    let instr_len = document.buffer().len();

    let mut buf = Buffer::with_capacity(HEADER_SIZE + instr_len + constants.len());
    buf.write_u32(FORMAT_VERSION);
    buf.write_u32(document.entrypoint().0);
    buf.write_u32(HEADER_SIZE as u32);
    buf.write_u32(instr_len as u32);
    buf.write_u32((HEADER_SIZE + instr_len) as u32);
    buf.write_u32(constants.len() as u32);
    buf.write_bytes(document.buffer());
    buf.write_bytes(&constants);
    Ok(buf.into_vec())
}

/// Deserializes a document, checking the version and that the entrypoint
/// is in bounds.
pub fn load(data: &[u8]) -> Result<Document> {
    let field = |i: usize| read_u32(data, 4 * i).map_err(|_| err_truncated());
    let version = field(0)?;
    if version != FORMAT_VERSION {
        return Err(Error::deserialize(format!(
            "incompatible serialization versions, expected {FORMAT_VERSION} but got {version}"
        )));
    }
    let entrypoint = field(1)?;
    let instr_offset = field(2)? as usize;
    let instr_len = field(3)? as usize;
    let const_offset = field(4)? as usize;
    let const_len = field(5)? as usize;

    // The document outlives `data`.
    let buffer = read_bytes(data, instr_offset, instr_len)
        .map_err(|_| err_truncated())?
        .to_vec();
    let constants = read_bytes(data, const_offset, const_len).map_err(|_| err_truncated())?;
    let constants: Vec<Value> = postcard::from_bytes(constants)?;

    let document = Document::from_parts(buffer, constants, BlockBody(entrypoint));
    document
        .block(document.entrypoint())
        .map_err(|err| Error::deserialize(format!("invalid entrypoint: {}", err.message())))?;
    log::debug!(
        "loaded document with {} instruction bytes and {} constants",
        instr_len,
        document.constants().len()
    );
    Ok(document)
}

fn err_truncated() -> Error {
    Error::deserialize("serialized template is truncated")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{BlockBodyBuilder, DocumentBuilder};
    use crate::ErrorKind;

    fn document() -> Document {
        let mut doc = DocumentBuilder::new();
        let mut body = BlockBodyBuilder::new();
        body.add_write_raw("hello ");
        body.asm.add_find_static_variable("name").unwrap();
        body.asm.add_push_literal(Value::Float(1.5)).unwrap();
        body.asm.add_filter("plus", 2).unwrap();
        body.asm.add_pop_write();
        body.asm.add_leave();
        let body = doc.seal(body, false).unwrap();
        doc.finish(body)
    }

    #[test]
    fn dump_load_round_trip() {
        let doc = document();
        let data = dump(&doc).unwrap();
        assert_eq!(&data[..4], &FORMAT_VERSION.to_le_bytes());

        let loaded = load(&data).unwrap();
        assert_eq!(loaded.buffer(), doc.buffer());
        assert_eq!(loaded.constants(), doc.constants());
        assert_eq!(loaded.entrypoint(), doc.entrypoint());
    }

    #[test]
    fn load_version_mismatch() {
        let mut data = dump(&document()).unwrap();
        data[..4].copy_from_slice(&7u32.to_le_bytes());
        let err = load(&data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Deserialize);
        assert_eq!(
            err.message(),
            "incompatible serialization versions, expected 1 but got 7"
        );
    }

    #[test]
    fn load_truncated() {
        let data = dump(&document()).unwrap();
        for len in [0, 3, HEADER_SIZE, data.len() - 1] {
            let err = load(&data[..len]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Deserialize);
        }
    }
}
