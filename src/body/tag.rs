//! Metadata records for the tags in a block body.
//!
//! Loading a template walks these records to rebuild the tag nodes, the
//! instructions only refer to nodes by index. Delimiters that split a tag
//! into several bodies (e.g. `else`) are stored as unknown records directly
//! after the record of the tag they belong to.

use crate::body::block::BlockBody;
use crate::buffer::{read_bytes, read_u32, Buffer};
use crate::{Error, Result};

/// The size of the fixed part of a record.
const RECORD_SIZE: usize = 24;

const FLAG_UNKNOWN: u32 = 1;

const NO_BODY: u32 = u32::MAX;

/// A tag record under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecordBuilder {
    pub unknown: bool,
    pub line: u32,
    pub body: Option<BlockBody>,
    pub name: String,
    pub markup: String,
}

/// A tag record read back from a sealed block body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagRecord<'a> {
    pub unknown: bool,
    pub line: Option<u32>,
    pub body: Option<BlockBody>,
    pub name: &'a str,
    pub markup: &'a str,
}

/// An iterator over the records in the tag region of a block body.
pub struct TagRecords<'a> {
    data: &'a [u8],
    at: Option<usize>,
}

impl TagRecordBuilder {
    pub fn new(name: &str, markup: &str, line: Option<u32>) -> Self {
        Self {
            unknown: false,
            line: line.unwrap_or(0),
            body: None,
            name: name.to_owned(),
            markup: markup.to_owned(),
        }
    }

    pub fn unknown(name: &str, markup: &str, line: Option<u32>) -> Self {
        Self {
            unknown: true,
            ..Self::new(name, markup, line)
        }
    }

    fn size(&self) -> usize {
        RECORD_SIZE + self.name.len() + self.markup.len()
    }

    /// Writes all records, linking each one to the next.
    pub fn write_all(records: &[Self], buf: &mut Buffer) {
        for (i, record) in records.iter().enumerate() {
            let next = match i + 1 < records.len() {
                true => record.size() as u32,
                false => 0,
            };
            record.write(buf, next);
        }
    }

    fn write(&self, buf: &mut Buffer, next: u32) {
        buf.write_u32(if self.unknown { FLAG_UNKNOWN } else { 0 });
        buf.write_u32(self.line);
        buf.write_u32(next);
        buf.write_u32(self.body.map_or(NO_BODY, |b| b.0));
        buf.write_u32(self.name.len() as u32);
        buf.write_u32(self.markup.len() as u32);
        buf.write_bytes(self.name.as_bytes());
        buf.write_bytes(self.markup.as_bytes());
    }
}

impl<'a> TagRecords<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        let at = if data.is_empty() { None } else { Some(0) };
        Self { data, at }
    }

    fn read(&self, at: usize) -> Result<(TagRecord<'a>, u32)> {
        let field = |i: usize| read_u32(self.data, at + 4 * i);
        let flags = field(0)?;
        let line = field(1)?;
        let next = field(2)?;
        let body = field(3)?;
        let name_len = field(4)? as usize;
        let markup_len = field(5)? as usize;
        let name = read_str(self.data, at + RECORD_SIZE, name_len)?;
        let markup = read_str(self.data, at + RECORD_SIZE + name_len, markup_len)?;
        let record = TagRecord {
            unknown: flags & FLAG_UNKNOWN != 0,
            line: (line != 0).then_some(line),
            body: (body != NO_BODY).then_some(BlockBody(body)),
            name,
            markup,
        };
        Ok((record, next))
    }
}

impl<'a> Iterator for TagRecords<'a> {
    type Item = Result<TagRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let at = self.at.take()?;
        match self.read(at) {
            Ok((record, next)) => {
                if next != 0 {
                    self.at = Some(at + next as usize);
                }
                Some(Ok(record))
            }
            Err(err) => Some(Err(err)),
        }
    }
}

fn read_str(data: &[u8], at: usize, len: usize) -> Result<&str> {
    let bytes = read_bytes(data, at, len)?;
    std::str::from_utf8(bytes)
        .map_err(|_| Error::deserialize(format!("invalid tag metadata at offset {at}")))
}
