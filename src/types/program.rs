//! Defines a compiled [`Program`]: the document holding the instructions of
//! every block body plus the tag nodes those instructions refer to.

use std::fmt;

use crate::body::Document;
use crate::tags::Node;

pub struct Program {
    pub document: Document,
    /// Indexed by the `write_node` operand.
    pub nodes: Vec<NodeEntry>,
}

pub struct NodeEntry {
    pub node: Box<dyn Node>,
    /// The line of the tag, used when reporting errors raised by the node.
    pub line: Option<u32>,
}

impl Program {
    pub fn node(&self, index: u16) -> Option<&NodeEntry> {
        self.nodes.get(usize::from(index))
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("document", &self.document)
            .field("nodes", &self.nodes.iter().map(|e| &e.node).collect::<Vec<_>>())
            .finish()
    }
}
