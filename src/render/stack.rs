use crate::{Error, Result, Value};

/// The evaluation stack of the virtual machine.
///
/// A single stack is shared by every body rendered in a context, each frame
/// only touches the values above the length it started at.
#[derive(Debug, Default)]
pub struct Stack {
    values: Vec<Value>,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Make sure there is room for `additional` more values.
    pub fn reserve(&mut self, additional: usize) {
        self.values.reserve(additional);
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn pop(&mut self) -> Result<Value> {
        self.values.pop().ok_or_else(err_underflow)
    }

    /// Pops the top `n` values, returned in the order they were pushed.
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<Value>> {
        let at = self.values.len().checked_sub(n).ok_or_else(err_underflow)?;
        Ok(self.values.split_off(at))
    }

    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }
}

fn err_underflow() -> Error {
    Error::internal("stack underflow")
}
