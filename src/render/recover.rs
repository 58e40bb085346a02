//! Error recovery inside variable render units.
//!
//! Every `{{ ... }}` is compiled to a unit that starts with
//! `render_variable_rescue` and ends with `pop_write`. When an instruction in
//! between fails the renderer resumes after the unit instead of aborting.

use crate::instr::Instr;
use crate::{Error, Result};

/// Where to resume after an error inside a render unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RescuePoint {
    /// The offset of the first instruction of the unit.
    pub ip: usize,
    /// The stack length when the unit started.
    pub stack_len: usize,
    /// The line of the unit, zero if untracked.
    pub line: u32,
}

impl RescuePoint {
    pub fn line_number(&self) -> Option<u32> {
        (self.line != 0).then_some(self.line)
    }
}

/// Scans forward from `ip` without executing anything and returns the offset
/// just past the `pop_write` that ends the unit.
pub fn skip_unit(code: &[u8], mut ip: usize) -> Result<usize> {
    loop {
        let (instr, next) = Instr::decode(code, ip)?;
        match instr {
            Instr::PopWrite => return Ok(next),
            Instr::Leave | Instr::RenderVariableRescue { .. } => {
                return Err(Error::internal(format!(
                    "render unit is not terminated, found {} at {ip:#06x}",
                    op_name(code, ip)
                )));
            }
            _ => ip = next,
        }
    }
}

fn op_name(code: &[u8], ip: usize) -> &'static str {
    code.get(ip)
        .and_then(|&b| crate::instr::Opcode::from_u8(b))
        .map_or("?", |op| op.name())
}
