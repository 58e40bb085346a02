use crate::{Error, Result, Value};

/// Resource ceilings for a render, `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Limits {
    /// The maximum length in bytes of the rendered output.
    pub render_length_limit: Option<usize>,
    /// The maximum number of nodes rendered, see [`Header`][crate::body::Header].
    pub render_score_limit: Option<u64>,
    /// The maximum total size of assigned and captured values.
    pub assign_score_limit: Option<u64>,
}

/// Tracks resource consumption against [`Limits`] during a render.
///
/// Once any limit is exceeded the `reached` flag stays set and every later
/// check fails immediately.
#[derive(Debug, Clone, Default)]
pub struct ResourceLimits {
    limits: Limits,
    render_score: u64,
    assign_score: u64,
    /// The output length at the last write inside a capture.
    last_capture_length: Option<usize>,
    reached: bool,
}

impl ResourceLimits {
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn render_score(&self) -> u64 {
        self.render_score
    }

    pub fn assign_score(&self) -> u64 {
        self.assign_score
    }

    /// Whether any limit has been exceeded.
    pub fn reached(&self) -> bool {
        self.reached
    }

    pub fn increment_render_score(&mut self, amount: u64) -> Result<()> {
        self.check()?;
        self.render_score = self.render_score.saturating_add(amount);
        match self.limits.render_score_limit {
            Some(limit) if self.render_score > limit => self.fault("render score"),
            _ => Ok(()),
        }
    }

    pub fn increment_assign_score(&mut self, amount: u64) -> Result<()> {
        self.check()?;
        self.assign_score = self.assign_score.saturating_add(amount);
        match self.limits.assign_score_limit {
            Some(limit) if self.assign_score > limit => self.fault("assign score"),
            _ => Ok(()),
        }
    }

    /// Called after every write with the length of the output written to.
    ///
    /// Inside a capture the growth since the last write is charged to the
    /// assign score, otherwise the length is checked against the render
    /// length limit.
    pub fn increment_write_score(&mut self, output_len: usize) -> Result<()> {
        match self.last_capture_length {
            Some(last) => {
                self.last_capture_length = Some(output_len);
                self.increment_assign_score(output_len.saturating_sub(last) as u64)
            }
            None => {
                self.check()?;
                match self.limits.render_length_limit {
                    Some(limit) if output_len > limit => self.fault("render length"),
                    _ => Ok(()),
                }
            }
        }
    }

    /// Starts charging writes to a fresh capture buffer, returning the
    /// state to hand back to [`end_capture`][Self::end_capture].
    pub(crate) fn start_capture(&mut self) -> Option<usize> {
        self.last_capture_length.replace(0)
    }

    pub(crate) fn end_capture(&mut self, saved: Option<usize>) {
        self.last_capture_length = saved;
    }

    fn check(&self) -> Result<()> {
        match self.reached {
            true => Err(Error::resource_limits()),
            false => Ok(()),
        }
    }

    fn fault(&mut self, what: &str) -> Result<()> {
        log::debug!("{what} limit exceeded");
        self.reached = true;
        Err(Error::resource_limits())
    }
}

/// Returns the assign score of a value: the byte length of strings, the sum
/// over the elements of collections and one for anything else.
pub fn assign_score_of(value: &Value) -> u64 {
    match value {
        Value::String(s) => s.len() as u64,
        Value::List(list) => list.iter().map(assign_score_of).sum(),
        Value::Map(map) => map
            .iter()
            .map(|(k, v)| k.len() as u64 + assign_score_of(v))
            .sum(),
        _ => 1,
    }
}
