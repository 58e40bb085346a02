pub mod program;
pub mod span;
