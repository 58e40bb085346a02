#![allow(clippy::wrong_self_convention)]

mod context;
mod limits;
mod recover;
mod stack;
mod vm;

use std::io;

use crate::body::BlockBody;
use crate::compile::Expression;
pub use crate::render::context::{Context, Interrupt};
pub use crate::render::limits::{assign_score_of, Limits, ResourceLimits};
pub(crate) use crate::render::vm::evaluate;
use crate::types::program::Program;
use crate::{Engine, Error, Result, Value};

/// Renders the program's entrypoint in the given context.
pub(crate) fn template(cx: &mut Context<'_>, program: &Program) -> Result<String> {
    let mut out = String::new();
    vm::render(cx, program, program.document.entrypoint(), &mut out)?;
    Ok(out)
}

/// The handle a [`Node`][crate::Node] renders through.
///
/// It gives access to the render [`Context`] and the output, and renders
/// the block bodies the node parsed.
pub struct NodeRenderer<'r, 'a> {
    cx: &'r mut Context<'a>,
    program: &'r Program,
    out: &'r mut String,
}

impl<'r, 'a> NodeRenderer<'r, 'a> {
    pub(crate) fn new(cx: &'r mut Context<'a>, program: &'r Program, out: &'r mut String) -> Self {
        Self { cx, program, out }
    }

    pub fn context(&mut self) -> &mut Context<'a> {
        &mut *self.cx
    }

    /// Writes text to the output, checking the resource limits.
    pub fn write_str(&mut self, s: &str) -> Result<()> {
        self.out.push_str(s);
        self.cx
            .resource_limits_mut()
            .increment_write_score(self.out.len())
    }

    /// Renders a block body to the output.
    pub fn render_body(&mut self, body: BlockBody) -> Result<()> {
        vm::render(self.cx, self.program, body, self.out)
    }

    /// Renders a block body to a new string, writes are charged to the
    /// assign score.
    pub fn capture_body(&mut self, body: BlockBody) -> Result<String> {
        let program = self.program;
        self.cx.with_capture(|cx| {
            let mut s = String::new();
            vm::render(cx, program, body, &mut s)?;
            Ok(s)
        })
    }

    pub fn evaluate(&mut self, expr: &Expression) -> Result<Value> {
        expr.evaluate(self.cx)
    }
}

/// A renderer that interprets a compiled [`Template`][crate::Template].
///
/// This struct is created by [`Template::renderer`][crate::Template::renderer],
/// settings not given here are taken from the engine.
#[must_use = "must call `.to_string()` or `.to_writer(..)` on the renderer"]
pub struct Renderer<'render> {
    engine: &'render Engine<'render>,
    program: &'render Program,
    environments: Vec<Value>,
    static_environments: Vec<Value>,
    limits: Option<Limits>,
    strict_variables: Option<bool>,
    strict_filters: Option<bool>,
    rethrow_errors: bool,
}

impl<'render> Renderer<'render> {
    pub(crate) fn new(engine: &'render Engine<'render>, program: &'render Program) -> Self {
        Self {
            engine,
            program,
            environments: Vec::new(),
            static_environments: Vec::new(),
            limits: None,
            strict_variables: None,
            strict_filters: None,
            rethrow_errors: false,
        }
    }

    /// Add an environment to resolve variables from, it must be a map or an
    /// object.
    pub fn with_environment(mut self, env: impl Into<Value>) -> Self {
        self.environments.push(env.into());
        self
    }

    /// Add a static environment, these are searched after all the others.
    pub fn with_static_environment(mut self, env: impl Into<Value>) -> Self {
        self.static_environments.push(env.into());
        self
    }

    /// Set the resource limits.
    ///
    /// Defaults to the engine setting.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Whether undefined variables are errors.
    ///
    /// Defaults to the engine setting.
    pub fn strict_variables(mut self, yes: bool) -> Self {
        self.strict_variables = Some(yes);
        self
    }

    /// Whether undefined filters are errors.
    ///
    /// Defaults to the engine setting.
    pub fn strict_filters(mut self, yes: bool) -> Self {
        self.strict_filters = Some(yes);
        self
    }

    /// Return the first render error instead of writing it to the output.
    pub fn rethrow_errors(mut self, yes: bool) -> Self {
        self.rethrow_errors = yes;
        self
    }

    /// Render the template to a string.
    pub fn to_string(self) -> Result<String> {
        self.to_string_with_errors().map(|(s, _)| s)
    }

    /// Render the template to a string, also returning the errors that
    /// were written inline.
    pub fn to_string_with_errors(self) -> Result<(String, Vec<Error>)> {
        let program = self.program;
        let mut cx = self.into_context()?;
        let s = template(&mut cx, program)?;
        Ok((s, cx.take_errors()))
    }

    /// Render the template to the given writer.
    pub fn to_writer<W>(self, mut w: W) -> Result<()>
    where
        W: io::Write,
    {
        let s = self.to_string()?;
        w.write_all(s.as_bytes())?;
        Ok(())
    }

    fn into_context(self) -> Result<Context<'render>> {
        let mut cx = Context::new(self.engine);
        for env in self.environments {
            cx.push_environment(env)?;
        }
        for env in self.static_environments {
            cx.push_static_environment(env)?;
        }
        if let Some(limits) = self.limits {
            cx.set_limits(limits);
        }
        if let Some(yes) = self.strict_variables {
            cx.set_strict_variables(yes);
        }
        if let Some(yes) = self.strict_filters {
            cx.set_strict_filters(yes);
        }
        cx.set_rethrow_errors(self.rethrow_errors);
        Ok(cx)
    }
}
