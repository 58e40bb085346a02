//! A Liquid template compiler and bytecode virtual machine.
//!
//! # Features
//!
//! ### Syntax
//!
//! - Variables with filters: `{{ user.name | upcase | append: "!" }}`
//! - Conditionals: `{% if user.admin %} ... {% elsif x contains "y" %} ... {% endif %}`
//! - Loops: `{% for item in items limit: 3 reversed %} ... {% else %} ... {% endfor %}`
//! - Whitespace control: `{%- if x -%}` and `{{- x -}}`
//! - Line oriented tags: `{% liquid assign x = 1 \n echo x %}`
//!
//! ### Engine
//!
//! - Templates compile to a compact bytecode that can be serialized and
//!   loaded again without parsing the source
//! - Custom filters and tags
//! - Host objects and lazily computed values in the environment
//! - Render length, render score and assign score limits
//! - Errors inside `{{ .. }}` are rendered inline, the rest of the template
//!   still renders
//!
//! # Getting started
//!
//! Your entry point is the [`Engine`] struct. The engine stores the filters,
//! the tags and the default render settings. Generally, you only need to
//! construct one engine during the lifetime of a program.
//!
//! ```
//! let engine = sluice::Engine::new();
//! ```
//!
//! Next, [`.compile`][Engine::compile] is used to compile a template.
//!
//! ```
//! # let engine = sluice::Engine::new();
//! let template = engine.compile("Hello {{ user.name }}!")?;
//! # Ok::<(), sluice::Error>(())
//! ```
//!
//! Finally, the template is rendered with an environment to resolve
//! variables from.
//!
//! ```
//! # let engine = sluice::Engine::new();
//! # let template = engine.compile("Hello {{ user.name }}!")?;
//! let result = template.render(sluice::value! { user: { name: "John Smith" } })?;
//! assert_eq!(result, "Hello John Smith!");
//! # Ok::<(), sluice::Error>(())
//! ```
//!
//! # Examples
//!
//! ### Transform data using filters
//!
//! Data can be transformed using registered filters.
//!
//! ```
//! let mut engine = sluice::Engine::new();
//! engine.add_filter("shout", |s: String| s.to_uppercase() + "!");
//!
//! let result = engine
//!     .compile("Hello {{ value | shout }}")?
//!     .render(sluice::value! { value: "world" })?;
//!
//! assert_eq!(result, "Hello WORLD!");
//! # Ok::<(), sluice::Error>(())
//! ```
//!
//! See the [`Filter`] trait documentation for more information on filters
//! and the [`Tag`] trait for custom tags.
//!
//! ### Precompile a template
//!
//! A compiled template can be dumped to bytes and loaded again by an engine
//! with the same tags registered.
//!
//! ```
//! let engine = sluice::Engine::new();
//! let data = engine.compile("{% for i in (1..3) %}{{ i }}{% endfor %}")?.dump()?;
//!
//! let template = engine.load(&data)?;
//! assert_eq!(template.render(sluice::value! {})?, "123");
//! # Ok::<(), sluice::Error>(())
//! ```
//!
//! ### Render with settings
//!
//! The [`Renderer`] returned by [`Template::renderer`] overrides the engine
//! settings for one render.
//!
//! ```
//! use sluice::{Engine, Limits};
//!
//! let engine = Engine::new();
//! let template = engine.compile("{{ greeting }} {{ name }}")?;
//!
//! let (result, errors) = template
//!     .renderer()
//!     .with_environment(sluice::value! { greeting: "hello" })
//!     .with_static_environment(sluice::value! { name: "world" })
//!     .with_limits(Limits { render_length_limit: Some(100), ..Limits::default() })
//!     .to_string_with_errors()?;
//!
//! assert_eq!(result, "hello world");
//! assert!(errors.is_empty());
//! # Ok::<(), sluice::Error>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

mod body;
mod buffer;
mod compile;
mod error;
mod filters;
mod instr;
mod macros;
mod render;
pub mod tags;
mod types;
pub mod value;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub use crate::body::serialize::FORMAT_VERSION;
pub use crate::body::BlockBody;
pub use crate::compile::{Delimiter, Expression, MarkupParser, TagParser};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::filters::{Filter, FilterFn};
pub use crate::render::{
    assign_score_of, Context, Interrupt, Limits, NodeRenderer, Renderer, ResourceLimits,
};
pub use crate::tags::{Node, Resolution, Tag};
pub use crate::value::{Lazy, Object, Value};

use crate::body::serialize;
use crate::filters::{FilterArgs, FilterReturn};
use crate::types::program::Program;

/// The compilation and rendering engine.
///
/// The engine holds the registered filters and tags and the default render
/// settings.
pub struct Engine<'engine> {
    filters: BTreeMap<&'engine str, Box<FilterFn>>,
    tags: BTreeMap<&'engine str, Box<dyn Tag>>,
    strict_variables: bool,
    strict_filters: bool,
    line_numbers: bool,
    limits: Limits,
}

/// A compiled template.
///
/// Cloning is cheap, the compiled program is shared.
#[derive(Clone)]
pub struct Template<'engine> {
    engine: &'engine Engine<'engine>,
    program: Arc<Program>,
}

impl<'engine> Default for Engine<'engine> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<'engine> Engine<'engine> {
    /// Construct a new engine with the standard filters and tags.
    #[inline]
    pub fn new() -> Self {
        #[allow(unused_mut)]
        let mut engine = Self::empty();
        #[cfg(feature = "builtins")]
        {
            filters::builtins::register(&mut engine);
            tags::builtins::register(&mut engine);
        }
        engine
    }

    /// Construct a new engine without any filters or tags.
    #[inline]
    pub fn empty() -> Self {
        Self {
            filters: BTreeMap::new(),
            tags: BTreeMap::new(),
            strict_variables: false,
            strict_filters: false,
            line_numbers: true,
            limits: Limits::default(),
        }
    }

    /// Set whether rendering an undefined variable is an error.
    ///
    /// Defaults to `false`, undefined variables are nil.
    #[inline]
    pub fn set_strict_variables(&mut self, yes: bool) {
        self.strict_variables = yes;
    }

    /// Set whether calling an undefined filter is an error.
    ///
    /// Defaults to `false`, undefined filters return their input.
    #[inline]
    pub fn set_strict_filters(&mut self, yes: bool) {
        self.strict_filters = yes;
    }

    /// Set whether line numbers are tracked and reported in errors.
    ///
    /// Defaults to `true`.
    #[inline]
    pub fn set_line_numbers(&mut self, yes: bool) {
        self.line_numbers = yes;
    }

    /// Set the default resource limits for renders.
    #[inline]
    pub fn set_limits(&mut self, limits: Limits) {
        self.limits = limits;
    }

    /// Add a new filter to the engine.
    ///
    /// The arguments and the return value are converted, see [`Filter`].
    #[inline]
    pub fn add_filter<F, R, A>(&mut self, name: &'engine str, f: F)
    where
        F: Filter<R, A> + Send + Sync + 'static,
        R: FilterReturn,
        A: FilterArgs,
    {
        self.filters.insert(name, filters::new(f));
    }

    /// Add a new filter that receives the raw argument list: the input,
    /// the positional arguments and a trailing map of keyword arguments if
    /// any were given.
    #[inline]
    pub fn add_filter_fn<F>(&mut self, name: &'engine str, f: F)
    where
        F: Fn(Vec<Value>) -> Result<Value> + Send + Sync + 'static,
    {
        self.filters.insert(name, Box::new(f));
    }

    /// Add a new tag to the engine, replacing any tag with the same name.
    #[inline]
    pub fn add_tag<T>(&mut self, name: &'engine str, tag: T)
    where
        T: Tag + 'static,
    {
        self.tags.insert(name, Box::new(tag));
    }

    pub(crate) fn filter(&self, name: &str) -> Option<&FilterFn> {
        self.filters.get(name).map(|f| &**f)
    }

    /// Lookup a tag by name.
    pub fn resolve_tag(&self, name: &str) -> Resolution<'_> {
        match self.tags.get(name) {
            Some(tag) => Resolution::Found(&**tag),
            None => Resolution::NotFound,
        }
    }

    /// Compile a template.
    #[inline]
    pub fn compile(&self, source: &str) -> Result<Template<'_>> {
        let program = compile::template(self, source)?;
        Ok(Template {
            engine: self,
            program: Arc::new(program),
        })
    }

    /// Load a template that was serialized with [`Template::dump`].
    ///
    /// Tags are parsed again so the engine must have the same tags
    /// registered as the engine that compiled the template.
    #[inline]
    pub fn load(&self, data: &[u8]) -> Result<Template<'_>> {
        let program = compile::load(self, data)?;
        Ok(Template {
            engine: self,
            program: Arc::new(program),
        })
    }

    /// Compile a standalone filtered expression, e.g. `user.name | upcase`.
    #[inline]
    pub fn parse_expression(&self, source: &str) -> Result<Expression> {
        compile::expression(source)
    }
}

impl fmt::Debug for Engine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("filters", &self.filters.keys())
            .field("tags", &self.tags.keys())
            .field("strict_variables", &self.strict_variables)
            .field("strict_filters", &self.strict_filters)
            .field("line_numbers", &self.line_numbers)
            .field("limits", &self.limits)
            .finish()
    }
}

impl<'engine> Template<'engine> {
    /// Render the template to a string using the provided environment.
    ///
    /// The environment must be a map or an [`Object`].
    #[inline]
    pub fn render(&self, env: impl Into<Value>) -> Result<String> {
        self.renderer().with_environment(env).to_string()
    }

    /// Returns a renderer to configure a render of this template.
    #[inline]
    pub fn renderer(&self) -> Renderer<'_> {
        Renderer::new(self.engine, &self.program)
    }

    /// Render the template in an existing context, e.g. from inside a
    /// custom tag.
    #[inline]
    pub fn render_with(&self, cx: &mut Context<'_>) -> Result<String> {
        render::template(cx, &self.program)
    }

    /// Serialize the compiled template.
    pub fn dump(&self) -> Result<Vec<u8>> {
        serialize::dump(&self.program.document)
    }

    /// Returns a human readable listing of the template's top level
    /// instructions.
    pub fn disassemble(&self) -> Result<String> {
        let document = &self.program.document;
        document.disassemble(document.entrypoint())
    }
}

impl fmt::Debug for Template<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("engine", &self.engine)
            .field("program", &self.program)
            .finish()
    }
}
