//! Tags are the `{% name markup %}` constructs of a template.
//!
//! A [`Tag`] is registered on the [`Engine`][crate::Engine] by name. When the
//! compiler finds a tag it asks the tag to parse itself through a
//! [`TagParser`], the tag may parse block bodies and returns a [`Node`] that
//! is rendered in its place. Loading a precompiled template calls the same
//! parse function again, so a tag must parse the same way from the stored
//! name and markup.

#[cfg(feature = "builtins")]
pub mod builtins;
#[cfg(feature = "builtins")]
mod condition;

use std::fmt;

pub use crate::compile::{Delimiter, TagParser};
pub use crate::render::NodeRenderer;
use crate::Result;

/// Parses a tag into a [`Node`].
///
/// # Examples
///
/// ```
/// use sluice::{Engine, Node, NodeRenderer, Result, Tag, TagParser};
///
/// #[derive(Debug)]
/// struct Shout(String);
///
/// impl Node for Shout {
///     fn render(&self, r: &mut NodeRenderer<'_, '_>) -> Result<()> {
///         r.write_str(&self.0.to_uppercase())
///     }
/// }
///
/// struct ShoutTag;
///
/// impl Tag for ShoutTag {
///     fn parse(&self, parser: &mut TagParser<'_, '_>) -> Result<Option<Box<dyn Node>>> {
///         Ok(Some(Box::new(Shout(parser.markup().to_owned()))))
///     }
/// }
///
/// let mut engine = Engine::new();
/// engine.add_tag("shout", ShoutTag);
/// let result = engine.compile("{% shout hello %}")?.render(sluice::value! {})?;
/// assert_eq!(result, "HELLO");
/// # Ok::<(), sluice::Error>(())
/// ```
pub trait Tag: Send + Sync {
    /// Parses the tag, returning `None` if nothing needs to be rendered.
    fn parse(&self, parser: &mut TagParser<'_, '_>) -> Result<Option<Box<dyn Node>>>;
}

/// A parsed tag that renders itself.
pub trait Node: fmt::Debug + Send + Sync {
    fn render(&self, r: &mut NodeRenderer<'_, '_>) -> Result<()>;

    /// Whether the node never produces output. A body that only contains
    /// blank nodes and whitespace is blank, its whitespace is not written.
    fn blank(&self) -> bool {
        false
    }
}

/// The result of looking up a tag by name.
pub enum Resolution<'a> {
    Found(&'a dyn Tag),
    NotFound,
}
