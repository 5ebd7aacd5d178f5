//! Structural addresses of nodes within a document tree.
//!
//! A [`Path`] names one position in a tree as a sequence of
//! `(element-name, sibling-ordinal)` steps. Paths come in two flavours:
//! absolute (anchored at the document root) and relative (anchored at some
//! other node, possibly climbing through [`Component::Parent`] steps).
//!
//! # Syntax
//!
//! - Absolute: `/order/item[2]/price`
//! - Relative: `../../item[2]`
//! - Current node: `.`
//!
//! The ordinal counts same-named siblings and is 1-based; `[1]` is omitted
//! when rendering unless the *explicit* form is requested, which prints
//! every ordinal so that each step denotes exactly one node.

use alloc::borrow::Cow;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

mod tracker;

pub use tracker::{PathTracker, PathTrackingReader, PathTrackingWriter};

// -----------------------------------------------------------------------------
// PathParseError

/// An error produced while parsing a textual path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathParseError<'a> {
    /// Position in `path`.
    pub offset: usize,
    /// The path that the error occurred in.
    pub path: &'a str,
    /// The underlying error.
    pub error: Cow<'a, str>,
}

impl fmt::Display for PathParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Encountered an error at offset {} while parsing `{}`: {}",
            self.offset, self.path, self.error,
        )
    }
}

impl core::error::Error for PathParseError<'_> {}

// -----------------------------------------------------------------------------
// Component

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Component {
    /// A step up to the parent node (`..`), only valid in relative paths.
    Parent,
    /// A step down into the `index`-th child named `name` (1-based among
    /// same-named siblings).
    Child { name: String, index: usize },
}

impl Component {
    /// Creates a child step.
    pub fn child(name: impl Into<String>, index: usize) -> Self {
        Self::Child {
            name: name.into(),
            index,
        }
    }
}

// -----------------------------------------------------------------------------
// Path

/// A structured address of a node within a hierarchical document.
///
/// Two paths are equal when their anchors and steps are equal; an implicit
/// ordinal is stored as `1` and therefore compares equal to an explicit
/// `[1]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    absolute: bool,
    components: Vec<Component>,
}

impl Path {
    /// The (empty) absolute path of the document root.
    pub const fn root() -> Self {
        Self {
            absolute: true,
            components: Vec::new(),
        }
    }

    /// Creates a path from parts.
    pub fn new(absolute: bool, components: Vec<Component>) -> Self {
        Self {
            absolute,
            components,
        }
    }

    /// Whether the path is anchored at the document root.
    #[inline]
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// The steps of the path, in order.
    #[inline]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// The number of steps.
    #[inline]
    pub fn depth(&self) -> usize {
        self.components.len()
    }

    /// Parses a textual path.
    ///
    /// See the [module documentation](self) for the accepted syntax.
    pub fn parse(text: &str) -> Result<Self, PathParseError<'_>> {
        if text == "." {
            return Ok(Self::new(false, Vec::new()));
        }

        let (absolute, mut offset) = match text.strip_prefix('/') {
            Some(_) => (true, 1),
            None => (false, 0),
        };
        let body = &text[offset..];

        let mut components = Vec::new();
        if body.is_empty() {
            if absolute {
                return Ok(Self::root());
            }
            return Err(PathParseError {
                offset,
                path: text,
                error: Cow::Borrowed("empty path"),
            });
        }

        for segment in body.split('/') {
            if segment.is_empty() {
                return Err(PathParseError {
                    offset,
                    path: text,
                    error: Cow::Borrowed("empty path segment"),
                });
            }
            if segment == ".." {
                components.push(Component::Parent);
            } else {
                components.push(parse_child(segment, offset, text)?);
            }
            offset += segment.len() + 1;
        }

        Ok(Self::new(absolute, components))
    }

    /// Renders the path, omitting `[1]` ordinals.
    pub fn render(&self) -> String {
        self.render_with(false)
    }

    /// Renders the path in the explicit single-node form, printing every
    /// ordinal so each step denotes exactly one node.
    pub fn render_explicit(&self) -> String {
        self.render_with(true)
    }

    fn render_with(&self, explicit: bool) -> String {
        use core::fmt::Write;

        if self.components.is_empty() {
            return if self.absolute {
                String::from("/")
            } else {
                String::from(".")
            };
        }

        let mut out = String::new();
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 || self.absolute {
                out.push('/');
            }
            match component {
                Component::Parent => out.push_str(".."),
                Component::Child { name, index } => {
                    out.push_str(name);
                    if explicit || *index > 1 {
                        let _ = write!(out, "[{index}]");
                    }
                }
            }
        }
        out
    }

    /// Whether this path is an ancestor of `child`, where every path is an
    /// ancestor of itself.
    ///
    /// Only meaningful between absolute paths; the comparison is
    /// component-wise, never textual.
    pub fn is_ancestor_of(&self, child: &Path) -> bool {
        self.absolute == child.absolute
            && self.components.len() <= child.components.len()
            && self
                .components
                .iter()
                .zip(&child.components)
                .all(|(a, b)| a == b)
    }

    /// Computes this path relative to `base`, both absolute: climbs to the
    /// deepest common ancestor, then descends into this path.
    ///
    /// Relative to itself, a path renders as `.`.
    ///
    /// # Panics
    ///
    /// Panics if either path is relative.
    pub fn relative_to(&self, base: &Path) -> Path {
        assert!(
            self.absolute && base.absolute,
            "Path::relative_to requires two absolute paths"
        );

        let common = self
            .components
            .iter()
            .zip(&base.components)
            .take_while(|(a, b)| a == b)
            .count();

        let mut components = Vec::with_capacity(base.components.len() - common + self.components.len() - common);
        for _ in common..base.components.len() {
            components.push(Component::Parent);
        }
        components.extend(self.components[common..].iter().cloned());

        Path::new(false, components)
    }

    /// Resolves `relative` against this absolute path.
    ///
    /// Returns `None` if the relative path climbs above the document root.
    /// An absolute `relative` replaces this path entirely.
    pub fn apply(&self, relative: &Path) -> Option<Path> {
        if relative.absolute {
            return Some(relative.clone());
        }

        let mut components = self.components.clone();
        for component in &relative.components {
            match component {
                Component::Parent => {
                    components.pop()?;
                }
                child => components.push(child.clone()),
            }
        }
        Some(Path::new(true, components))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn parse_child<'a>(
    segment: &str,
    offset: usize,
    path: &'a str,
) -> Result<Component, PathParseError<'a>> {
    let (name, index) = match segment.split_once('[') {
        None => (segment, 1),
        Some((name, rest)) => {
            let digits = rest.strip_suffix(']').ok_or(PathParseError {
                offset,
                path,
                error: Cow::Borrowed("unterminated `[` in path segment"),
            })?;
            let index: usize = digits.parse().map_err(|_| PathParseError {
                offset,
                path,
                error: Cow::Borrowed("sibling ordinal is not a number"),
            })?;
            if index == 0 {
                return Err(PathParseError {
                    offset,
                    path,
                    error: Cow::Borrowed("sibling ordinals are 1-based"),
                });
            }
            (name, index)
        }
    };

    if name.is_empty() {
        return Err(PathParseError {
            offset,
            path,
            error: Cow::Borrowed("empty element name in path segment"),
        });
    }

    Ok(Component::child(name, index))
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::{Component, Path};

    fn abs(parts: &[(&str, usize)]) -> Path {
        Path::new(
            true,
            parts
                .iter()
                .map(|(name, index)| Component::child(*name, *index))
                .collect(),
        )
    }

    #[test]
    fn render_omits_first_ordinal() {
        let path = abs(&[("order", 1), ("item", 2), ("price", 1)]);
        assert_eq!(path.render(), "/order/item[2]/price");
        assert_eq!(path.render_explicit(), "/order[1]/item[2]/price[1]");
    }

    #[test]
    fn parse_round_trips_both_forms() {
        let path = abs(&[("order", 1), ("item", 2)]);
        assert_eq!(Path::parse("/order/item[2]").unwrap(), path);
        // Explicit `[1]` compares equal to the implicit form.
        assert_eq!(Path::parse("/order[1]/item[2]").unwrap(), path);
    }

    #[test]
    fn parse_rejects_malformed_segments() {
        assert!(Path::parse("").is_err());
        assert!(Path::parse("/a//b").is_err());
        assert!(Path::parse("/a[x]").is_err());
        assert!(Path::parse("/a[0]").is_err());
        assert!(Path::parse("/a[2").is_err());
    }

    #[test]
    fn relative_to_climbs_to_common_ancestor() {
        let target = abs(&[("root", 1), ("left", 1), ("value", 1)]);
        let base = abs(&[("root", 1), ("right", 1), ("inner", 3)]);
        let relative = target.relative_to(&base);
        assert_eq!(relative.render(), "../../left/value");
        assert_eq!(base.apply(&relative), Some(target));
    }

    #[test]
    fn relative_to_self_is_current_node() {
        let path = abs(&[("root", 1), ("a", 2)]);
        let relative = path.relative_to(&path);
        assert_eq!(relative.render(), ".");
        assert_eq!(Path::parse(".").unwrap(), relative);
        assert_eq!(path.apply(&relative), Some(path));
    }

    #[test]
    fn apply_rejects_climbing_above_root() {
        let path = abs(&[("root", 1)]);
        let relative = Path::new(false, vec![Component::Parent, Component::Parent]);
        assert_eq!(path.apply(&relative), None);
    }

    #[test]
    fn ancestry_is_component_wise_and_reflexive() {
        let parent = abs(&[("root", 1), ("item", 2)]);
        let child = abs(&[("root", 1), ("item", 2), ("price", 1)]);
        // `/root/item[2]` must not be an ancestor of `/root/item[21]`.
        let sibling = abs(&[("root", 1), ("item", 21)]);

        assert!(parent.is_ancestor_of(&child));
        assert!(parent.is_ancestor_of(&parent));
        assert!(!child.is_ancestor_of(&parent));
        assert!(!parent.is_ancestor_of(&sibling));
    }
}
