// -----------------------------------------------------------------------------
// TreeReader

/// A producer of hierarchical token streams.
///
/// A reader is a cursor over one document. It always points at exactly one
/// node; the unmarshalling engine drives it depth-first with
/// [`move_down`]/[`move_up`] and inspects the current node through the
/// remaining methods.
///
/// # Contract
///
/// - [`move_down`] with no remaining child and [`move_up`] at the root are
///   programming errors; implementations are allowed to panic.
/// - [`has_more_children`] reports whether the current node still has
///   children that [`move_down`] has not visited within this traversal.
///
/// [`move_down`]: TreeReader::move_down
/// [`move_up`]: TreeReader::move_up
/// [`has_more_children`]: TreeReader::has_more_children
pub trait TreeReader {
    /// The name of the current node.
    fn node_name(&self) -> &str;

    /// The text value of the current node, empty if it has none.
    fn value(&self) -> &str;

    /// Looks up an attribute of the current node.
    fn attribute(&self, name: &str) -> Option<&str>;

    /// Whether the current node has unvisited children.
    fn has_more_children(&self) -> bool;

    /// Moves the cursor to the next unvisited child of the current node.
    fn move_down(&mut self);

    /// Moves the cursor back to the parent node.
    fn move_up(&mut self);
}

impl<R: TreeReader + ?Sized> TreeReader for &mut R {
    #[inline]
    fn node_name(&self) -> &str {
        (**self).node_name()
    }

    #[inline]
    fn value(&self) -> &str {
        (**self).value()
    }

    #[inline]
    fn attribute(&self, name: &str) -> Option<&str> {
        (**self).attribute(name)
    }

    #[inline]
    fn has_more_children(&self) -> bool {
        (**self).has_more_children()
    }

    #[inline]
    fn move_down(&mut self) {
        (**self).move_down();
    }

    #[inline]
    fn move_up(&mut self) {
        (**self).move_up();
    }
}
