// -----------------------------------------------------------------------------
// TreeWriter

/// A consumer of hierarchical token streams.
///
/// The marshalling engine emits a document as a sequence of node events.
/// Implementations map those events onto a concrete representation: an
/// in-memory tree ([`TreeNodeWriter`]), an XML byte stream, and so on.
///
/// # Contract
///
/// - [`start_node`] and [`end_node`] calls are strictly balanced.
/// - [`add_attribute`] and [`set_value`] apply to the most recently started,
///   not yet ended node. Calling either with no node open is a programming
///   error and implementations are allowed to panic.
///
/// [`start_node`]: TreeWriter::start_node
/// [`end_node`]: TreeWriter::end_node
/// [`add_attribute`]: TreeWriter::add_attribute
/// [`set_value`]: TreeWriter::set_value
/// [`TreeNodeWriter`]: crate::TreeNodeWriter
pub trait TreeWriter {
    /// Opens a child node under the currently open node
    /// (or the document root).
    fn start_node(&mut self, name: &str);

    /// Attaches an attribute to the currently open node.
    fn add_attribute(&mut self, name: &str, value: &str);

    /// Sets the text value of the currently open node.
    fn set_value(&mut self, text: &str);

    /// Closes the currently open node.
    fn end_node(&mut self);
}

impl<W: TreeWriter + ?Sized> TreeWriter for &mut W {
    #[inline]
    fn start_node(&mut self, name: &str) {
        (**self).start_node(name);
    }

    #[inline]
    fn add_attribute(&mut self, name: &str, value: &str) {
        (**self).add_attribute(name, value);
    }

    #[inline]
    fn set_value(&mut self, text: &str) {
        (**self).set_value(text);
    }

    #[inline]
    fn end_node(&mut self) {
        (**self).end_node();
    }
}
