use alloc::string::{String, ToString};
use alloc::vec::Vec;

use ravel_utils::hash::HashMap;

use crate::path::{Component, Path};
use crate::reader::TreeReader;
use crate::writer::TreeWriter;

// -----------------------------------------------------------------------------
// PathTracker

/// Maintains the structural [`Path`] of the node a traversal is currently
/// visiting.
///
/// The tracker is fed the same node events the stream sees. Each frame
/// counts how many same-named children have been opened below it, which
/// yields the 1-based sibling ordinals of [`Component::Child`].
///
/// Fresh per marshal/unmarshal call, never shared.
#[derive(Default)]
pub struct PathTracker {
    frames: Vec<Frame>,
    // Ordinal counts for nodes opened at the document root.
    root_counts: HashMap<String, usize>,
}

struct Frame {
    name: String,
    index: usize,
    child_counts: HashMap<String, usize>,
}

impl PathTracker {
    /// Creates a tracker positioned at the document root.
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            root_counts: HashMap::default(),
        }
    }

    /// Records that a node named `name` was opened.
    pub fn start(&mut self, name: &str) {
        let counts = match self.frames.last_mut() {
            Some(frame) => &mut frame.child_counts,
            None => &mut self.root_counts,
        };
        let index = *counts
            .entry(name.to_string())
            .and_modify(|seen| *seen += 1)
            .or_insert(1);

        self.frames.push(Frame {
            name: name.to_string(),
            index,
            child_counts: HashMap::default(),
        });
    }

    /// Records that the current node was closed.
    ///
    /// # Panics
    ///
    /// Panics when no node is open.
    pub fn end(&mut self) {
        assert!(
            self.frames.pop().is_some(),
            "PathTracker::end called at the document root"
        );
    }

    /// The number of currently open nodes.
    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The absolute path of the current node.
    pub fn current_path(&self) -> Path {
        Path::new(
            true,
            self.frames
                .iter()
                .map(|frame| Component::child(frame.name.clone(), frame.index))
                .collect(),
        )
    }
}

// -----------------------------------------------------------------------------
// PathTrackingWriter

/// A [`TreeWriter`] decorator that keeps a [`PathTracker`] in sync with the
/// node events passing through it.
pub struct PathTrackingWriter<W> {
    inner: W,
    tracker: PathTracker,
}

impl<W: TreeWriter> PathTrackingWriter<W> {
    /// Wraps `inner`.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            tracker: PathTracker::new(),
        }
    }

    /// The tracker fed by this writer.
    #[inline]
    pub fn tracker(&self) -> &PathTracker {
        &self.tracker
    }

    /// Closes open nodes until the tracked depth is back at `depth`.
    ///
    /// Used to leave the underlying stream balanced when a traversal is
    /// abandoned partway.
    pub fn unwind_to(&mut self, depth: usize) {
        while self.tracker.depth() > depth {
            self.end_node();
        }
    }

    /// Consumes the decorator, returning the wrapped writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: TreeWriter> TreeWriter for PathTrackingWriter<W> {
    fn start_node(&mut self, name: &str) {
        self.tracker.start(name);
        self.inner.start_node(name);
    }

    #[inline]
    fn add_attribute(&mut self, name: &str, value: &str) {
        self.inner.add_attribute(name, value);
    }

    #[inline]
    fn set_value(&mut self, text: &str) {
        self.inner.set_value(text);
    }

    fn end_node(&mut self) {
        self.tracker.end();
        self.inner.end_node();
    }
}

// -----------------------------------------------------------------------------
// PathTrackingReader

/// A [`TreeReader`] decorator that keeps a [`PathTracker`] in sync with the
/// cursor movements passing through it.
///
/// The node the wrapped reader is positioned at on construction becomes the
/// first tracked frame, so reader-side paths line up with writer-side ones.
pub struct PathTrackingReader<R> {
    inner: R,
    tracker: PathTracker,
}

impl<R: TreeReader> PathTrackingReader<R> {
    /// Wraps `inner`, which must be positioned at the document root.
    pub fn new(inner: R) -> Self {
        let mut tracker = PathTracker::new();
        tracker.start(inner.node_name());
        Self { inner, tracker }
    }

    /// The tracker fed by this reader.
    #[inline]
    pub fn tracker(&self) -> &PathTracker {
        &self.tracker
    }

    /// Consumes the decorator, returning the wrapped reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: TreeReader> TreeReader for PathTrackingReader<R> {
    #[inline]
    fn node_name(&self) -> &str {
        self.inner.node_name()
    }

    #[inline]
    fn value(&self) -> &str {
        self.inner.value()
    }

    #[inline]
    fn attribute(&self, name: &str) -> Option<&str> {
        self.inner.attribute(name)
    }

    #[inline]
    fn has_more_children(&self) -> bool {
        self.inner.has_more_children()
    }

    fn move_down(&mut self) {
        self.inner.move_down();
        self.tracker.start(self.inner.node_name());
    }

    fn move_up(&mut self) {
        self.inner.move_up();
        self.tracker.end();
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::{PathTracker, PathTrackingReader, PathTrackingWriter};
    use crate::node::{TreeNodeReader, TreeNodeWriter};
    use crate::reader::TreeReader;
    use crate::writer::TreeWriter;

    #[test]
    fn tracker_counts_same_named_siblings() {
        let mut tracker = PathTracker::new();
        tracker.start("root");
        tracker.start("item");
        tracker.end();
        tracker.start("item");
        assert_eq!(tracker.current_path().render(), "/root/item[2]");
        tracker.start("price");
        assert_eq!(tracker.current_path().render(), "/root/item[2]/price");
        tracker.end();
        tracker.end();
        tracker.end();
        assert_eq!(tracker.depth(), 0);
    }

    #[test]
    fn root_level_siblings_count_across_documents() {
        let mut tracker = PathTracker::new();
        tracker.start("doc");
        tracker.end();
        tracker.start("doc");
        assert_eq!(tracker.current_path().render(), "/doc[2]");
        tracker.start("doc");
        assert_eq!(tracker.current_path().render(), "/doc[2]/doc");
        tracker.end();
        tracker.end();
    }

    #[test]
    fn sibling_counts_reset_per_parent() {
        let mut tracker = PathTracker::new();
        tracker.start("root");
        tracker.start("a");
        tracker.start("x");
        tracker.end();
        tracker.end();
        tracker.start("b");
        tracker.start("x");
        // A fresh parent starts counting from 1 again.
        assert_eq!(tracker.current_path().render(), "/root/b/x");
        tracker.end();
        tracker.end();
        tracker.end();
    }

    #[test]
    fn writer_and_reader_sides_agree() {
        let mut writer = PathTrackingWriter::new(TreeNodeWriter::new());
        writer.start_node("root");
        writer.start_node("item");
        let write_path = writer.tracker().current_path();
        writer.end_node();
        writer.start_node("item");
        writer.end_node();
        writer.end_node();

        let tree = writer.into_inner().into_tree();
        let mut reader = PathTrackingReader::new(TreeNodeReader::new(&tree));
        reader.move_down();
        assert_eq!(reader.tracker().current_path(), write_path);
        reader.move_up();
        reader.move_down();
        assert_eq!(reader.tracker().current_path().render(), "/root/item[2]");
    }

    #[test]
    fn unwind_closes_abandoned_nodes() {
        let mut writer = PathTrackingWriter::new(TreeNodeWriter::new());
        writer.start_node("root");
        writer.start_node("a");
        writer.start_node("b");
        writer.unwind_to(0);
        let tree = writer.into_inner().into_tree();
        assert_eq!(tree.children[0].children[0].name, "b");
    }
}
