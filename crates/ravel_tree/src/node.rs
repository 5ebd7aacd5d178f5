use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::reader::TreeReader;
use crate::writer::TreeWriter;

// -----------------------------------------------------------------------------
// TreeNode

/// One node of an in-memory document tree.
///
/// This is the reference backend for the [`TreeWriter`]/[`TreeReader`]
/// contracts: cheap to build in tests, trivially inspectable, and free of
/// any text-format concerns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeNode {
    pub name: String,
    pub value: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Creates a node with no value, attributes or children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: String::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Looks up an attribute by name.
    ///
    /// Attributes keep document order; the first match wins.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

// -----------------------------------------------------------------------------
// TreeNodeWriter

/// A [`TreeWriter`] that assembles a [`TreeNode`] tree.
#[derive(Default)]
pub struct TreeNodeWriter {
    stack: Vec<TreeNode>,
    root: Option<TreeNode>,
}

impl TreeNodeWriter {
    /// Creates a writer with no document started.
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            root: None,
        }
    }

    /// The number of currently open nodes.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Consumes the writer and returns the assembled tree.
    ///
    /// # Panics
    ///
    /// Panics if no root node was written or a node is still open.
    pub fn into_tree(self) -> TreeNode {
        assert!(
            self.stack.is_empty(),
            "TreeNodeWriter::into_tree called with {} node(s) still open",
            self.stack.len()
        );
        match self.root {
            Some(root) => root,
            None => panic!("TreeNodeWriter::into_tree called before any node was written"),
        }
    }

    fn open_mut(&mut self, method: &str) -> &mut TreeNode {
        match self.stack.last_mut() {
            Some(node) => node,
            None => panic!("TreeNodeWriter::{method} called with no node open"),
        }
    }
}

impl TreeWriter for TreeNodeWriter {
    fn start_node(&mut self, name: &str) {
        assert!(
            self.root.is_none() || !self.stack.is_empty(),
            "TreeNodeWriter::start_node called after the root node was closed"
        );
        self.stack.push(TreeNode::new(name));
    }

    fn add_attribute(&mut self, name: &str, value: &str) {
        self.open_mut("add_attribute")
            .attributes
            .push((name.to_string(), value.to_string()));
    }

    fn set_value(&mut self, text: &str) {
        self.open_mut("set_value").value = text.to_string();
    }

    fn end_node(&mut self) {
        let node = match self.stack.pop() {
            Some(node) => node,
            None => panic!("TreeNodeWriter::end_node called with no node open"),
        };
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.root = Some(node),
        }
    }
}

// -----------------------------------------------------------------------------
// TreeNodeReader

struct Cursor<'a> {
    node: &'a TreeNode,
    next_child: usize,
}

/// A [`TreeReader`] walking a borrowed [`TreeNode`] tree.
pub struct TreeNodeReader<'a> {
    stack: Vec<Cursor<'a>>,
}

impl<'a> TreeNodeReader<'a> {
    /// Creates a reader positioned at `root`.
    pub fn new(root: &'a TreeNode) -> Self {
        Self {
            stack: alloc::vec![Cursor {
                node: root,
                next_child: 0,
            }],
        }
    }

    fn current(&self) -> &Cursor<'a> {
        // The stack never drains below the root cursor.
        self.stack
            .last()
            .expect("TreeNodeReader cursor stack is never empty")
    }
}

impl TreeReader for TreeNodeReader<'_> {
    fn node_name(&self) -> &str {
        &self.current().node.name
    }

    fn value(&self) -> &str {
        &self.current().node.value
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.current().node.attribute(name)
    }

    fn has_more_children(&self) -> bool {
        let cursor = self.current();
        cursor.next_child < cursor.node.children.len()
    }

    fn move_down(&mut self) {
        let cursor = self
            .stack
            .last_mut()
            .expect("TreeNodeReader cursor stack is never empty");
        let child = match cursor.node.children.get(cursor.next_child) {
            Some(child) => child,
            None => panic!(
                "TreeNodeReader::move_down called on `{}` with no unvisited child",
                cursor.node.name
            ),
        };
        cursor.next_child += 1;
        self.stack.push(Cursor {
            node: child,
            next_child: 0,
        });
    }

    fn move_up(&mut self) {
        assert!(
            self.stack.len() > 1,
            "TreeNodeReader::move_up called at the root node"
        );
        self.stack.pop();
    }
}

// -----------------------------------------------------------------------------
// Tests
