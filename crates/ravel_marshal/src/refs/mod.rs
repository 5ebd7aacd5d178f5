//! Reference tracking: how repeated occurrences of one value are keyed,
//! marked, and resolved.

use ravel_tree::path::Path;

mod read;
mod write;

pub use read::ReadRefs;
pub use write::{Decision, WriteRefs};

// -----------------------------------------------------------------------------
// ReferenceMode

/// Strategy for repeated occurrences of the same value in one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceMode {
    /// No tracking. Shared values are duplicated and a circular graph is
    /// a [`StructuralError`](crate::error::StructuralError).
    Off,
    /// First occurrence gets a sequential `id` attribute; repeats point
    /// at it by number.
    Id,
    /// Repeats carry the first occurrence's path, rendered relative to
    /// the marker's own position.
    #[default]
    PathRelative,
    /// Repeats carry the first occurrence's path from the document root.
    PathAbsolute,
    /// Like [`PathRelative`](Self::PathRelative), with an index predicate
    /// on every component.
    PathRelativeSingleNode,
    /// Like [`PathAbsolute`](Self::PathAbsolute), with an index predicate
    /// on every component.
    PathAbsoluteSingleNode,
}

impl ReferenceMode {
    /// Whether markers are paths rather than numeric ids.
    pub fn is_path_based(self) -> bool {
        !matches!(self, Self::Off | Self::Id)
    }
}

// -----------------------------------------------------------------------------
// RefKey

/// The key a first occurrence is recorded under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefKey {
    /// Sequential id, starting at 1.
    Id(u64),
    /// The absolute path of the first occurrence.
    Path(Path),
}
