//! Write-side reference tracking.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use ravel_tree::path::Path;

use crate::object::{IdentityMap, Obj};
use crate::refs::ReferenceMode;

// -----------------------------------------------------------------------------
// Decision

/// What the driver should do with the value it is about to convert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// First occurrence: convert it. `Some(id)` must be emitted as the
    /// `id` system attribute under the id strategy.
    New(Option<u64>),
    /// Already seen, but traversal has not yet moved past the recorded
    /// first occurrence: convert inline again under the original key.
    Inline,
    /// Already seen elsewhere: emit this marker as the `reference`
    /// system attribute instead of converting.
    Seen(String),
}

// -----------------------------------------------------------------------------
// WriteRefs

struct Record {
    first_path: Path,
    id: u64,
}

/// Tracks every mutable value the current marshal call has produced.
///
/// Identity is the value's allocation address, so each tracked value is
/// also retained here; otherwise a dropped value's address could be
/// reused mid-call and alias an unrelated object.
pub struct WriteRefs {
    mode: ReferenceMode,
    seen: IdentityMap<Record>,
    retained: Vec<Obj>,
    next_id: u64,
}

impl WriteRefs {
    pub fn new(mode: ReferenceMode) -> Self {
        Self {
            mode,
            seen: IdentityMap::new(),
            retained: Vec::new(),
            next_id: 1,
        }
    }

    pub fn mode(&self) -> ReferenceMode {
        self.mode
    }

    /// Classifies `value` at the writer position `current`.
    ///
    /// A repeat occurrence produces a marker only once the current path
    /// is no longer an ancestor-or-self of the recorded first path;
    /// until then the value converts inline so an object revisited at
    /// its own position never references itself.
    pub fn decide(&mut self, value: &Obj, current: &Path) -> Decision {
        if self.mode == ReferenceMode::Off {
            return Decision::New(None);
        }
        if let Some(record) = self.seen.get(value) {
            if current.is_ancestor_of(&record.first_path) {
                return Decision::Inline;
            }
            return Decision::Seen(self.marker_for(record, current));
        }
        let id = self.next_id;
        self.next_id += 1;
        self.seen.insert(
            value,
            Record {
                first_path: current.clone(),
                id,
            },
        );
        self.retained.push(value.clone());
        Decision::New((self.mode == ReferenceMode::Id).then_some(id))
    }

    fn marker_for(&self, record: &Record, current: &Path) -> String {
        match self.mode {
            ReferenceMode::Off => unreachable!("no markers without tracking"),
            ReferenceMode::Id => record.id.to_string(),
            ReferenceMode::PathRelative => record.first_path.relative_to(current).render(),
            ReferenceMode::PathAbsolute => record.first_path.render(),
            ReferenceMode::PathRelativeSingleNode => {
                record.first_path.relative_to(current).render_explicit()
            }
            ReferenceMode::PathAbsoluteSingleNode => record.first_path.render_explicit(),
        }
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::obj;
    use alloc::string::String;

    fn path(text: &str) -> Path {
        Path::parse(text).unwrap()
    }

    #[test]
    fn id_strategy_numbers_first_occurrences_from_one() {
        let mut refs = WriteRefs::new(ReferenceMode::Id);
        let first = obj(String::from("a"));
        let second = obj(String::from("b"));

        assert_eq!(refs.decide(&first, &path("/root/x")), Decision::New(Some(1)));
        assert_eq!(refs.decide(&second, &path("/root/y")), Decision::New(Some(2)));
        assert_eq!(
            refs.decide(&first, &path("/root/z")),
            Decision::Seen(String::from("1"))
        );
    }

    #[test]
    fn path_strategies_emit_no_attribute_on_first_occurrence() {
        let mut refs = WriteRefs::new(ReferenceMode::PathRelative);
        let value = obj(0_u32);
        assert_eq!(refs.decide(&value, &path("/root/x")), Decision::New(None));
    }

    #[test]
    fn relative_marker_traverses_the_common_ancestor() {
        let mut refs = WriteRefs::new(ReferenceMode::PathRelative);
        let value = obj(0_u32);
        refs.decide(&value, &path("/root/a/b"));
        assert_eq!(
            refs.decide(&value, &path("/root/c")),
            Decision::Seen(String::from("../a/b"))
        );
    }

    #[test]
    fn absolute_marker_starts_at_the_document_root() {
        let mut refs = WriteRefs::new(ReferenceMode::PathAbsolute);
        let value = obj(0_u32);
        refs.decide(&value, &path("/root/a/b"));
        assert_eq!(
            refs.decide(&value, &path("/root/c")),
            Decision::Seen(String::from("/root/a/b"))
        );
    }

    #[test]
    fn single_node_markers_carry_index_predicates() {
        let mut refs = WriteRefs::new(ReferenceMode::PathAbsoluteSingleNode);
        let value = obj(0_u32);
        refs.decide(&value, &path("/root/a/b"));
        let Decision::Seen(marker) = refs.decide(&value, &path("/root/c")) else {
            panic!("expected a marker");
        };
        assert_eq!(marker, "/root[1]/a[1]/b[1]");
    }

    #[test]
    fn revisit_at_an_ancestor_position_converts_inline() {
        let mut refs = WriteRefs::new(ReferenceMode::PathRelative);
        let value = obj(0_u32);
        refs.decide(&value, &path("/root/a/b"));
        // Still inside the recorded subtree, including the exact position.
        assert_eq!(refs.decide(&value, &path("/root/a/b")), Decision::Inline);
        assert_eq!(refs.decide(&value, &path("/root/a")), Decision::Inline);
        // Diverged: now it is a genuine back-reference.
        assert!(matches!(
            refs.decide(&value, &path("/root/a/c")),
            Decision::Seen(_)
        ));
    }

    #[test]
    fn disabled_tracking_never_records() {
        let mut refs = WriteRefs::new(ReferenceMode::Off);
        let value = obj(0_u32);
        assert_eq!(refs.decide(&value, &path("/root/x")), Decision::New(None));
        assert_eq!(refs.decide(&value, &path("/root/y")), Decision::New(None));
    }
}
