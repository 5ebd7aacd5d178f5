//! Read-side reference resolution.

use alloc::format;
use alloc::string::ToString;
use alloc::vec::Vec;

use ravel_tree::path::Path;
use ravel_utils::default;
use ravel_utils::hash::HashMap;

use crate::error::{ConversionError, InvalidReferenceError};
use crate::object::Obj;
use crate::refs::{RefKey, ReferenceMode};

// -----------------------------------------------------------------------------
// ReadRefs

/// Values produced so far in the current unmarshal call, keyed the way
/// the active strategy keys them.
///
/// A value only enters `values` once its converter returns, so a marker
/// pointing *into* the currently open element cannot resolve through the
/// map alone. The parent stack covers that case: before a child
/// converts, the still-unfinished parent is registered under its pending
/// key, letting a child reference its own ancestor.
pub struct ReadRefs {
    mode: ReferenceMode,
    values: HashMap<RefKey, Obj>,
    parent_stack: Vec<Option<RefKey>>,
}

impl ReadRefs {
    pub fn new(mode: ReferenceMode) -> Self {
        Self {
            mode,
            values: default(),
            parent_stack: Vec::new(),
        }
    }

    pub fn mode(&self) -> ReferenceMode {
        self.mode
    }

    /// The key the value at the current position will be recorded under.
    ///
    /// `id_attr` is the value of the `id` system attribute when present;
    /// it only matters under the id strategy, where a malformed number is
    /// a [`ConversionError`].
    pub fn current_key(
        &self,
        id_attr: Option<&str>,
        current: &Path,
    ) -> Result<Option<RefKey>, ConversionError> {
        match self.mode {
            ReferenceMode::Off => Ok(None),
            ReferenceMode::Id => id_attr
                .map(|attr| {
                    attr.parse::<u64>()
                        .map(RefKey::Id)
                        .map_err(|_| {
                            ConversionError::new(format!("id attribute `{attr}` is not a number"))
                        })
                })
                .transpose(),
            _ => Ok(Some(RefKey::Path(current.clone()))),
        }
    }

    /// Resolves a `reference` marker read at `current`.
    pub fn resolve(&self, marker: &str, current: &Path) -> Result<Obj, InvalidReferenceError> {
        let invalid = || InvalidReferenceError {
            marker: marker.to_string(),
        };

        let key = match self.mode {
            ReferenceMode::Off => return Err(invalid()),
            ReferenceMode::Id => RefKey::Id(marker.parse().map_err(|_| invalid())?),
            _ => {
                let parsed = Path::parse(marker).map_err(|_| invalid())?;
                RefKey::Path(current.apply(&parsed).ok_or_else(invalid)?)
            }
        };
        self.values.get(&key).cloned().ok_or_else(invalid)
    }

    /// Records a finished value under its key.
    pub fn record(&mut self, key: RefKey, value: &Obj) {
        self.values.insert(key, value.clone());
    }

    /// Enters a nested conversion whose value will be keyed by `key`.
    pub fn push_parent(&mut self, key: Option<RefKey>) {
        self.parent_stack.push(key);
    }

    pub fn pop_parent(&mut self) {
        self.parent_stack.pop();
    }

    /// Registers the still-unfinished `parent` under its pending key, so
    /// a marker inside the open element can reach it. A finished value
    /// already recorded under the key is left alone.
    pub fn register_parent_if_pending(&mut self, parent: &Obj) {
        if let Some(Some(key)) = self.parent_stack.last() {
            if !self.values.contains_key(key) {
                self.values.insert(key.clone(), parent.clone());
            }
        }
    }
}

// -----------------------------------------------------------------------------
// Tests
