//! Out-of-band state shared across one marshal or unmarshal call.

use alloc::borrow::Cow;
use alloc::boxed::Box;
use core::any::Any;

use ravel_utils::default;
use ravel_utils::hash::HashMap;

// -----------------------------------------------------------------------------
// DataHolder

/// A string-keyed bag of values visible to every converter in one call.
///
/// Callers seed it before the call and converters read or extend it; it
/// never outlives the call on its own, so nothing in it leaks between
/// documents unless the caller reuses the holder deliberately.
#[derive(Default)]
pub struct DataHolder {
    entries: HashMap<Cow<'static, str>, Box<dyn Any>>,
}

impl DataHolder {
    pub fn new() -> Self {
        Self { entries: default() }
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn put<T: Any>(&mut self, key: impl Into<Cow<'static, str>>, value: T) {
        self.entries.insert(key.into(), Box::new(value));
    }

    /// The value under `key`, if present and of type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.entries.get(key)?.downcast_ref()
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.entries.get_mut(key)?.downcast_mut()
    }

    /// Removes and returns the value under `key` when it is a `T`.
    pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
        if !self.entries.get(key)?.is::<T>() {
            return None;
        }
        let boxed = self.entries.remove(key)?;
        boxed.downcast().ok().map(|value| *value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// -----------------------------------------------------------------------------
// Tests
