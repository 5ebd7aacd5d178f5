//! The type-erased object model the engine traverses.
//!
//! There is no runtime field reflection here: an object graph is built from
//! [`Obj`] handles, and identity is what `Rc` identity is. Two clones of one
//! `Rc` are the same object; two separately allocated but equal values are
//! not. Objects that are mutated while a graph is being reassembled are
//! modelled as `Rc<RefCell<T>>` behind the same erased handle.

use alloc::rc::Rc;
use core::any::{Any, TypeId};

use ravel_utils::hash::HashMap;

// -----------------------------------------------------------------------------
// Obj

/// A shared, type-erased node of an object graph.
pub type Obj = Rc<dyn Any>;

/// Erases a value into an [`Obj`].
#[inline]
pub fn obj<T: Any>(value: T) -> Obj {
    Rc::new(value)
}

/// The [`TypeId`] of the value behind an [`Obj`].
#[inline]
pub fn obj_type_id(obj: &Obj) -> TypeId {
    (**obj).type_id()
}

/// Whether two handles point at the identical allocation.
#[inline]
pub fn same_obj(a: &Obj, b: &Obj) -> bool {
    Rc::ptr_eq(a, b)
}

// -----------------------------------------------------------------------------
// ObjId

/// The identity surrogate of an [`Obj`]: the address of its allocation.
///
/// Stable for as long as the allocation lives; every structure keyed by
/// `ObjId` therefore also retains the objects it tracks.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ObjId(usize);

/// The [`ObjId`] of an object handle.
#[inline]
pub fn obj_id(obj: &Obj) -> ObjId {
    ObjId(Rc::as_ptr(obj).cast::<()>() as usize)
}

// -----------------------------------------------------------------------------
// IdentityMap

/// A map keyed by object *identity*, never by value equality.
///
/// Scoped to one marshal/unmarshal call. The map does not keep its keys
/// alive; callers retain the tracked objects for the duration of the call
/// so addresses cannot be reused.
pub struct IdentityMap<V> {
    inner: HashMap<ObjId, V>,
}

impl<V> IdentityMap<V> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self {
            inner: HashMap::default(),
        }
    }

    /// Associates `value` with the identity of `obj`,
    /// returning a previous association.
    pub fn insert(&mut self, obj: &Obj, value: V) -> Option<V> {
        self.inner.insert(obj_id(obj), value)
    }

    /// Returns the value associated with the identity of `obj`.
    pub fn get(&self, obj: &Obj) -> Option<&V> {
        self.inner.get(&obj_id(obj))
    }

    /// Whether the identity of `obj` has an association.
    pub fn contains(&self, obj: &Obj) -> bool {
        self.inner.contains_key(&obj_id(obj))
    }

    /// Removes the association for the identity of `obj`.
    pub fn remove(&mut self, obj: &Obj) -> Option<V> {
        self.inner.remove(&obj_id(obj))
    }

    /// The number of tracked identities.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<V> Default for IdentityMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::string::String;

    use super::{IdentityMap, Obj, obj, same_obj};

    #[test]
    fn identity_is_allocation_not_value() {
        let a: Obj = obj(String::from("same"));
        let b: Obj = obj(String::from("same"));
        let a2 = Rc::clone(&a);

        let mut map = IdentityMap::new();
        map.insert(&a, 1);

        assert!(map.contains(&a2));
        assert!(!map.contains(&b));
        assert!(same_obj(&a, &a2));
        assert!(!same_obj(&a, &b));
    }

    #[test]
    fn downcast_reaches_the_erased_value() {
        let value: Obj = obj(42_u32);
        assert_eq!(value.downcast_ref::<u32>(), Some(&42));
        assert!(value.downcast_ref::<i32>().is_none());
    }
}
