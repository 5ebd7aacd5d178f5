use alloc::string::String;
use core::any::{Any, TypeId};

use ravel_utils::TypeIdMap;
use ravel_utils::hash::{HashMap, HashSet};

// -----------------------------------------------------------------------------
// TypeToken

/// A registered type, the engine's stand-in for a "class".
///
/// A token pairs the [`TypeId`] with the fully qualified type path. Tokens
/// are built statically with [`TypeToken::of`]; the path is what a type
/// serializes as when no aliasing policy overrides it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeToken {
    id: TypeId,
    path: &'static str,
}

impl TypeToken {
    /// The token of `T`.
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            path: core::any::type_name::<T>(),
        }
    }

    /// The [`TypeId`] of the represented type.
    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The fully qualified type path.
    #[inline]
    pub fn path(&self) -> &'static str {
        self.path
    }

    /// The final path segment, e.g. `String` for `alloc::string::String`.
    pub fn short_name(&self) -> &'static str {
        self.path.rsplit("::").next().unwrap_or(self.path)
    }

    /// Whether this token represents `T`.
    #[inline]
    pub fn is<T: Any>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

// -----------------------------------------------------------------------------
// TypeRegistry

/// The store of all types participating in marshalling.
///
/// Registration is the mandatory upfront configuration pass: the engines
/// never discover types lazily during a traversal, so the registry is
/// mutated only while the configuration is being assembled and is read-only
/// afterwards.
///
/// Besides the token table the registry maintains reverse indices from the
/// full type path and from the short name; a short name claimed by more
/// than one registered type becomes ambiguous and stops resolving.
pub struct TypeRegistry {
    tokens: TypeIdMap<TypeToken>,
    path_to_id: HashMap<&'static str, TypeId>,
    name_to_id: HashMap<&'static str, TypeId>,
    ambiguous_names: HashSet<&'static str>,
}

impl Default for TypeRegistry {
    /// See [`TypeRegistry::new`] .
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[inline]
    pub const fn empty() -> Self {
        Self {
            tokens: TypeIdMap::new(),
            path_to_id: HashMap::with_hasher(ravel_utils::hash::FixedHashState),
            name_to_id: HashMap::with_hasher(ravel_utils::hash::FixedHashState),
            ambiguous_names: HashSet::with_hasher(ravel_utils::hash::FixedHashState),
        }
    }

    /// Creates a registry with the primitive types pre-registered.
    ///
    /// - `()` `bool` `char`
    /// - `i8 - i128` `isize`
    /// - `u8 - u128` `usize`
    /// - `f32` `f64`
    /// - `String`
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register::<()>();
        registry.register::<bool>();
        registry.register::<char>();
        registry.register::<u8>();
        registry.register::<u16>();
        registry.register::<u32>();
        registry.register::<u64>();
        registry.register::<u128>();
        registry.register::<usize>();
        registry.register::<i8>();
        registry.register::<i16>();
        registry.register::<i32>();
        registry.register::<i64>();
        registry.register::<i128>();
        registry.register::<isize>();
        registry.register::<f32>();
        registry.register::<f64>();
        registry.register::<String>();
        registry
    }

    /// Registers `T` if it has not been registered already,
    /// returning its token.
    pub fn register<T: Any>(&mut self) -> TypeToken {
        let token = TypeToken::of::<T>();
        if self.tokens.try_insert(token.id(), || token) {
            log::trace!("registered type `{}`", token.path());
            self.index(token);
        }
        token
    }

    fn index(&mut self, token: TypeToken) {
        let short = token.short_name();

        // A short name claimed twice stops resolving.
        if !self.ambiguous_names.contains(short) {
            if self.name_to_id.contains_key(short) {
                self.name_to_id.remove(short);
                self.ambiguous_names.insert(short);
            } else {
                self.name_to_id.insert(short, token.id());
            }
        }

        // Full paths are assumed to be unique for distinct types.
        self.path_to_id.insert(token.path(), token.id());
    }

    /// Whether the type with the given [`TypeId`] is registered.
    #[inline]
    pub fn contains(&self, type_id: TypeId) -> bool {
        self.tokens.contains(&type_id)
    }

    /// The token of the type with the given [`TypeId`].
    #[inline]
    pub fn token(&self, type_id: TypeId) -> Option<&TypeToken> {
        self.tokens.get(&type_id)
    }

    /// The token registered under the given full type path.
    pub fn with_path(&self, path: &str) -> Option<&TypeToken> {
        match self.path_to_id.get(path) {
            Some(id) => self.token(*id),
            None => None,
        }
    }

    /// The token registered under the given short name.
    ///
    /// Returns `None` if the name is ambiguous or unknown.
    pub fn with_short_name(&self, name: &str) -> Option<&TypeToken> {
        match self.name_to_id.get(name) {
            Some(id) => self.token(*id),
            None => None,
        }
    }

    /// Whether the given short name matches more than one registered type.
    pub fn is_ambiguous(&self, name: &str) -> bool {
        self.ambiguous_names.contains(name)
    }

    /// An iterator over all registered tokens.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &TypeToken> {
        self.tokens.values()
    }
}

// -----------------------------------------------------------------------------
// Tests
