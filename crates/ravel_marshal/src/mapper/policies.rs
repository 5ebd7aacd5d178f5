//! The built-in policies a default chain is assembled from.

use alloc::borrow::Cow;
use alloc::string::String;
use core::any::{Any, TypeId};

use ravel_utils::TypeIdMap;
use ravel_utils::default;
use ravel_utils::hash::{HashMap, HashSet, NoOpHashState};

use crate::convert::NamedConverter;
use crate::mapper::type_registry::{TypeRegistry, TypeToken};
use crate::mapper::{ImplicitCollectionDef, MapperPolicy, SystemAttr};

/// Per-owner-type configuration, keyed by the owner's [`TypeId`].
type PerType<V> = HashMap<TypeId, V, NoOpHashState>;

// -----------------------------------------------------------------------------
// TypePathPolicy

/// The tail policy: resolves serialized names through the type registry.
///
/// Sits last in a default chain so every alias and default-implementation
/// policy gets a chance to answer first. Resolution tries the full type
/// path, then the unambiguous short name.
pub struct TypePathPolicy {
    registry: TypeRegistry,
}

impl TypePathPolicy {
    pub fn new(registry: TypeRegistry) -> Self {
        Self { registry }
    }

    /// Registers `T` so its serialized name can be resolved back to it.
    pub fn register<T: Any>(&mut self) -> TypeToken {
        self.registry.register::<T>()
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }
}

impl MapperPolicy for TypePathPolicy {
    fn real_type_for(&self, name: &str) -> Option<TypeToken> {
        if let Some(token) = self.registry.with_path(name) {
            return Some(*token);
        }
        self.registry.with_short_name(name).copied()
    }

    fn token_for(&self, type_id: TypeId) -> Option<TypeToken> {
        self.registry.token(type_id).copied()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// -----------------------------------------------------------------------------
// AliasingPolicy

/// Bidirectional name aliases for types and fields.
pub struct AliasingPolicy {
    name_to_type: HashMap<Cow<'static, str>, TypeToken>,
    type_to_name: TypeIdMap<Cow<'static, str>>,
    field_to_alias: PerType<HashMap<Cow<'static, str>, Cow<'static, str>>>,
    alias_to_field: PerType<HashMap<Cow<'static, str>, Cow<'static, str>>>,
}

impl Default for AliasingPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl AliasingPolicy {
    pub fn new() -> Self {
        Self {
            name_to_type: default(),
            type_to_name: TypeIdMap::new(),
            field_to_alias: default(),
            alias_to_field: default(),
        }
    }

    /// Maps a serialized element name to a type, in both directions.
    /// A later alias for the same type replaces the earlier one.
    pub fn alias(&mut self, name: impl Into<Cow<'static, str>>, token: TypeToken) {
        let name = name.into();
        if let Some(previous) = self.type_to_name.insert(token.id(), name.clone()) {
            self.name_to_type.remove(&previous);
        }
        self.name_to_type.insert(name, token);
    }

    /// Maps a serialized field name to a field of `owner`, in both
    /// directions.
    pub fn alias_field(
        &mut self,
        owner: TypeToken,
        field: impl Into<Cow<'static, str>>,
        alias: impl Into<Cow<'static, str>>,
    ) {
        let field = field.into();
        let alias = alias.into();
        self.field_to_alias
            .entry(owner.id())
            .or_default()
            .insert(field.clone(), alias.clone());
        self.alias_to_field
            .entry(owner.id())
            .or_default()
            .insert(alias, field);
    }
}

impl MapperPolicy for AliasingPolicy {
    fn serialized_name_for(&self, token: &TypeToken) -> Option<Cow<'static, str>> {
        self.type_to_name.get(&token.id()).cloned()
    }

    fn real_type_for(&self, name: &str) -> Option<TypeToken> {
        self.name_to_type.get(name).copied()
    }

    fn serialized_field_name(&self, owner: &TypeToken, field: &str) -> Option<Cow<'static, str>> {
        self.field_to_alias.get(&owner.id())?.get(field).cloned()
    }

    fn real_field_name(&self, owner: &TypeToken, alias: &str) -> Option<Cow<'static, str>> {
        self.alias_to_field.get(&owner.id())?.get(alias).cloned()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// -----------------------------------------------------------------------------
// ImmutablePolicy

/// Marks value types whose instances carry no identity.
///
/// Immutable types bypass reference tracking entirely: every occurrence
/// is written inline and repeated occurrences never produce reference
/// markers.
pub struct ImmutablePolicy {
    types: HashSet<TypeId>,
}

impl Default for ImmutablePolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl ImmutablePolicy {
    pub fn new() -> Self {
        Self { types: default() }
    }

    /// A policy pre-loaded with the primitive scalar types.
    pub fn with_primitives() -> Self {
        let mut policy = Self::new();
        policy.add::<()>();
        policy.add::<bool>();
        policy.add::<char>();
        policy.add::<u8>();
        policy.add::<u16>();
        policy.add::<u32>();
        policy.add::<u64>();
        policy.add::<u128>();
        policy.add::<usize>();
        policy.add::<i8>();
        policy.add::<i16>();
        policy.add::<i32>();
        policy.add::<i64>();
        policy.add::<i128>();
        policy.add::<isize>();
        policy.add::<f32>();
        policy.add::<f64>();
        policy.add::<String>();
        policy
    }

    pub fn add<T: Any>(&mut self) {
        self.types.insert(TypeId::of::<T>());
    }

    pub fn add_token(&mut self, token: TypeToken) {
        self.types.insert(token.id());
    }
}

impl MapperPolicy for ImmutablePolicy {
    fn is_immutable(&self, token: &TypeToken) -> Option<bool> {
        self.types.contains(&token.id()).then_some(true)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// -----------------------------------------------------------------------------
// SystemAttributePolicy

/// Renames or suppresses the engine's own attributes (`id`, `reference`).
pub struct SystemAttributePolicy {
    entries: HashMap<Cow<'static, str>, SystemAttr>,
}

impl Default for SystemAttributePolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemAttributePolicy {
    pub fn new() -> Self {
        Self { entries: default() }
    }

    pub fn rename(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        to: impl Into<Cow<'static, str>>,
    ) {
        self.entries
            .insert(name.into(), SystemAttr::Renamed(to.into()));
    }

    pub fn suppress(&mut self, name: impl Into<Cow<'static, str>>) {
        self.entries.insert(name.into(), SystemAttr::Suppressed);
    }
}

impl MapperPolicy for SystemAttributePolicy {
    fn system_attribute(&self, name: &str) -> Option<SystemAttr> {
        self.entries.get(name).cloned()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// -----------------------------------------------------------------------------
// FieldPolicy

/// Per-field treatment: omission, attribute form, and bound converters.
pub struct FieldPolicy {
    omitted: PerType<HashSet<Cow<'static, str>>>,
    attributes: PerType<HashSet<Cow<'static, str>>>,
    converters: PerType<HashMap<Cow<'static, str>, NamedConverter>>,
}

impl Default for FieldPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldPolicy {
    pub fn new() -> Self {
        Self {
            omitted: default(),
            attributes: default(),
            converters: default(),
        }
    }

    /// Excludes a field from marshalling; on read such an element is
    /// skipped instead of failing.
    pub fn omit(&mut self, owner: TypeToken, field: impl Into<Cow<'static, str>>) {
        self.omitted.entry(owner.id()).or_default().insert(field.into());
    }

    /// Writes a field as an attribute of the owner's node. Only fields
    /// whose converter yields a plain string can take this form.
    pub fn use_attribute(&mut self, owner: TypeToken, field: impl Into<Cow<'static, str>>) {
        self.attributes
            .entry(owner.id())
            .or_default()
            .insert(field.into());
    }

    /// Binds a converter to one specific field, overriding registry
    /// lookup for that field.
    pub fn bind_converter(
        &mut self,
        owner: TypeToken,
        field: impl Into<Cow<'static, str>>,
        converter: NamedConverter,
    ) {
        self.converters
            .entry(owner.id())
            .or_default()
            .insert(field.into(), converter);
    }
}

impl MapperPolicy for FieldPolicy {
    fn should_serialize_field(&self, owner: &TypeToken, field: &str) -> Option<bool> {
        self.omitted
            .get(&owner.id())
            .is_some_and(|fields| fields.contains(field))
            .then_some(false)
    }

    fn write_as_attribute(&self, owner: &TypeToken, field: &str) -> Option<bool> {
        self.attributes
            .get(&owner.id())
            .is_some_and(|fields| fields.contains(field))
            .then_some(true)
    }

    fn converter_for_field(&self, owner: &TypeToken, field: &str) -> Option<NamedConverter> {
        self.converters.get(&owner.id())?.get(field).cloned()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// -----------------------------------------------------------------------------
// ImplicitCollectionPolicy

/// Declares fields whose items are inlined into the owner's node.
pub struct ImplicitCollectionPolicy {
    defs: PerType<HashMap<Cow<'static, str>, ImplicitCollectionDef>>,
}

impl Default for ImplicitCollectionPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl ImplicitCollectionPolicy {
    pub fn new() -> Self {
        Self { defs: default() }
    }

    pub fn add(
        &mut self,
        owner: TypeToken,
        field: impl Into<Cow<'static, str>>,
        item_name: impl Into<String>,
        item_type: Option<TypeToken>,
    ) {
        self.defs.entry(owner.id()).or_default().insert(
            field.into(),
            ImplicitCollectionDef {
                item_name: item_name.into(),
                item_type,
            },
        );
    }

    /// The declaration whose item name matches an incoming child element
    /// of `owner`, used on the read side where the field name is absent.
    pub fn matching_item(
        &self,
        owner: &TypeToken,
        item_name: &str,
    ) -> Option<(&str, &ImplicitCollectionDef)> {
        self.defs
            .get(&owner.id())?
            .iter()
            .find(|(_, def)| def.item_name == item_name)
            .map(|(field, def)| (field.as_ref(), def))
    }
}

impl MapperPolicy for ImplicitCollectionPolicy {
    fn implicit_collection_for(
        &self,
        owner: &TypeToken,
        field: &str,
    ) -> Option<&ImplicitCollectionDef> {
        self.defs.get(&owner.id())?.get(field)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// -----------------------------------------------------------------------------
// DefaultImplementationPolicy

/// Substitutes a concrete type for an abstract one, in both directions:
/// values of the implementation are written under the abstract type's
/// name, and elements naming the abstract type instantiate the
/// implementation.
pub struct DefaultImplementationPolicy {
    implementation_of: TypeIdMap<TypeToken>,
    serialized_as: TypeIdMap<TypeToken>,
}

impl Default for DefaultImplementationPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultImplementationPolicy {
    pub fn new() -> Self {
        Self {
            implementation_of: TypeIdMap::new(),
            serialized_as: TypeIdMap::new(),
        }
    }

    pub fn register(&mut self, abstract_type: TypeToken, implementation: TypeToken) {
        self.implementation_of
            .insert(abstract_type.id(), implementation);
        self.serialized_as.insert(implementation.id(), abstract_type);
    }
}

impl MapperPolicy for DefaultImplementationPolicy {
    fn serialized_type_for(&self, token: &TypeToken) -> Option<TypeToken> {
        self.serialized_as.get(&token.id()).copied()
    }

    fn default_implementation_of(&self, token: &TypeToken) -> Option<TypeToken> {
        self.implementation_of.get(&token.id()).copied()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// -----------------------------------------------------------------------------
// Tests
