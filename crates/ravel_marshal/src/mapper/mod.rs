//! The naming/field policy layer.
//!
//! The original shape of this component is a chain of decorators each
//! implementing a wide policy interface. Here it is an ordered list of
//! *narrow* policy objects behind one dispatcher, [`MapperChain`]: every
//! policy method answers `Option`, the chain queries policies front to
//! back, and the first non-`None` answer wins. Policies that were not
//! consulted or had no opinion fall through to the chain's base defaults.
//!
//! Policies are located by concrete type through
//! [`lookup_policy`](MapperChain::lookup_policy), which is how
//! independently configured policies (and the configuration facade)
//! cooperate with one another.

use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::any::{Any, TypeId};

mod policies;
mod type_registry;

pub use policies::{
    AliasingPolicy, DefaultImplementationPolicy, FieldPolicy, ImmutablePolicy,
    ImplicitCollectionPolicy, SystemAttributePolicy, TypePathPolicy,
};
pub use type_registry::{TypeRegistry, TypeToken};

use crate::convert::NamedConverter;
use crate::error::{InitializationError, TypeResolutionError};

// -----------------------------------------------------------------------------
// SystemAttr

/// A policy's answer for a system attribute such as `id` or `reference`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemAttr {
    /// Emit the attribute under a different name.
    Renamed(Cow<'static, str>),
    /// Do not emit the attribute at all.
    Suppressed,
}

// -----------------------------------------------------------------------------
// ImplicitCollectionDef

/// Declares that a field's items are written directly into the owner's
/// node, without a wrapping element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplicitCollectionDef {
    /// The element name each item is written under.
    pub item_name: String,
    /// The declared item type, when the collection is homogeneous.
    pub item_type: Option<TypeToken>,
}

// -----------------------------------------------------------------------------
// MapperPolicy

/// One narrow naming/field policy.
///
/// Every method defaults to `None`, meaning "no opinion, ask the next
/// policy". Implementations override only the subset they have a policy
/// for and must supply the `as_any` accessors for type-based lookup.
pub trait MapperPolicy: Any + Send + Sync {
    /// The serialized element name of a type.
    fn serialized_name_for(&self, _token: &TypeToken) -> Option<Cow<'static, str>> {
        None
    }

    /// The type a serialized element name denotes.
    fn real_type_for(&self, _name: &str) -> Option<TypeToken> {
        None
    }

    /// The token of a [`TypeId`] that entered the engine type-erased.
    fn token_for(&self, _type_id: TypeId) -> Option<TypeToken> {
        None
    }

    /// The type a value should be *written as*
    /// (the inverse of [`default_implementation_of`](Self::default_implementation_of)).
    fn serialized_type_for(&self, _token: &TypeToken) -> Option<TypeToken> {
        None
    }

    /// The concrete type to instantiate for a serialized type.
    fn default_implementation_of(&self, _token: &TypeToken) -> Option<TypeToken> {
        None
    }

    /// The serialized name of a field.
    fn serialized_field_name(&self, _owner: &TypeToken, _field: &str) -> Option<Cow<'static, str>> {
        None
    }

    /// The field a serialized field name denotes.
    fn real_field_name(&self, _owner: &TypeToken, _alias: &str) -> Option<Cow<'static, str>> {
        None
    }

    /// Whether a field participates in marshalling.
    fn should_serialize_field(&self, _owner: &TypeToken, _field: &str) -> Option<bool> {
        None
    }

    /// A converter bound to one specific field.
    fn converter_for_field(&self, _owner: &TypeToken, _field: &str) -> Option<NamedConverter> {
        None
    }

    /// Whether a type is an immutable value type, exempt from reference
    /// tracking.
    fn is_immutable(&self, _token: &TypeToken) -> Option<bool> {
        None
    }

    /// The implicit-collection declaration of a field, if any.
    fn implicit_collection_for(
        &self,
        _owner: &TypeToken,
        _field: &str,
    ) -> Option<&ImplicitCollectionDef> {
        None
    }

    /// Whether a field is written as an attribute instead of a child
    /// element.
    fn write_as_attribute(&self, _owner: &TypeToken, _field: &str) -> Option<bool> {
        None
    }

    /// Renames or suppresses a system attribute (`id`, `reference`).
    fn system_attribute(&self, _name: &str) -> Option<SystemAttr> {
        None
    }

    /// Type-erased access for [`MapperChain::lookup_policy`].
    fn as_any(&self) -> &dyn Any;

    /// Type-erased access for [`MapperChain::lookup_policy_mut`].
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

// -----------------------------------------------------------------------------
// MapperChain

/// The ordered policy list plus base defaults.
///
/// Built once during configuration; holds no interior mutability, so a
/// finished chain can be read from any number of concurrent traversals.
///
/// For any alias registered through the chain,
/// `serialized_name_for(real_type_for(name)) == name` holds.
pub struct MapperChain {
    policies: Vec<Box<dyn MapperPolicy>>,
}

impl Default for MapperChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MapperChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self {
            policies: Vec::new(),
        }
    }

    /// Appends a policy at the tail (lowest precedence).
    pub fn push(&mut self, policy: impl MapperPolicy) {
        self.policies.push(Box::new(policy));
    }

    /// The number of policies in the chain.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// The first policy of concrete type `T`, searching front to back.
    pub fn lookup_policy<T: MapperPolicy>(&self) -> Option<&T> {
        self.policies
            .iter()
            .find_map(|policy| policy.as_any().downcast_ref::<T>())
    }

    /// Mutable variant of [`lookup_policy`](Self::lookup_policy).
    pub fn lookup_policy_mut<T: MapperPolicy>(&mut self) -> Option<&mut T> {
        self.policies
            .iter_mut()
            .find_map(|policy| policy.as_any_mut().downcast_mut::<T>())
    }

    /// Like [`lookup_policy_mut`](Self::lookup_policy_mut), but a missing
    /// policy is an [`InitializationError`] naming the operation that
    /// needed it.
    pub fn expect_policy_mut<T: MapperPolicy>(
        &mut self,
        operation: &'static str,
    ) -> Result<&mut T, InitializationError> {
        self.lookup_policy_mut::<T>()
            .ok_or(InitializationError {
                missing: core::any::type_name::<T>(),
                operation,
            })
    }

    // ---- dispatched policy surface ----

    /// The serialized element name of a type. Defaults to the full type
    /// path.
    pub fn serialized_name_for(&self, token: &TypeToken) -> Cow<'static, str> {
        self.policies
            .iter()
            .find_map(|policy| policy.serialized_name_for(token))
            .unwrap_or(Cow::Borrowed(token.path()))
    }

    /// Resolves a serialized element name to a type.
    pub fn real_type_for(&self, name: &str) -> Result<TypeToken, TypeResolutionError> {
        self.policies
            .iter()
            .find_map(|policy| policy.real_type_for(name))
            .ok_or_else(|| TypeResolutionError {
                name: name.to_string(),
            })
    }

    /// Resolves a [`TypeId`] back to its registered token.
    pub fn token_for(&self, type_id: TypeId) -> Option<TypeToken> {
        self.policies
            .iter()
            .find_map(|policy| policy.token_for(type_id))
    }

    /// The type a value is written as. Defaults to the value's own type.
    pub fn serialized_type(&self, token: &TypeToken) -> TypeToken {
        self.policies
            .iter()
            .find_map(|policy| policy.serialized_type_for(token))
            .unwrap_or(*token)
    }

    /// The concrete type to instantiate for a serialized type.
    /// Defaults to the type itself.
    pub fn default_implementation_of(&self, token: &TypeToken) -> TypeToken {
        self.policies
            .iter()
            .find_map(|policy| policy.default_implementation_of(token))
            .unwrap_or(*token)
    }

    /// The serialized name of a field. Defaults to the field name.
    pub fn serialized_field_name(&self, owner: &TypeToken, field: &str) -> Cow<'static, str> {
        self.policies
            .iter()
            .find_map(|policy| policy.serialized_field_name(owner, field))
            .unwrap_or_else(|| Cow::Owned(field.to_string()))
    }

    /// Resolves a serialized field name back to the field.
    /// Defaults to the name itself.
    pub fn real_field_name(&self, owner: &TypeToken, alias: &str) -> Cow<'static, str> {
        self.policies
            .iter()
            .find_map(|policy| policy.real_field_name(owner, alias))
            .unwrap_or_else(|| Cow::Owned(alias.to_string()))
    }

    /// Whether a field participates in marshalling. Defaults to `true`.
    pub fn should_serialize_field(&self, owner: &TypeToken, field: &str) -> bool {
        self.policies
            .iter()
            .find_map(|policy| policy.should_serialize_field(owner, field))
            .unwrap_or(true)
    }

    /// A converter bound to one specific field, if any policy declares one.
    pub fn converter_for_field(&self, owner: &TypeToken, field: &str) -> Option<NamedConverter> {
        self.policies
            .iter()
            .find_map(|policy| policy.converter_for_field(owner, field))
    }

    /// Whether a type is an immutable value type. Defaults to `false`.
    pub fn is_immutable(&self, token: &TypeToken) -> bool {
        self.policies
            .iter()
            .find_map(|policy| policy.is_immutable(token))
            .unwrap_or(false)
    }

    /// The implicit-collection declaration of a field, if any.
    pub fn implicit_collection_for(
        &self,
        owner: &TypeToken,
        field: &str,
    ) -> Option<&ImplicitCollectionDef> {
        self.policies
            .iter()
            .find_map(|policy| policy.implicit_collection_for(owner, field))
    }

    /// Whether a field is written as an attribute. Defaults to `false`.
    pub fn write_as_attribute(&self, owner: &TypeToken, field: &str) -> bool {
        self.policies
            .iter()
            .find_map(|policy| policy.write_as_attribute(owner, field))
            .unwrap_or(false)
    }

    /// The effective name of a system attribute, `None` when suppressed.
    /// Defaults to the attribute's own name.
    pub fn system_attribute(&self, name: &'static str) -> Option<Cow<'static, str>> {
        for policy in &self.policies {
            if let Some(attr) = policy.system_attribute(name) {
                return match attr {
                    SystemAttr::Renamed(renamed) => Some(renamed),
                    SystemAttr::Suppressed => None,
                };
            }
        }
        Some(Cow::Borrowed(name))
    }
}

// -----------------------------------------------------------------------------
// Tests
