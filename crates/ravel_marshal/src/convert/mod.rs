//! Converters: the pluggable units that turn values into tree nodes and
//! back.

use alloc::string::String;
use alloc::sync::Arc;
use core::fmt;

mod basics;
mod registry;

pub use basics::{PrimitiveScalar, register_basics};
pub use registry::{
    ConverterRegistry, PRIORITY_LOW, PRIORITY_NORMAL, PRIORITY_VERY_HIGH, PRIORITY_VERY_LOW,
};

use crate::driver::{MarshalContext, UnmarshalContext};
use crate::error::{ConversionError, Result};
use crate::mapper::TypeToken;
use crate::object::Obj;

// -----------------------------------------------------------------------------
// Converter

/// Converts values of the types it claims into a subtree and back.
///
/// A converter is handed the node already positioned: on write the driver
/// has started the value's element before calling [`marshal`](Self::marshal),
/// and on read the reader sits on the element when
/// [`unmarshal`](Self::unmarshal) runs. Child values go through the
/// context's `convert_another` so reference tracking sees them.
pub trait Converter: Send + Sync + 'static {
    /// Whether this converter handles values of `token`'s type.
    fn can_convert(&self, token: &TypeToken) -> bool;

    /// Writes `value`'s content into the current node.
    fn marshal(&self, value: &Obj, ctx: &mut MarshalContext<'_>) -> Result<()>;

    /// Builds a value from the current node.
    fn unmarshal(&self, ctx: &mut UnmarshalContext<'_>) -> Result<Obj>;
}

// -----------------------------------------------------------------------------
// NamedConverter

/// A shared converter paired with its concrete type name.
///
/// Trait objects cannot recover the implementing type's name, so it is
/// captured at registration and carried along for error diagnostics.
/// Converters registered through [`of_scalar`](Self::of_scalar) also keep
/// their scalar face, which is what qualifies a field for attribute form.
#[derive(Clone)]
pub struct NamedConverter {
    converter: Arc<dyn Converter>,
    scalar: Option<Arc<dyn ScalarConverter>>,
    name: &'static str,
}

impl NamedConverter {
    /// Wraps `converter`, recording `C`'s type name.
    pub fn of<C: Converter>(converter: C) -> Self {
        Self {
            converter: Arc::new(converter),
            scalar: None,
            name: core::any::type_name::<C>(),
        }
    }

    /// Wraps a scalar converter, keeping both its faces.
    pub fn of_scalar<S: ScalarConverter>(converter: S) -> Self {
        let adapter = Arc::new(ScalarAdapter(converter));
        Self {
            converter: adapter.clone(),
            scalar: Some(adapter),
            name: core::any::type_name::<S>(),
        }
    }

    /// The concrete type name of the wrapped converter.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get(&self) -> &dyn Converter {
        &*self.converter
    }

    /// The scalar face, when the converter has one.
    pub fn as_scalar(&self) -> Option<&dyn ScalarConverter> {
        self.scalar.as_deref()
    }
}

impl fmt::Debug for NamedConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NamedConverter").field(&self.name).finish()
    }
}

// -----------------------------------------------------------------------------
// ScalarConverter

/// A converter whose entire representation is one text value.
///
/// Scalar converters never touch the tree themselves; [`ScalarAdapter`]
/// places their text as the node value, which also makes them eligible
/// for attribute-form fields.
pub trait ScalarConverter: Send + Sync + 'static {
    /// Whether this converter handles values of `token`'s type.
    fn can_convert(&self, token: &TypeToken) -> bool;

    /// Renders `value` as text.
    fn to_text(&self, value: &Obj) -> Result<String, ConversionError>;

    /// Parses a value back from text.
    fn from_text(&self, text: &str) -> Result<Obj, ConversionError>;
}

/// Adapts a [`ScalarConverter`] to the full [`Converter`] interface.
pub struct ScalarAdapter<S>(pub S);

impl<S: ScalarConverter> ScalarConverter for ScalarAdapter<S> {
    fn can_convert(&self, token: &TypeToken) -> bool {
        self.0.can_convert(token)
    }

    fn to_text(&self, value: &Obj) -> Result<String, ConversionError> {
        self.0.to_text(value)
    }

    fn from_text(&self, text: &str) -> Result<Obj, ConversionError> {
        self.0.from_text(text)
    }
}

impl<S: ScalarConverter> Converter for ScalarAdapter<S> {
    fn can_convert(&self, token: &TypeToken) -> bool {
        self.0.can_convert(token)
    }

    fn marshal(&self, value: &Obj, ctx: &mut MarshalContext<'_>) -> Result<()> {
        let text = self.0.to_text(value)?;
        ctx.writer().set_value(&text);
        Ok(())
    }

    fn unmarshal(&self, ctx: &mut UnmarshalContext<'_>) -> Result<Obj> {
        let obj = self.0.from_text(ctx.reader().value())?;
        Ok(obj)
    }
}

// -----------------------------------------------------------------------------
// Tests
