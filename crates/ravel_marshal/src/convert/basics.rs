//! The stock scalar converters for primitive types.

use alloc::format;
use alloc::string::{String, ToString};
use core::any::Any;
use core::fmt::Display;
use core::marker::PhantomData;
use core::str::FromStr;

use crate::convert::registry::PRIORITY_LOW;
use crate::convert::{ConverterRegistry, NamedConverter, ScalarConverter};
use crate::error::ConversionError;
use crate::mapper::TypeToken;
use crate::object::{Obj, obj};

// -----------------------------------------------------------------------------
// PrimitiveScalar

/// A scalar converter for any type with `Display`/`FromStr` text forms.
pub struct PrimitiveScalar<T>(PhantomData<fn() -> T>);

impl<T> PrimitiveScalar<T> {
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for PrimitiveScalar<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ScalarConverter for PrimitiveScalar<T>
where
    T: Any + Display + FromStr,
    T::Err: Display,
{
    fn can_convert(&self, token: &TypeToken) -> bool {
        token.is::<T>()
    }

    fn to_text(&self, value: &Obj) -> Result<String, ConversionError> {
        let value = value.downcast_ref::<T>().ok_or_else(|| {
            ConversionError::new(format!(
                "value is not a `{}`",
                core::any::type_name::<T>()
            ))
        })?;
        Ok(value.to_string())
    }

    fn from_text(&self, text: &str) -> Result<Obj, ConversionError> {
        match text.parse::<T>() {
            Ok(parsed) => Ok(obj(parsed)),
            Err(error) => Err(ConversionError::new(format!(
                "cannot parse `{text}` as `{}`",
                core::any::type_name::<T>()
            ))
            .with("parse-error", error.to_string())),
        }
    }
}

// -----------------------------------------------------------------------------
// register_basics

fn register_scalar<T>(registry: &mut ConverterRegistry)
where
    T: Any + Display + FromStr,
    T::Err: Display,
{
    registry.register(
        PRIORITY_LOW,
        NamedConverter::of_scalar(PrimitiveScalar::<T>::new()),
    );
}

/// Registers the primitive scalar converters at low priority so any
/// user-registered converter shadows them.
pub fn register_basics(registry: &mut ConverterRegistry) {
    register_scalar::<bool>(registry);
    register_scalar::<char>(registry);
    register_scalar::<u8>(registry);
    register_scalar::<u16>(registry);
    register_scalar::<u32>(registry);
    register_scalar::<u64>(registry);
    register_scalar::<u128>(registry);
    register_scalar::<usize>(registry);
    register_scalar::<i8>(registry);
    register_scalar::<i16>(registry);
    register_scalar::<i32>(registry);
    register_scalar::<i64>(registry);
    register_scalar::<i128>(registry);
    register_scalar::<isize>(registry);
    register_scalar::<f32>(registry);
    register_scalar::<f64>(registry);
    register_scalar::<String>(registry);
}

// -----------------------------------------------------------------------------
// Tests
