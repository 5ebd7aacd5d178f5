//! Priority-ordered converter lookup.

use alloc::vec::Vec;

use crate::convert::NamedConverter;
use crate::error::ConversionError;
use crate::mapper::TypeToken;

// -----------------------------------------------------------------------------
// Priorities

/// Fallback converters consulted after everything else.
pub const PRIORITY_VERY_LOW: i32 = -20;
/// Broadly applicable converters that specific ones should shadow.
pub const PRIORITY_LOW: i32 = -10;
/// The default priority.
pub const PRIORITY_NORMAL: i32 = 0;
/// User overrides of built-in converters.
pub const PRIORITY_VERY_HIGH: i32 = 10000;

// -----------------------------------------------------------------------------
// ConverterRegistry

/// Converters ordered by descending priority; within one priority the
/// most recently registered wins.
///
/// Lookup is a linear scan asking each converter
/// [`can_convert`](crate::convert::Converter::can_convert) in order. The
/// registry is filled during configuration and only read afterwards, so
/// no per-lookup cache is kept.
pub struct ConverterRegistry {
    entries: Vec<(i32, NamedConverter)>,
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registers `converter` at `priority`.
    pub fn register(&mut self, priority: i32, converter: NamedConverter) {
        log::trace!(
            "registering converter `{}` at priority {priority}",
            converter.name()
        );
        let at = self
            .entries
            .iter()
            .position(|(existing, _)| *existing <= priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(at, (priority, converter));
    }

    /// The highest-priority converter claiming `token`'s type.
    pub fn lookup(&self, token: &TypeToken) -> Result<&NamedConverter, ConversionError> {
        self.entries
            .iter()
            .map(|(_, converter)| converter)
            .find(|converter| converter.get().can_convert(token))
            .ok_or_else(|| {
                ConversionError::new(alloc::format!(
                    "no converter available for type `{}`",
                    token.path()
                ))
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::Converter;
    use crate::driver::{MarshalContext, UnmarshalContext};
    use crate::error::Result;
    use crate::object::Obj;

    struct Claims(bool);

    impl Converter for Claims {
        fn can_convert(&self, _: &TypeToken) -> bool {
            self.0
        }
        fn marshal(&self, _: &Obj, _: &mut MarshalContext<'_>) -> Result<()> {
            unreachable!()
        }
        fn unmarshal(&self, _: &mut UnmarshalContext<'_>) -> Result<Obj> {
            unreachable!()
        }
    }

    struct Loud(bool);

    impl Converter for Loud {
        fn can_convert(&self, _: &TypeToken) -> bool {
            self.0
        }
        fn marshal(&self, _: &Obj, _: &mut MarshalContext<'_>) -> Result<()> {
            unreachable!()
        }
        fn unmarshal(&self, _: &mut UnmarshalContext<'_>) -> Result<Obj> {
            unreachable!()
        }
    }

    #[test]
    fn higher_priority_shadows_lower() {
        let mut registry = ConverterRegistry::new();
        registry.register(PRIORITY_LOW, NamedConverter::of(Claims(true)));
        registry.register(PRIORITY_NORMAL, NamedConverter::of(Loud(true)));

        let found = registry.lookup(&TypeToken::of::<u8>()).unwrap();
        assert!(found.name().ends_with("Loud"));
    }

    #[test]
    fn newest_wins_within_one_priority() {
        let mut registry = ConverterRegistry::new();
        registry.register(PRIORITY_NORMAL, NamedConverter::of(Claims(true)));
        registry.register(PRIORITY_NORMAL, NamedConverter::of(Loud(true)));

        let found = registry.lookup(&TypeToken::of::<u8>()).unwrap();
        assert!(found.name().ends_with("Loud"));
    }

    #[test]
    fn lookup_skips_converters_that_decline() {
        let mut registry = ConverterRegistry::new();
        registry.register(PRIORITY_VERY_HIGH, NamedConverter::of(Loud(false)));
        registry.register(PRIORITY_NORMAL, NamedConverter::of(Claims(true)));

        let found = registry.lookup(&TypeToken::of::<u8>()).unwrap();
        assert!(found.name().ends_with("Claims"));
    }

    #[test]
    fn missing_converter_names_the_type() {
        let registry = ConverterRegistry::new();
        let error = registry.lookup(&TypeToken::of::<u8>()).unwrap_err();
        assert!(error.message().contains("u8"));
    }
}
