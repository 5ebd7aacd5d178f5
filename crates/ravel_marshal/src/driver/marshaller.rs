//! The write-side driver: walks an object graph and emits tree nodes.

use alloc::format;
use alloc::string::ToString;

use ravel_tree::TreeWriter;
use ravel_tree::path::{Path, PathTrackingWriter};

use crate::convert::{ConverterRegistry, NamedConverter};
use crate::driver::DataHolder;
use crate::error::{ConversionError, Error, Result, StructuralError};
use crate::mapper::{MapperChain, TypeToken};
use crate::object::{IdentityMap, Obj, obj_type_id};
use crate::refs::{Decision, ReferenceMode, WriteRefs};

// -----------------------------------------------------------------------------
// Marshaller

/// Drives one marshal call: a finished configuration plus a reference
/// strategy, borrowed for the duration of the call.
pub struct Marshaller<'a> {
    chain: &'a MapperChain,
    converters: &'a ConverterRegistry,
    mode: ReferenceMode,
}

impl<'a> Marshaller<'a> {
    pub fn new(
        chain: &'a MapperChain,
        converters: &'a ConverterRegistry,
        mode: ReferenceMode,
    ) -> Self {
        Self {
            chain,
            converters,
            mode,
        }
    }

    /// Writes `value` as a complete document into `writer`.
    pub fn marshal(&self, value: &Obj, writer: &mut dyn TreeWriter) -> Result<()> {
        let mut data = DataHolder::new();
        self.marshal_with(value, writer, &mut data)
    }

    /// Like [`marshal`](Self::marshal), with caller-provided out-of-band
    /// state visible to every converter in the call.
    ///
    /// On failure every node the traversal had opened is closed before
    /// the error returns, so the underlying stream stays balanced.
    pub fn marshal_with(
        &self,
        value: &Obj,
        writer: &mut dyn TreeWriter,
        data: &mut DataHolder,
    ) -> Result<()> {
        let mut ctx = MarshalContext {
            chain: self.chain,
            converters: self.converters,
            writer: PathTrackingWriter::new(writer),
            refs: WriteRefs::new(self.mode),
            in_progress: IdentityMap::new(),
            data,
        };

        let result = ctx.write_item(value);
        if result.is_err() {
            ctx.writer.unwind_to(0);
        }
        result
    }
}

// -----------------------------------------------------------------------------
// MarshalContext

/// The state a converter sees while writing.
///
/// Child values must go through [`convert_another`](Self::convert_another)
/// (or the [`write_item`](Self::write_item)/[`write_field`](Self::write_field)
/// conveniences) rather than a converter directly, so reference tracking
/// and error context see every value once.
pub struct MarshalContext<'a> {
    chain: &'a MapperChain,
    converters: &'a ConverterRegistry,
    writer: PathTrackingWriter<&'a mut dyn TreeWriter>,
    refs: WriteRefs,
    in_progress: IdentityMap<()>,
    data: &'a mut DataHolder,
}

impl<'a> MarshalContext<'a> {
    /// The tree writer, positioned inside the current value's node.
    pub fn writer(&mut self) -> &mut dyn TreeWriter {
        &mut self.writer
    }

    /// The active naming configuration. The reference outlives `self`,
    /// so chain lookups can be held across writer calls.
    pub fn chain(&self) -> &'a MapperChain {
        self.chain
    }

    /// Out-of-band state shared across this call.
    pub fn data(&mut self) -> &mut DataHolder {
        self.data
    }

    /// The path of the node currently being written.
    pub fn current_path(&self) -> Path {
        self.writer.tracker().current_path()
    }

    /// Converts `value` into the current (already started) node.
    pub fn convert_another(&mut self, value: &Obj) -> Result<()> {
        self.convert(value, None)
    }

    /// Like [`convert_another`](Self::convert_another), forcing a
    /// specific converter instead of registry lookup.
    pub fn convert_another_with(&mut self, value: &Obj, converter: &NamedConverter) -> Result<()> {
        self.convert(value, Some(converter))
    }

    /// Writes `value` as a child element named after its type.
    pub fn write_item(&mut self, value: &Obj) -> Result<()> {
        let token = self.token_of(value)?;
        let name = self
            .chain
            .serialized_name_for(&self.chain.serialized_type(&token));
        self.writer.start_node(&name);
        self.convert(value, None)?;
        self.writer.end_node();
        Ok(())
    }

    /// Writes one field of `owner`, honoring omission, aliasing,
    /// attribute form, and field-bound converters.
    pub fn write_field(&mut self, owner: &TypeToken, field: &str, value: &Obj) -> Result<()> {
        if !self.chain.should_serialize_field(owner, field) {
            return Ok(());
        }
        let name = self.chain.serialized_field_name(owner, field);
        let bound = self.chain.converter_for_field(owner, field);

        if self.chain.write_as_attribute(owner, field) {
            return self.write_attribute_field(owner, field, &name, value, bound);
        }

        self.writer.start_node(&name);
        self.convert(value, bound.as_ref())?;
        self.writer.end_node();
        Ok(())
    }

    fn write_attribute_field(
        &mut self,
        owner: &TypeToken,
        field: &str,
        name: &str,
        value: &Obj,
        bound: Option<NamedConverter>,
    ) -> Result<()> {
        let named = match bound {
            Some(named) => named,
            None => self.converters.lookup(&self.token_of(value)?)?.clone(),
        };
        let scalar = named.as_scalar().ok_or_else(|| {
            ConversionError::new(format!(
                "field `{field}` of `{}` cannot take attribute form",
                owner.path()
            ))
            .with("converter", named.name())
        })?;
        let text = scalar.to_text(value)?;
        self.writer.add_attribute(name, &text);
        Ok(())
    }

    fn token_of(&self, value: &Obj) -> Result<TypeToken> {
        self.chain.token_for(obj_type_id(value)).ok_or_else(|| {
            ConversionError::new("the value's type has not been registered").into()
        })
    }

    fn convert(&mut self, value: &Obj, converter: Option<&NamedConverter>) -> Result<()> {
        let token = self.token_of(value)?;

        if self.chain.is_immutable(&token) {
            return self.run_converter(value, &token, converter);
        }

        if self.refs.mode() == ReferenceMode::Off {
            if self.in_progress.contains(value) {
                return Err(StructuralError::CircularReference {
                    type_path: token.path().into(),
                }
                .into());
            }
            self.in_progress.insert(value, ());
            let result = self.run_converter(value, &token, converter);
            self.in_progress.remove(value);
            return result;
        }

        match self.refs.decide(value, &self.current_path()) {
            Decision::New(id) => {
                if let Some(id) = id {
                    // A suppressed id attribute drops silently; the value
                    // is then simply not referenceable.
                    if let Some(attr) = self.chain.system_attribute("id") {
                        self.writer.add_attribute(&attr, &id.to_string());
                    }
                }
                self.run_converter(value, &token, converter)
            }
            Decision::Inline => self.run_converter(value, &token, converter),
            Decision::Seen(marker) => match self.chain.system_attribute("reference") {
                Some(attr) => {
                    self.writer.add_attribute(&attr, &marker);
                    Ok(())
                }
                None => Err(StructuralError::ReferencedImplicitElement {
                    path: self.current_path().render(),
                }
                .into()),
            },
        }
    }

    fn run_converter(
        &mut self,
        value: &Obj,
        token: &TypeToken,
        converter: Option<&NamedConverter>,
    ) -> Result<()> {
        let named = match converter {
            Some(named) => named.clone(),
            None => self.converters.lookup(token)?.clone(),
        };
        named
            .get()
            .marshal(value, self)
            .map_err(|error| contextualize(error, token, &named, &self.current_path()))
    }
}

/// Attaches the standard diagnostics to an escaping conversion failure.
/// Keys already present were written by a deeper frame and stay as they
/// are.
///
/// Structural and reference failures keep their own variant no matter how
/// deep they were raised, so callers can still match on them.
pub(crate) fn contextualize(
    error: Error,
    token: &TypeToken,
    converter: &NamedConverter,
    path: &Path,
) -> Error {
    let mut conversion = match error {
        Error::Conversion(conversion) => conversion,
        passthrough @ (Error::Structural(_) | Error::InvalidReference(_)) => return passthrough,
        other => ConversionError::wrap("conversion failed", other),
    };
    conversion.add("item-type", token.path());
    conversion.add("converter", converter.name());
    conversion.add("path", path.render());
    Error::Conversion(conversion)
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::register_basics;
    use crate::mapper::{ImmutablePolicy, TypePathPolicy, TypeRegistry};
    use crate::object::obj;
    use alloc::string::String;
    use ravel_tree::TreeNodeWriter;

    fn scalar_setup() -> (MapperChain, ConverterRegistry) {
        let mut chain = MapperChain::new();
        chain.push(ImmutablePolicy::with_primitives());
        chain.push(TypePathPolicy::new(TypeRegistry::new()));
        let mut converters = ConverterRegistry::new();
        register_basics(&mut converters);
        (chain, converters)
    }

    #[test]
    fn scalar_root_becomes_a_named_node_with_text() {
        let (chain, converters) = scalar_setup();
        let marshaller = Marshaller::new(&chain, &converters, ReferenceMode::PathRelative);

        let mut writer = TreeNodeWriter::new();
        marshaller.marshal(&obj(7_i32), &mut writer).unwrap();

        let tree = writer.into_tree();
        assert_eq!(tree.name, "i32");
        assert_eq!(tree.value, "7");
        assert!(tree.children.is_empty());
    }

    #[test]
    fn unregistered_type_fails_without_leaving_nodes_open() {
        struct Opaque;
        let (chain, converters) = scalar_setup();
        let marshaller = Marshaller::new(&chain, &converters, ReferenceMode::PathRelative);

        let mut writer = TreeNodeWriter::new();
        let error = marshaller.marshal(&obj(Opaque), &mut writer).unwrap_err();
        assert!(error.as_conversion().is_some());
    }

    #[test]
    fn diagnostics_keep_the_deepest_frame() {
        let (_chain, converters) = scalar_setup();
        let named = converters.lookup(&TypeToken::of::<u8>()).unwrap();
        let inner = ConversionError::new("boom").with("path", "/deep");

        let error = contextualize(
            inner.into(),
            &TypeToken::of::<u8>(),
            named,
            &Path::parse("/outer").unwrap(),
        );
        let conversion = error.as_conversion().unwrap();
        assert_eq!(conversion.detail("path"), Some("/deep"));
        assert_eq!(conversion.detail("item-type"), Some("u8"));
    }

    #[test]
    fn structural_failures_keep_their_variant_through_nesting() {
        let (_chain, converters) = scalar_setup();
        let named = converters.lookup(&TypeToken::of::<u8>()).unwrap();

        let inner: Error = StructuralError::CircularReference {
            type_path: "graph::Node".into(),
        }
        .into();
        let error = contextualize(
            inner,
            &TypeToken::of::<u8>(),
            named,
            &Path::parse("/outer").unwrap(),
        );
        assert!(matches!(
            error,
            Error::Structural(StructuralError::CircularReference { .. })
        ));
    }

    #[test]
    fn immutable_values_are_never_tracked() {
        let (chain, converters) = scalar_setup();

        // The same string object twice; immutables must not produce ids
        // or reference markers even under the id strategy.
        let shared = obj(String::from("x"));
        let mut writer = TreeNodeWriter::new();
        let mut data = DataHolder::new();
        let mut ctx = MarshalContext {
            chain: &chain,
            converters: &converters,
            writer: PathTrackingWriter::new(&mut writer as &mut dyn TreeWriter),
            refs: WriteRefs::new(ReferenceMode::Id),
            in_progress: IdentityMap::new(),
            data: &mut data,
        };
        ctx.writer().start_node("pair");
        ctx.write_item(&shared).unwrap();
        ctx.write_item(&shared).unwrap();
        ctx.writer().end_node();
        drop(ctx);

        let tree = writer.into_tree();
        assert_eq!(tree.children.len(), 2);
        for child in &tree.children {
            assert_eq!(child.value, "x");
            assert!(child.attributes.is_empty());
        }
    }
}
