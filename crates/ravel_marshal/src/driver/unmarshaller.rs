//! The read-side driver: rebuilds an object graph from tree nodes.

use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use ravel_tree::TreeReader;
use ravel_tree::path::{Path, PathTrackingReader};

use crate::convert::{ConverterRegistry, NamedConverter};
use crate::driver::DataHolder;
use crate::driver::marshaller::contextualize;
use crate::error::Result;
use crate::mapper::{MapperChain, TypeToken};
use crate::object::Obj;
use crate::refs::{ReadRefs, ReferenceMode};

// -----------------------------------------------------------------------------
// Unmarshaller

/// Drives one unmarshal call over a reader positioned at the document
/// root.
pub struct Unmarshaller<'a> {
    chain: &'a MapperChain,
    converters: &'a ConverterRegistry,
    mode: ReferenceMode,
}

impl<'a> Unmarshaller<'a> {
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

    /// Rebuilds the value the document describes.
    pub fn unmarshal(&self, reader: &mut dyn TreeReader) -> Result<Obj> {
        let mut data = DataHolder::new();
        self.unmarshal_with(reader, &mut data)
    }

    /// Like [`unmarshal`](Self::unmarshal), with caller-provided
    /// out-of-band state visible to every converter in the call.
    pub fn unmarshal_with(&self, reader: &mut dyn TreeReader, data: &mut DataHolder) -> Result<Obj> {
        let mut ctx = UnmarshalContext {
            chain: self.chain,
            converters: self.converters,
            reader: PathTrackingReader::new(reader),
            refs: ReadRefs::new(self.mode),
            data,
            callbacks: Vec::new(),
        };

        let root = ctx.convert_another(None)?;
        ctx.run_callbacks()?;
        Ok(root)
    }
}

// -----------------------------------------------------------------------------
// UnmarshalContext

type Callback = Box<dyn FnOnce() -> Result<()>>;

/// The state a converter sees while reading.
///
/// Child elements must go through
/// [`convert_another`](Self::convert_another) (or
/// [`read_item`](Self::read_item)) so reference markers, pending parent
/// registration, and error context are applied to every element once.
pub struct UnmarshalContext<'a> {
    chain: &'a MapperChain,
    converters: &'a ConverterRegistry,
    reader: PathTrackingReader<&'a mut dyn TreeReader>,
    refs: ReadRefs,
    data: &'a mut DataHolder,
    callbacks: Vec<(i32, Callback)>,
}

impl<'a> UnmarshalContext<'a> {
    /// The tree reader, positioned at the current element.
    pub fn reader(&self) -> &dyn TreeReader {
        &self.reader
    }

    /// Mutable reader access for converters that walk children manually.
    pub fn reader_mut(&mut self) -> &mut dyn TreeReader {
        &mut self.reader
    }

    /// The active naming configuration. The reference outlives `self`,
    /// so chain lookups can be held across reader moves.
    pub fn chain(&self) -> &'a MapperChain {
        self.chain
    }

    /// Out-of-band state shared across this call.
    pub fn data(&mut self) -> &mut DataHolder {
        self.data
    }

    /// The path of the element currently being read.
    pub fn current_path(&self) -> Path {
        self.reader.tracker().current_path()
    }

    /// Resolves a serialized field name against the owner type.
    pub fn real_field_name(&self, owner: &TypeToken, alias: &str) -> String {
        self.chain.real_field_name(owner, alias).into_owned()
    }

    /// Defers `callback` until the whole document has been read.
    ///
    /// Callbacks run highest priority first; within one priority, in
    /// registration order. This is how converters patch up values that
    /// could not be completed while their element was open.
    pub fn add_completion_callback(
        &mut self,
        priority: i32,
        callback: impl FnOnce() -> Result<()> + 'static,
    ) {
        self.callbacks.push((priority, Box::new(callback)));
    }

    /// Converts the current element, inferring its type from the element
    /// name. `parent` is the (possibly unfinished) value whose converter
    /// is asking.
    pub fn convert_another(&mut self, parent: Option<&Obj>) -> Result<Obj> {
        let name = self.reader.node_name().to_string();
        let token = self.chain.real_type_for(&name)?;
        self.convert(parent, token, None)
    }

    /// Converts the current element as a known type, ignoring the
    /// element name.
    pub fn convert_another_as(&mut self, parent: Option<&Obj>, token: TypeToken) -> Result<Obj> {
        self.convert(parent, token, None)
    }

    /// Converts the current element with a specific converter.
    pub fn convert_another_with(
        &mut self,
        parent: Option<&Obj>,
        token: TypeToken,
        converter: &NamedConverter,
    ) -> Result<Obj> {
        self.convert(parent, token, Some(converter))
    }

    /// Moves into the next child, converts it by element name, and moves
    /// back up.
    pub fn read_item(&mut self, parent: Option<&Obj>) -> Result<Obj> {
        self.reader.move_down();
        let result = self.convert_another(parent);
        self.reader.move_up();
        result
    }

    /// Like [`read_item`](Self::read_item) with a known item type.
    pub fn read_item_as(&mut self, parent: Option<&Obj>, token: TypeToken) -> Result<Obj> {
        self.reader.move_down();
        let result = self.convert_another_as(parent, token);
        self.reader.move_up();
        result
    }

    fn convert(
        &mut self,
        parent: Option<&Obj>,
        token: TypeToken,
        converter: Option<&NamedConverter>,
    ) -> Result<Obj> {
        if let Some(parent) = parent {
            self.refs.register_parent_if_pending(parent);
        }

        if let Some(marker) = self.reference_marker() {
            return Ok(self.refs.resolve(&marker, &self.current_path())?);
        }

        let id_attr = self
            .chain
            .system_attribute("id")
            .and_then(|name| self.reader.attribute(&name))
            .map(ToString::to_string);
        let key = self.refs.current_key(id_attr.as_deref(), &self.current_path())?;

        self.refs.push_parent(key.clone());
        let result = self.run_converter(&token, converter);
        self.refs.pop_parent();

        let value = result?;
        if let Some(key) = key {
            self.refs.record(key, &value);
        }
        Ok(value)
    }

    fn reference_marker(&self) -> Option<String> {
        let name = self.chain.system_attribute("reference")?;
        self.reader.attribute(&name).map(ToString::to_string)
    }

    fn run_converter(
        &mut self,
        token: &TypeToken,
        converter: Option<&NamedConverter>,
    ) -> Result<Obj> {
        let target = self.chain.default_implementation_of(token);
        let named = match converter {
            Some(named) => named.clone(),
            None => self.converters.lookup(&target)?.clone(),
        };
        named
            .get()
            .unmarshal(self)
            .map_err(|error| contextualize(error, &target, &named, &self.current_path()))
    }

    fn run_callbacks(&mut self) -> Result<()> {
        let mut callbacks = core::mem::take(&mut self.callbacks);
        // Stable sort keeps registration order within one priority.
        callbacks.sort_by_key(|(priority, _)| core::cmp::Reverse(*priority));
        for (_, callback) in callbacks {
            callback()?;
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::register_basics;
    use crate::mapper::{AliasingPolicy, ImmutablePolicy, TypePathPolicy, TypeRegistry};
    use ravel_tree::{TreeNode, TreeNodeReader};

    fn scalar_setup() -> (MapperChain, ConverterRegistry) {
        let mut chain = MapperChain::new();
        chain.push(ImmutablePolicy::with_primitives());
        chain.push(TypePathPolicy::new(TypeRegistry::new()));
        let mut converters = ConverterRegistry::new();
        register_basics(&mut converters);
        (chain, converters)
    }

    #[test]
    fn scalar_document_rebuilds_the_value() {
        let (chain, converters) = scalar_setup();
        let unmarshaller = Unmarshaller::new(&chain, &converters, ReferenceMode::PathRelative);

        let mut node = TreeNode::new("i32");
        node.value = "7".into();
        let mut reader = TreeNodeReader::new(&node);

        let value = unmarshaller.unmarshal(&mut reader).unwrap();
        assert_eq!(value.downcast_ref::<i32>(), Some(&7));
    }

    #[test]
    fn aliased_root_name_resolves_through_the_chain() {
        let (mut chain, converters) = scalar_setup();
        let mut aliasing = AliasingPolicy::new();
        aliasing.alias("quantity", TypeToken::of::<u32>());
        chain.push(aliasing);
        let unmarshaller = Unmarshaller::new(&chain, &converters, ReferenceMode::PathRelative);

        let mut node = TreeNode::new("quantity");
        node.value = "12".into();
        let mut reader = TreeNodeReader::new(&node);

        let value = unmarshaller.unmarshal(&mut reader).unwrap();
        assert_eq!(value.downcast_ref::<u32>(), Some(&12));
    }

    #[test]
    fn unknown_root_name_is_a_type_resolution_error() {
        let (chain, converters) = scalar_setup();
        let unmarshaller = Unmarshaller::new(&chain, &converters, ReferenceMode::PathRelative);

        let node = TreeNode::new("nonsense");
        let mut reader = TreeNodeReader::new(&node);
        let error = unmarshaller.unmarshal(&mut reader).unwrap_err();
        assert!(matches!(error, crate::error::Error::TypeResolution(_)));
    }

    #[test]
    fn malformed_value_reports_converter_and_path() {
        let (chain, converters) = scalar_setup();
        let unmarshaller = Unmarshaller::new(&chain, &converters, ReferenceMode::PathRelative);

        let mut node = TreeNode::new("u8");
        node.value = "many".into();
        let mut reader = TreeNodeReader::new(&node);

        let error = unmarshaller.unmarshal(&mut reader).unwrap_err();
        let conversion = error.as_conversion().unwrap();
        assert_eq!(conversion.detail("item-type"), Some("u8"));
        assert_eq!(conversion.detail("path"), Some("/u8"));
        assert!(conversion.detail("converter").is_some());
    }
}
