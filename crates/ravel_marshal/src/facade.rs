//! The configuration facade tying the chain, the converter registry,
//! and a reference strategy into one value.

use core::any::Any;

use ravel_tree::{TreeNode, TreeNodeReader, TreeNodeWriter, TreeReader, TreeWriter};

use crate::convert::{
    Converter, ConverterRegistry, NamedConverter, PRIORITY_NORMAL, ScalarConverter,
    register_basics,
};
use crate::driver::{DataHolder, Marshaller, Unmarshaller};
use crate::error::{InitializationError, Result};
use crate::mapper::{
    AliasingPolicy, DefaultImplementationPolicy, FieldPolicy, ImmutablePolicy,
    ImplicitCollectionPolicy, MapperChain, SystemAttributePolicy, TypePathPolicy, TypeRegistry,
    TypeToken,
};
use crate::object::Obj;
use crate::refs::ReferenceMode;

// -----------------------------------------------------------------------------
// Ravel

/// A configurable marshalling engine.
///
/// A fresh instance knows the primitive types and marshals anything its
/// converters cover; everything else is taught through the configuration
/// methods. Configure first, then marshal: the engine is immutable
/// during a call, and a fully configured instance can serve any number
/// of calls (concurrently, once shared behind `&self`).
///
/// # Examples
///
/// ```
/// use ravel_marshal::{Ravel, object::obj};
///
/// let ravel = Ravel::new();
/// let tree = ravel.to_tree(&obj(42_u32)).unwrap();
/// assert_eq!(tree.name, "u32");
/// assert_eq!(tree.value, "42");
///
/// let back = ravel.from_tree(&tree).unwrap();
/// assert_eq!(back.downcast_ref::<u32>(), Some(&42));
/// ```
pub struct Ravel {
    chain: MapperChain,
    converters: ConverterRegistry,
    mode: ReferenceMode,
}

impl Default for Ravel {
    fn default() -> Self {
        Self::new()
    }
}

impl Ravel {
    /// An engine with the default policy chain and the primitive scalar
    /// converters.
    pub fn new() -> Self {
        let mut chain = MapperChain::new();
        chain.push(SystemAttributePolicy::new());
        chain.push(AliasingPolicy::new());
        chain.push(FieldPolicy::new());
        chain.push(ImplicitCollectionPolicy::new());
        chain.push(DefaultImplementationPolicy::new());
        chain.push(ImmutablePolicy::with_primitives());
        chain.push(TypePathPolicy::new(TypeRegistry::new()));

        let mut converters = ConverterRegistry::new();
        register_basics(&mut converters);

        Self {
            chain,
            converters,
            mode: ReferenceMode::default(),
        }
    }

    /// An engine over a caller-assembled chain. No policies and no
    /// converters are added; the caller owns the whole configuration.
    pub fn with_chain(chain: MapperChain) -> Self {
        Self {
            chain,
            converters: ConverterRegistry::new(),
            mode: ReferenceMode::default(),
        }
    }

    // ---- configuration ----

    /// Registers `T` so its type path (and unambiguous short name)
    /// resolve to it.
    pub fn register_type<T: Any>(&mut self) -> Result<TypeToken, InitializationError> {
        let policy = self
            .chain
            .expect_policy_mut::<TypePathPolicy>("register_type")?;
        Ok(policy.register::<T>())
    }

    /// Registers `T` under a serialized name of its own.
    pub fn alias<T: Any>(
        &mut self,
        name: &'static str,
    ) -> Result<TypeToken, InitializationError> {
        let token = self.register_type::<T>()?;
        log::debug!("aliasing `{}` as `{name}`", token.path());
        let policy = self.chain.expect_policy_mut::<AliasingPolicy>("alias")?;
        policy.alias(name, token);
        Ok(token)
    }

    /// Renames one field of `owner` in serialized form.
    pub fn alias_field(
        &mut self,
        owner: TypeToken,
        field: &'static str,
        alias: &'static str,
    ) -> Result<(), InitializationError> {
        let policy = self
            .chain
            .expect_policy_mut::<AliasingPolicy>("alias_field")?;
        policy.alias_field(owner, field, alias);
        Ok(())
    }

    /// Registers a converter at normal priority.
    pub fn register_converter<C: Converter>(&mut self, converter: C) {
        self.converters
            .register(PRIORITY_NORMAL, NamedConverter::of(converter));
    }

    /// Registers a converter at an explicit priority.
    pub fn register_converter_with_priority<C: Converter>(&mut self, priority: i32, converter: C) {
        self.converters
            .register(priority, NamedConverter::of(converter));
    }

    /// Registers a scalar converter at normal priority. Types it claims
    /// also become eligible for attribute-form fields.
    pub fn register_scalar<S: ScalarConverter>(&mut self, converter: S) {
        self.converters
            .register(PRIORITY_NORMAL, NamedConverter::of_scalar(converter));
    }

    /// Exempts a type from reference tracking.
    pub fn add_immutable_type(&mut self, token: TypeToken) -> Result<(), InitializationError> {
        let policy = self
            .chain
            .expect_policy_mut::<ImmutablePolicy>("add_immutable_type")?;
        policy.add_token(token);
        Ok(())
    }

    /// Excludes a field from marshalling.
    pub fn omit_field(
        &mut self,
        owner: TypeToken,
        field: &'static str,
    ) -> Result<(), InitializationError> {
        let policy = self.chain.expect_policy_mut::<FieldPolicy>("omit_field")?;
        policy.omit(owner, field);
        Ok(())
    }

    /// Writes a field as an attribute of its owner's node.
    pub fn use_attribute_for(
        &mut self,
        owner: TypeToken,
        field: &'static str,
    ) -> Result<(), InitializationError> {
        let policy = self
            .chain
            .expect_policy_mut::<FieldPolicy>("use_attribute_for")?;
        policy.use_attribute(owner, field);
        Ok(())
    }

    /// Binds a converter to one specific field of `owner`.
    pub fn field_converter<C: Converter>(
        &mut self,
        owner: TypeToken,
        field: &'static str,
        converter: C,
    ) -> Result<(), InitializationError> {
        let policy = self
            .chain
            .expect_policy_mut::<FieldPolicy>("field_converter")?;
        policy.bind_converter(owner, field, NamedConverter::of(converter));
        Ok(())
    }

    /// Declares that a field's items are written directly into the
    /// owner's node, each under `item_name`.
    pub fn add_implicit_collection(
        &mut self,
        owner: TypeToken,
        field: &'static str,
        item_name: &'static str,
        item_type: Option<TypeToken>,
    ) -> Result<(), InitializationError> {
        let policy = self
            .chain
            .expect_policy_mut::<ImplicitCollectionPolicy>("add_implicit_collection")?;
        policy.add(owner, field, item_name, item_type);
        Ok(())
    }

    /// Renames a system attribute (`id` or `reference`).
    pub fn alias_system_attribute(
        &mut self,
        attribute: &'static str,
        alias: &'static str,
    ) -> Result<(), InitializationError> {
        log::debug!("renaming system attribute `{attribute}` to `{alias}`");
        let policy = self
            .chain
            .expect_policy_mut::<SystemAttributePolicy>("alias_system_attribute")?;
        policy.rename(attribute, alias);
        Ok(())
    }

    /// Suppresses a system attribute entirely. Suppressing `reference`
    /// makes any repeated occurrence of a value a structural error.
    pub fn suppress_system_attribute(
        &mut self,
        attribute: &'static str,
    ) -> Result<(), InitializationError> {
        log::debug!("suppressing system attribute `{attribute}`");
        let policy = self
            .chain
            .expect_policy_mut::<SystemAttributePolicy>("suppress_system_attribute")?;
        policy.suppress(attribute);
        Ok(())
    }

    /// Substitutes `implementation` wherever `abstract_type` is named,
    /// in both directions.
    pub fn default_implementation(
        &mut self,
        abstract_type: TypeToken,
        implementation: TypeToken,
    ) -> Result<(), InitializationError> {
        let policy = self
            .chain
            .expect_policy_mut::<DefaultImplementationPolicy>("default_implementation")?;
        policy.register(abstract_type, implementation);
        Ok(())
    }

    /// Selects the reference strategy for subsequent calls.
    pub fn set_reference_mode(&mut self, mode: ReferenceMode) {
        log::debug!("reference mode set to {mode:?}");
        self.mode = mode;
    }

    /// The active chain, for policies configured directly.
    pub fn chain_mut(&mut self) -> &mut MapperChain {
        &mut self.chain
    }

    // ---- marshalling ----

    /// Writes `value` as a complete document into `writer`.
    pub fn marshal(&self, value: &Obj, writer: &mut dyn TreeWriter) -> Result<()> {
        Marshaller::new(&self.chain, &self.converters, self.mode).marshal(value, writer)
    }

    /// Writes `value` with caller-provided out-of-band state.
    pub fn marshal_with(
        &self,
        value: &Obj,
        writer: &mut dyn TreeWriter,
        data: &mut DataHolder,
    ) -> Result<()> {
        Marshaller::new(&self.chain, &self.converters, self.mode).marshal_with(value, writer, data)
    }

    /// Rebuilds the value a document describes.
    pub fn unmarshal(&self, reader: &mut dyn TreeReader) -> Result<Obj> {
        Unmarshaller::new(&self.chain, &self.converters, self.mode).unmarshal(reader)
    }

    /// Rebuilds a value with caller-provided out-of-band state.
    pub fn unmarshal_with(
        &self,
        reader: &mut dyn TreeReader,
        data: &mut DataHolder,
    ) -> Result<Obj> {
        Unmarshaller::new(&self.chain, &self.converters, self.mode).unmarshal_with(reader, data)
    }

    /// Marshals `value` into an in-memory [`TreeNode`].
    pub fn to_tree(&self, value: &Obj) -> Result<TreeNode> {
        let mut writer = TreeNodeWriter::new();
        self.marshal(value, &mut writer)?;
        Ok(writer.into_tree())
    }

    /// Unmarshals a value from an in-memory [`TreeNode`].
    pub fn from_tree(&self, tree: &TreeNode) -> Result<Obj> {
        let mut reader = TreeNodeReader::new(tree);
        self.unmarshal(&mut reader)
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MarshalContext, UnmarshalContext};
    use crate::error::{Error, StructuralError};
    use crate::object::{obj, same_obj};
    use alloc::rc::Rc;
    use alloc::string::{String, ToString};
    use alloc::vec::Vec;
    use core::cell::RefCell;
    use std::sync::{Arc, Mutex};

    #[test]
    fn fresh_engine_round_trips_primitives() {
        let ravel = Ravel::new();
        let tree = ravel.to_tree(&obj(String::from("hello"))).unwrap();
        assert_eq!(tree.name, "alloc::string::String");

        let back = ravel.from_tree(&tree).unwrap();
        assert_eq!(back.downcast_ref::<String>().map(String::as_str), Some("hello"));
    }

    #[test]
    fn aliases_rename_the_root_element() {
        let mut ravel = Ravel::new();
        ravel.alias::<u16>("port").unwrap();

        let tree = ravel.to_tree(&obj(8080_u16)).unwrap();
        assert_eq!(tree.name, "port");
        let back = ravel.from_tree(&tree).unwrap();
        assert_eq!(back.downcast_ref::<u16>(), Some(&8080));
    }

    #[test]
    fn bare_chain_rejects_configuration_it_cannot_hold() {
        let mut ravel = Ravel::with_chain(MapperChain::new());
        let error = ravel.alias::<u16>("port").unwrap_err();
        assert_eq!(error.operation, "register_type");
    }

    // ---- a small graph domain: linked nodes and a two-slot pair ----

    #[derive(Default)]
    struct Node {
        label: String,
        next: Option<Obj>,
    }

    type NodeCell = RefCell<Node>;

    fn node(label: &str) -> Obj {
        obj(RefCell::new(Node {
            label: label.to_string(),
            next: None,
        }))
    }

    fn node_cell(value: &Obj) -> &NodeCell {
        value.downcast_ref::<NodeCell>().unwrap()
    }

    struct NodeConverter;

    impl Converter for NodeConverter {
        fn can_convert(&self, token: &TypeToken) -> bool {
            token.is::<NodeCell>()
        }

        fn marshal(&self, value: &Obj, ctx: &mut MarshalContext<'_>) -> Result<()> {
            let token = TypeToken::of::<NodeCell>();
            let borrowed = node_cell(value).borrow();
            ctx.write_field(&token, "label", &obj(borrowed.label.clone()))?;
            if let Some(next) = &borrowed.next {
                ctx.write_field(&token, "next", next)?;
            }
            Ok(())
        }

        fn unmarshal(&self, ctx: &mut UnmarshalContext<'_>) -> Result<Obj> {
            let token = TypeToken::of::<NodeCell>();
            let result: Obj = Rc::new(RefCell::new(Node::default()));

            let label_attr = ctx.chain().serialized_field_name(&token, "label");
            if let Some(text) = ctx.reader().attribute(&label_attr) {
                node_cell(&result).borrow_mut().label = text.to_string();
            }

            while ctx.reader().has_more_children() {
                ctx.reader_mut().move_down();
                let element = ctx.reader().node_name().to_string();
                let outcome = match ctx.real_field_name(&token, &element).as_str() {
                    "label" => {
                        node_cell(&result).borrow_mut().label =
                            ctx.reader().value().to_string();
                        Ok(())
                    }
                    "next" => ctx.convert_another_as(Some(&result), token).map(|next| {
                        node_cell(&result).borrow_mut().next = Some(next);
                    }),
                    _ => Ok(()),
                };
                ctx.reader_mut().move_up();
                outcome?;
            }
            Ok(result)
        }
    }

    struct Pair {
        left: Obj,
        right: Obj,
    }

    struct PairConverter;

    impl Converter for PairConverter {
        fn can_convert(&self, token: &TypeToken) -> bool {
            token.is::<Pair>()
        }

        fn marshal(&self, value: &Obj, ctx: &mut MarshalContext<'_>) -> Result<()> {
            let token = TypeToken::of::<Pair>();
            let pair = value.downcast_ref::<Pair>().unwrap();
            ctx.write_field(&token, "left", &pair.left)?;
            ctx.write_field(&token, "right", &pair.right)
        }

        fn unmarshal(&self, ctx: &mut UnmarshalContext<'_>) -> Result<Obj> {
            let node_token = TypeToken::of::<NodeCell>();
            let mut slots: Vec<Obj> = Vec::new();
            while ctx.reader().has_more_children() {
                ctx.reader_mut().move_down();
                let outcome = ctx.convert_another_as(None, node_token);
                ctx.reader_mut().move_up();
                slots.push(outcome?);
            }
            let mut slots = slots.into_iter();
            let (left, right) = (slots.next().unwrap(), slots.next().unwrap());
            Ok(obj(Pair { left, right }))
        }
    }

    fn graph_engine(mode: ReferenceMode) -> Ravel {
        let mut ravel = Ravel::new();
        ravel.alias::<NodeCell>("node").unwrap();
        ravel.alias::<Pair>("pair").unwrap();
        ravel.register_converter(NodeConverter);
        ravel.register_converter(PairConverter);
        ravel.set_reference_mode(mode);
        ravel
    }

    fn shared_pair() -> Obj {
        let shared = node("shared");
        obj(Pair {
            left: shared.clone(),
            right: shared,
        })
    }

    // ---- reference strategies ----

    #[test]
    fn id_strategy_marks_the_first_occurrence_and_points_back() {
        let ravel = graph_engine(ReferenceMode::Id);
        let tree = ravel.to_tree(&shared_pair()).unwrap();

        // The pair itself is tracked too, so the shared node is id 2.
        assert_eq!(tree.attribute("id"), Some("1"));
        let left = &tree.children[0];
        let right = &tree.children[1];
        assert_eq!(left.name, "left");
        assert_eq!(left.attribute("id"), Some("2"));
        assert_eq!(right.attribute("reference"), Some("2"));
        // A back-reference has no content of its own.
        assert!(right.children.is_empty());
        assert!(right.value.is_empty());
    }

    #[test]
    fn relative_path_strategy_points_through_the_common_ancestor() {
        let ravel = graph_engine(ReferenceMode::PathRelative);
        let tree = ravel.to_tree(&shared_pair()).unwrap();

        assert!(tree.attribute("id").is_none());
        assert_eq!(tree.children[1].attribute("reference"), Some("../left"));
    }

    #[test]
    fn absolute_path_strategy_points_from_the_root() {
        let ravel = graph_engine(ReferenceMode::PathAbsolute);
        let tree = ravel.to_tree(&shared_pair()).unwrap();
        assert_eq!(tree.children[1].attribute("reference"), Some("/pair/left"));
    }

    #[test]
    fn single_node_markers_index_every_step() {
        let ravel = graph_engine(ReferenceMode::PathAbsoluteSingleNode);
        let tree = ravel.to_tree(&shared_pair()).unwrap();
        assert_eq!(
            tree.children[1].attribute("reference"),
            Some("/pair[1]/left[1]")
        );
    }

    #[test]
    fn shared_values_come_back_as_one_object() {
        for mode in [
            ReferenceMode::Id,
            ReferenceMode::PathRelative,
            ReferenceMode::PathAbsolute,
            ReferenceMode::PathRelativeSingleNode,
            ReferenceMode::PathAbsoluteSingleNode,
        ] {
            let ravel = graph_engine(mode);
            let tree = ravel.to_tree(&shared_pair()).unwrap();
            let back = ravel.from_tree(&tree).unwrap();
            let pair = back.downcast_ref::<Pair>().unwrap();
            assert!(same_obj(&pair.left, &pair.right), "mode {mode:?}");
        }
    }

    #[test]
    fn structurally_equal_siblings_are_not_references() {
        let ravel = graph_engine(ReferenceMode::PathRelative);
        let pair = obj(Pair {
            left: node("twin"),
            right: node("twin"),
        });
        let tree = ravel.to_tree(&pair).unwrap();
        assert!(tree.children[1].attribute("reference").is_none());

        let back = ravel.from_tree(&tree).unwrap();
        let pair = back.downcast_ref::<Pair>().unwrap();
        assert!(!same_obj(&pair.left, &pair.right));
    }

    // ---- cycles ----

    fn two_node_cycle() -> Obj {
        let a = node("a");
        let b = node("b");
        node_cell(&a).borrow_mut().next = Some(b.clone());
        node_cell(&b).borrow_mut().next = Some(a.clone());
        a
    }

    #[test]
    fn cycle_markers_point_at_the_open_ancestor() {
        let ravel = graph_engine(ReferenceMode::Id);
        let tree = ravel.to_tree(&two_node_cycle()).unwrap();

        assert_eq!(tree.attribute("id"), Some("1"));
        let b = &tree.children[1];
        assert_eq!(b.name, "next");
        assert_eq!(b.attribute("id"), Some("2"));
        assert_eq!(b.children[1].attribute("reference"), Some("1"));
    }

    #[test]
    fn cycles_round_trip_under_both_strategies() {
        for mode in [ReferenceMode::Id, ReferenceMode::PathRelative] {
            let ravel = graph_engine(mode);
            let tree = ravel.to_tree(&two_node_cycle()).unwrap();
            let a = ravel.from_tree(&tree).unwrap();

            let b = node_cell(&a).borrow().next.clone().unwrap();
            let back = node_cell(&b).borrow().next.clone().unwrap();
            assert!(same_obj(&a, &back), "mode {mode:?}");
            assert_eq!(node_cell(&b).borrow().label, "b");
        }
    }

    #[test]
    fn disabled_tracking_rejects_cycles() {
        let ravel = graph_engine(ReferenceMode::Off);
        let error = ravel.to_tree(&two_node_cycle()).unwrap_err();
        assert!(matches!(
            error,
            Error::Structural(StructuralError::CircularReference { .. })
        ));
    }

    #[test]
    fn disabled_tracking_duplicates_shared_values() {
        let ravel = graph_engine(ReferenceMode::Off);
        let tree = ravel.to_tree(&shared_pair()).unwrap();
        // Both slots carry a full copy.
        assert_eq!(tree.children[0].children.len(), 1);
        assert_eq!(tree.children[1].children.len(), 1);

        let back = ravel.from_tree(&tree).unwrap();
        let pair = back.downcast_ref::<Pair>().unwrap();
        assert!(!same_obj(&pair.left, &pair.right));
    }

    // ---- system attributes ----

    #[test]
    fn renamed_system_attributes_round_trip() {
        let mut ravel = graph_engine(ReferenceMode::Id);
        ravel.alias_system_attribute("id", "uid").unwrap();
        ravel.alias_system_attribute("reference", "ref").unwrap();

        let tree = ravel.to_tree(&shared_pair()).unwrap();
        assert_eq!(tree.children[0].attribute("uid"), Some("2"));
        assert_eq!(tree.children[1].attribute("ref"), Some("2"));
        assert!(tree.children[1].attribute("reference").is_none());

        let back = ravel.from_tree(&tree).unwrap();
        let pair = back.downcast_ref::<Pair>().unwrap();
        assert!(same_obj(&pair.left, &pair.right));
    }

    #[test]
    fn suppressed_reference_attribute_makes_sharing_structural() {
        let mut ravel = graph_engine(ReferenceMode::Id);
        ravel.suppress_system_attribute("reference").unwrap();

        let error = ravel.to_tree(&shared_pair()).unwrap_err();
        assert!(matches!(
            error,
            Error::Structural(StructuralError::ReferencedImplicitElement { .. })
        ));
    }

    #[test]
    fn suppressed_id_attribute_drops_silently() {
        let mut ravel = graph_engine(ReferenceMode::Id);
        ravel.suppress_system_attribute("id").unwrap();

        let pair = obj(Pair {
            left: node("a"),
            right: node("b"),
        });
        let tree = ravel.to_tree(&pair).unwrap();
        assert!(tree.attribute("id").is_none());
        assert!(tree.children[0].attribute("id").is_none());
    }

    #[test]
    fn unresolvable_marker_is_an_invalid_reference() {
        let ravel = graph_engine(ReferenceMode::Id);
        let mut tree = ravel.to_tree(&shared_pair()).unwrap();
        tree.children[1].attributes = alloc::vec![("reference".into(), "9".into())];

        let error = ravel.from_tree(&tree).unwrap_err();
        assert!(matches!(error, Error::InvalidReference(_)));
    }

    // ---- field policies ----

    #[test]
    fn attribute_form_fields_leave_the_children_to_structure() {
        let mut ravel = graph_engine(ReferenceMode::PathRelative);
        let token = TypeToken::of::<NodeCell>();
        ravel.use_attribute_for(token, "label").unwrap();

        let tree = ravel.to_tree(&node("tagged")).unwrap();
        assert_eq!(tree.attribute("label"), Some("tagged"));
        assert!(tree.children.is_empty());

        let back = ravel.from_tree(&tree).unwrap();
        assert_eq!(node_cell(&back).borrow().label, "tagged");
    }

    #[test]
    fn omitted_fields_never_reach_the_document() {
        let mut ravel = graph_engine(ReferenceMode::PathRelative);
        ravel.omit_field(TypeToken::of::<NodeCell>(), "label").unwrap();

        let tree = ravel.to_tree(&node("secret")).unwrap();
        assert!(tree.children.is_empty());

        let back = ravel.from_tree(&tree).unwrap();
        assert_eq!(node_cell(&back).borrow().label, "");
    }

    #[test]
    fn field_aliases_round_trip() {
        let mut ravel = graph_engine(ReferenceMode::PathRelative);
        let token = TypeToken::of::<NodeCell>();
        ravel.alias_field(token, "next", "successor").unwrap();

        let head = node("head");
        node_cell(&head).borrow_mut().next = Some(node("tail"));
        let tree = ravel.to_tree(&head).unwrap();
        assert_eq!(tree.children[1].name, "successor");

        let back = ravel.from_tree(&tree).unwrap();
        let tail = node_cell(&back).borrow().next.clone().unwrap();
        assert_eq!(node_cell(&tail).borrow().label, "tail");
    }

    // ---- default implementations ----

    struct AnyNode;

    #[test]
    fn default_implementations_substitute_both_ways() {
        let mut ravel = graph_engine(ReferenceMode::PathRelative);
        let abstract_token = ravel.alias::<AnyNode>("any-node").unwrap();
        ravel
            .default_implementation(abstract_token, TypeToken::of::<NodeCell>())
            .unwrap();

        // The concrete value is written under the abstract name.
        let tree = ravel.to_tree(&node("impl")).unwrap();
        assert_eq!(tree.name, "any-node");

        // And the abstract name instantiates the implementation.
        let back = ravel.from_tree(&tree).unwrap();
        assert_eq!(node_cell(&back).borrow().label, "impl");
    }

    // ---- implicit collections ----

    struct Team {
        members: Vec<Obj>,
    }

    type TeamCell = RefCell<Team>;

    struct TeamConverter;

    impl Converter for TeamConverter {
        fn can_convert(&self, token: &TypeToken) -> bool {
            token.is::<TeamCell>()
        }

        fn marshal(&self, value: &Obj, ctx: &mut MarshalContext<'_>) -> Result<()> {
            let token = TypeToken::of::<TeamCell>();
            let team = value.downcast_ref::<TeamCell>().unwrap().borrow();
            match ctx.chain().implicit_collection_for(&token, "members") {
                Some(def) => {
                    for member in &team.members {
                        ctx.writer().start_node(&def.item_name);
                        ctx.convert_another(member)?;
                        ctx.writer().end_node();
                    }
                }
                None => {
                    ctx.writer().start_node("members");
                    for member in &team.members {
                        ctx.write_item(member)?;
                    }
                    ctx.writer().end_node();
                }
            }
            Ok(())
        }

        fn unmarshal(&self, ctx: &mut UnmarshalContext<'_>) -> Result<Obj> {
            let token = TypeToken::of::<TeamCell>();
            let result: Obj = Rc::new(RefCell::new(Team { members: Vec::new() }));
            let def = ctx.chain().implicit_collection_for(&token, "members");

            while ctx.reader().has_more_children() {
                ctx.reader_mut().move_down();
                let outcome = match def {
                    Some(def) => {
                        let item = def.item_type.unwrap_or(TypeToken::of::<NodeCell>());
                        ctx.convert_another_as(Some(&result), item)
                    }
                    None => ctx.convert_another(Some(&result)),
                };
                ctx.reader_mut().move_up();
                result
                    .downcast_ref::<TeamCell>()
                    .unwrap()
                    .borrow_mut()
                    .members
                    .push(outcome?);
            }
            Ok(result)
        }
    }

    #[test]
    fn implicit_collections_inline_their_items() {
        let mut ravel = graph_engine(ReferenceMode::PathRelative);
        let token = ravel.alias::<TeamCell>("team").unwrap();
        ravel.register_converter(TeamConverter);
        ravel
            .add_implicit_collection(token, "members", "member", Some(TypeToken::of::<NodeCell>()))
            .unwrap();

        let team = obj(RefCell::new(Team {
            members: alloc::vec![node("a"), node("b")],
        }));
        let tree = ravel.to_tree(&team).unwrap();
        assert_eq!(tree.children.len(), 2);
        assert!(tree.children.iter().all(|child| child.name == "member"));

        let back = ravel.from_tree(&tree).unwrap();
        let team = back.downcast_ref::<TeamCell>().unwrap().borrow();
        assert_eq!(team.members.len(), 2);
        assert_eq!(node_cell(&team.members[1]).borrow().label, "b");
    }

    // ---- completion callbacks and out-of-band data ----

    struct Probe;

    struct ProbeConverter {
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Converter for ProbeConverter {
        fn can_convert(&self, token: &TypeToken) -> bool {
            token.is::<Probe>()
        }

        fn marshal(&self, _: &Obj, _: &mut MarshalContext<'_>) -> Result<()> {
            Ok(())
        }

        fn unmarshal(&self, ctx: &mut UnmarshalContext<'_>) -> Result<Obj> {
            for (priority, tag) in [(0, "low"), (10, "first-high"), (10, "second-high")] {
                let log = self.log.clone();
                ctx.add_completion_callback(priority, move || {
                    log.lock().unwrap().push(tag);
                    Ok(())
                });
            }
            Ok(obj(Probe))
        }
    }

    #[test]
    fn callbacks_run_by_priority_then_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut ravel = Ravel::new();
        ravel.alias::<Probe>("probe").unwrap();
        ravel.register_converter(ProbeConverter { log: log.clone() });

        let tree = ravel.to_tree(&obj(Probe)).unwrap();
        ravel.from_tree(&tree).unwrap();

        assert_eq!(*log.lock().unwrap(), ["first-high", "second-high", "low"]);
    }

    struct Stamp;

    struct StampConverter;

    impl Converter for StampConverter {
        fn can_convert(&self, token: &TypeToken) -> bool {
            token.is::<Stamp>()
        }

        fn marshal(&self, _: &Obj, ctx: &mut MarshalContext<'_>) -> Result<()> {
            let text = ctx
                .data()
                .get::<String>("stamp")
                .cloned()
                .unwrap_or_default();
            ctx.writer().set_value(&text);
            Ok(())
        }

        fn unmarshal(&self, ctx: &mut UnmarshalContext<'_>) -> Result<Obj> {
            let seen = ctx.reader().value().to_string();
            ctx.data().put("stamp", seen);
            Ok(obj(Stamp))
        }
    }

    #[test]
    fn data_holder_is_visible_to_every_converter_in_a_call() {
        let mut ravel = Ravel::new();
        ravel.alias::<Stamp>("stamp").unwrap();
        ravel.register_converter(StampConverter);

        let mut writer = TreeNodeWriter::new();
        let mut data = DataHolder::new();
        data.put("stamp", String::from("2026-08-30"));
        ravel.marshal_with(&obj(Stamp), &mut writer, &mut data).unwrap();
        let tree = writer.into_tree();
        assert_eq!(tree.value, "2026-08-30");

        let mut reader = TreeNodeReader::new(&tree);
        let mut data = DataHolder::new();
        ravel.unmarshal_with(&mut reader, &mut data).unwrap();
        assert_eq!(data.get::<String>("stamp").map(String::as_str), Some("2026-08-30"));
    }

    // ---- depth ----

    #[test]
    fn long_chains_round_trip() {
        let ravel = graph_engine(ReferenceMode::PathRelative);
        let head = node("0");
        let mut tail = head.clone();
        for i in 1..150 {
            let next = node(&alloc::format!("{i}"));
            node_cell(&tail).borrow_mut().next = Some(next.clone());
            tail = next;
        }

        let tree = ravel.to_tree(&head).unwrap();
        let back = ravel.from_tree(&tree).unwrap();

        let mut cursor = back;
        let mut count = 1;
        while let Some(next) = { let n = node_cell(&cursor).borrow().next.clone(); n } {
            cursor = next;
            count += 1;
        }
        assert_eq!(count, 150);
        assert_eq!(node_cell(&cursor).borrow().label, "149");
    }
}
