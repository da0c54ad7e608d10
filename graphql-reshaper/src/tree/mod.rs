//! In-memory representation of a GraphQL selection.
//!
//! A [`QueryNode`] maps the response keys of a selection set to their own sub-selections and
//! carries the metadata the transformer needs: the field a key is an alias for, the alias it had
//! before the last rename, the call arguments and the inline fragments.
//!
//! The serde representation keeps the historical wire layout, where metadata is stored next to
//! the fields under reserved `__`-prefixed keys:
//!
//! ```json
//! { "products": { "__aliasFor": "searchProducts", "__args": { "text": "shorts" }, "total": {} } }
//! ```

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de;
use serde::de::MapAccess;
use serde::de::Visitor;
use serde::ser::SerializeMap;

use crate::json_ext::Object;
use crate::json_ext::ObjectExt;

pub mod builder;
pub mod printer;

pub(crate) const ALIAS_FOR: &str = "__aliasFor";
pub(crate) const INITIAL_ALIAS: &str = "__initialAlias";
// Older spelling of `__initialAlias`, still accepted on input.
pub(crate) const CIF_NAME: &str = "__cifName";
pub(crate) const ARGS: &str = "__args";
pub(crate) const ENUM_ARGS: &str = "__enumArgs";
pub(crate) const ON: &str = "__on";
pub(crate) const TYPE_NAME: &str = "__typeName";
pub(crate) const FRAGMENT_NAME: &str = "__fragmentName";

/// One field selection: its sub-selections by response key, plus metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryNode {
    pub(crate) fields: IndexMap<String, QueryNode>,
    pub(crate) alias_for: Option<String>,
    /// `None` when never aliased by a transform, `Some(None)` when the field had no alias before
    /// the transform renamed it.
    pub(crate) initial_alias: Option<Option<String>>,
    pub(crate) args: Option<Object>,
    /// Dotted paths into `args` whose string values are enum values.
    pub(crate) enum_args: BTreeSet<String>,
    pub(crate) fragments: Vec<Fragment>,
}

/// How a fragment entry was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentTag {
    /// Synthesized by an `inlineFragments` rule (`__typeName`).
    TypeName,
    /// Read from an inline fragment of the request (`__fragmentName`).
    FragmentName,
}

impl FragmentTag {
    pub(crate) const fn key(self) -> &'static str {
        match self {
            FragmentTag::TypeName => TYPE_NAME,
            FragmentTag::FragmentName => FRAGMENT_NAME,
        }
    }
}

/// A type-conditional group of fields, `... on TypeCondition { selection }`.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub(crate) type_condition: String,
    pub(crate) tag: FragmentTag,
    pub(crate) selection: QueryNode,
}

impl Fragment {
    pub fn new(type_condition: impl Into<String>, tag: FragmentTag, selection: QueryNode) -> Self {
        Self {
            type_condition: type_condition.into(),
            tag,
            selection,
        }
    }

    pub fn type_condition(&self) -> &str {
        &self.type_condition
    }

    pub fn tag(&self) -> FragmentTag {
        self.tag
    }

    pub fn selection(&self) -> &QueryNode {
        &self.selection
    }
}

impl QueryNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &IndexMap<String, QueryNode> {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&QueryNode> {
        self.fields.get(key)
    }

    pub fn field_mut(&mut self, key: &str) -> Option<&mut QueryNode> {
        self.fields.get_mut(key)
    }

    /// Inserts a sub-selection under `key`, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, node: QueryNode) -> Option<QueryNode> {
        self.fields.insert(key.into(), node)
    }

    /// Removes the sub-selection stored under `key`, preserving the order of the others.
    pub fn remove(&mut self, key: &str) -> Option<QueryNode> {
        self.fields.shift_remove(key)
    }

    /// Adds a leaf field and returns `self`, handy to build trees by hand.
    pub fn with_field(mut self, key: impl Into<String>, node: QueryNode) -> Self {
        self.insert(key, node);
        self
    }

    pub fn alias_for(&self) -> Option<&str> {
        self.alias_for.as_deref()
    }

    pub fn set_alias_for(&mut self, alias_for: Option<String>) {
        self.alias_for = alias_for;
    }

    pub fn initial_alias(&self) -> Option<Option<&str>> {
        self.initial_alias.as_ref().map(Option::as_deref)
    }

    pub fn args(&self) -> Option<&Object> {
        self.args.as_ref()
    }

    pub fn set_args(&mut self, args: Option<Object>) {
        self.args = args;
    }

    /// Dotted paths of the arguments holding enum values, eg. `sort` or `filter.order`.
    pub fn enum_args(&self) -> &BTreeSet<String> {
        &self.enum_args
    }

    /// Marks the argument at the dotted `path` as holding enum values.
    pub fn mark_enum_arg(&mut self, path: impl Into<String>) {
        self.enum_args.insert(path.into());
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn push_fragment(&mut self, fragment: Fragment) {
        self.fragments.push(fragment);
    }

    /// The alias-independent identity of this node when stored under `key`.
    ///
    /// A recorded prior alias wins; an explicitly null prior alias means the key itself was the
    /// field name before the last rename; otherwise the current alias target, then the key.
    pub fn logical_name<'a>(&'a self, key: &'a str) -> &'a str {
        match &self.initial_alias {
            Some(Some(prior)) => prior,
            Some(None) => key,
            None => self.alias_for.as_deref().unwrap_or(key),
        }
    }

    /// The field this node currently selects when stored under `key`.
    pub fn target_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.alias_for.as_deref().unwrap_or(key)
    }

    /// True when the node has neither fields nor metadata.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
            && self.alias_for.is_none()
            && self.initial_alias.is_none()
            && self.args.is_none()
            && self.enum_args.is_empty()
            && self.fragments.is_empty()
    }

    /// True when the node has no fields, whatever its metadata.
    pub fn has_no_fields(&self) -> bool {
        self.fields.is_empty()
    }

    /// Recursively merges `other` into `self`.
    ///
    /// Fields missing from `self` are inserted, shared ones are merged. Arguments are deep
    /// merged with `other` winning on scalars, fragments are appended, and the alias metadata of
    /// `self` is left untouched.
    pub fn merge(&mut self, other: QueryNode) {
        for (key, node) in other.fields {
            match self.fields.get_mut(&key) {
                Some(existing) => existing.merge(node),
                None => {
                    self.fields.insert(key, node);
                }
            }
        }
        if let Some(args) = other.args {
            match &mut self.args {
                Some(existing) => existing.deep_merge(args),
                None => self.args = Some(args),
            }
        }
        self.enum_args.extend(other.enum_args);
        self.fragments.extend(other.fragments);
    }

    fn serialize_entries<M: SerializeMap>(&self, map: &mut M) -> Result<(), M::Error> {
        for (key, node) in &self.fields {
            map.serialize_entry(key, node)?;
        }
        if let Some(alias_for) = &self.alias_for {
            map.serialize_entry(ALIAS_FOR, alias_for)?;
        }
        if let Some(initial_alias) = &self.initial_alias {
            map.serialize_entry(INITIAL_ALIAS, initial_alias)?;
        }
        if let Some(args) = &self.args {
            map.serialize_entry(ARGS, args)?;
        }
        if !self.enum_args.is_empty() {
            map.serialize_entry(ENUM_ARGS, &self.enum_args)?;
        }
        if !self.fragments.is_empty() {
            map.serialize_entry(ON, &self.fragments)?;
        }
        Ok(())
    }
}

impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        printer::write_query(f, self)
    }
}

impl Serialize for QueryNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        self.serialize_entries(&mut map)?;
        map.end()
    }
}

impl Serialize for Fragment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(self.tag.key(), &self.type_condition)?;
        self.selection.serialize_entries(&mut map)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for QueryNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (node, _) = deserializer.deserialize_any(NodeVisitor)?;
        Ok(node)
    }
}

impl<'de> Deserialize<'de> for Fragment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match deserializer.deserialize_any(NodeVisitor)? {
            (selection, Some((tag, type_condition))) => Ok(Fragment {
                type_condition,
                tag,
                selection,
            }),
            (_, None) => Err(de::Error::custom(format!(
                "fragment is missing its '{TYPE_NAME}' or '{FRAGMENT_NAME}' key"
            ))),
        }
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = (QueryNode, Option<(FragmentTag, String)>);

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a selection object")
    }

    // Leaves are sometimes written as `true` or `null` instead of `{}`.
    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
        Ok((QueryNode::default(), None))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok((QueryNode::default(), None))
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok((QueryNode::default(), None))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut node = QueryNode::default();
        let mut tag = None;
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                ALIAS_FOR => node.alias_for = map.next_value()?,
                INITIAL_ALIAS | CIF_NAME => node.initial_alias = Some(map.next_value()?),
                ARGS => node.args = Some(map.next_value()?),
                ENUM_ARGS => node.enum_args = map.next_value()?,
                ON => node.fragments = map.next_value()?,
                TYPE_NAME => tag = Some((FragmentTag::TypeName, map.next_value()?)),
                FRAGMENT_NAME => tag = Some((FragmentTag::FragmentName, map.next_value()?)),
                // including meta-fields such as `__typename`
                _ => {
                    let child = map.next_value::<QueryNode>()?;
                    node.fields.insert(key, child);
                }
            }
        }
        Ok((node, tag))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use serde_json_bytes::ByteString;

    use super::*;

    fn node(value: serde_json::Value) -> QueryNode {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn it_reads_and_writes_reserved_keys() {
        let value = json!({
            "products": {
                "total": {},
                "__aliasFor": "searchProducts",
                "__initialAlias": null,
                "__args": { "text": "shorts", "filter": ["a", "b"] },
                "__on": [{ "__typeName": "ConfigurableProduct", "variants": { "id": {} } }]
            }
        });
        let tree = node(value.clone());
        let products = tree.field("products").unwrap();
        assert_eq!(products.alias_for(), Some("searchProducts"));
        assert_eq!(products.initial_alias(), Some(None));
        assert_eq!(products.fragments().len(), 1);
        assert_eq!(products.fragments()[0].tag(), FragmentTag::TypeName);
        assert_eq!(products.fragments()[0].type_condition(), "ConfigurableProduct");
        assert_eq!(serde_json::to_value(&tree).unwrap(), value);
    }

    #[test]
    fn it_accepts_the_legacy_prior_alias_key_and_leaf_shorthands() {
        let tree = node(json!({
            "pets": { "__cifName": "animals", "name": true, "age": null }
        }));
        let pets = tree.field("pets").unwrap();
        assert_eq!(pets.initial_alias(), Some(Some("animals")));
        assert_eq!(pets.fields().len(), 2);
        assert!(pets.field("name").unwrap().is_empty());
    }

    #[test]
    fn it_reads_meta_fields_back_as_fields() {
        let document =
            apollo_compiler::ast::Document::parse("{ search { __typename id } }", "query.graphql")
                .unwrap();
        let tree = builder::TreeBuilder::new(&document).build(None).unwrap();
        let value = serde_json::to_value(&tree).unwrap();
        assert_eq!(value, json!({ "search": { "__typename": {}, "id": {} } }));
        let read: QueryNode = serde_json::from_value(value).unwrap();
        assert_eq!(read, tree);
        assert_eq!(read.to_string(), "{ search { __typename id } }");
    }

    #[test]
    fn it_keeps_enum_argument_paths() {
        let value = json!({
            "search": { "__args": { "sort": "NAME" }, "__enumArgs": ["sort"], "id": {} }
        });
        let tree = node(value.clone());
        let search = tree.field("search").unwrap();
        assert!(search.enum_args().contains("sort"));
        assert_eq!(serde_json::to_value(&tree).unwrap(), value);
    }

    #[test]
    fn it_builds_trees_by_hand() {
        let mut args = Object::new();
        args.insert(ByteString::from("sort"), "NAME".into());
        let mut search = QueryNode::new()
            .with_field("id", QueryNode::new())
            .with_field("variant", QueryNode::new().with_field("sku", QueryNode::new()));
        search.set_alias_for(Some("searchProducts".to_string()));
        search.set_args(Some(args));
        search.mark_enum_arg("sort");
        search.push_fragment(Fragment::new(
            "ConfigurableProduct",
            FragmentTag::TypeName,
            QueryNode::new().with_field("variants", QueryNode::new()),
        ));
        let mut tree = QueryNode::new().with_field("search", search);
        tree.field_mut("search")
            .unwrap()
            .field_mut("variant")
            .unwrap()
            .insert("name", QueryNode::new());
        assert_eq!(
            tree.to_string(),
            "{ search: searchProducts (sort: NAME) { id variant { sku name } \
             ... on ConfigurableProduct { variants } } }"
        );
    }

    #[test]
    fn it_rejects_fragments_without_a_type() {
        let result = serde_json::from_value::<QueryNode>(json!({ "__on": [{ "id": {} }] }));
        assert!(result.is_err());
    }

    #[test]
    fn logical_name_follows_the_alias_history() {
        let tree = node(json!({
            "plain": {},
            "aliased": { "__aliasFor": "searchProducts" },
            "renamed": { "__aliasFor": "products", "__initialAlias": null },
            "reRenamed": { "__aliasFor": "products", "__initialAlias": "searchProducts" }
        }));
        let logical = |key: &str| tree.field(key).unwrap().logical_name(key).to_string();
        assert_eq!(logical("plain"), "plain");
        assert_eq!(logical("aliased"), "searchProducts");
        assert_eq!(logical("renamed"), "renamed");
        assert_eq!(logical("reRenamed"), "searchProducts");

        let renamed = tree.field("renamed").unwrap();
        assert_eq!(renamed.target_name("renamed"), "products");
    }

    #[test]
    fn merge_is_recursive_and_keeps_alias_metadata() {
        let mut to = node(json!({
            "search": {
                "__aliasFor": "textSearch",
                "__args": { "filter": { "animal": "dog" } },
                "something1": { "subSomething1": {} }
            }
        }));
        let from = node(json!({
            "search": {
                "__aliasFor": "ignored",
                "__args": { "filter": { "size": "small" }, "limit": 2 },
                "something1": { "subSomething2": {} },
                "otherField": {}
            }
        }));
        to.merge(from);
        assert_eq!(
            to,
            node(json!({
                "search": {
                    "__aliasFor": "textSearch",
                    "__args": { "filter": { "animal": "dog", "size": "small" }, "limit": 2 },
                    "something1": { "subSomething1": {}, "subSomething2": {} },
                    "otherField": {}
                }
            }))
        );
    }

    #[test]
    fn emptiness_counts_metadata() {
        assert!(QueryNode::new().is_empty());
        let aliased = node(json!({ "__aliasFor": "x" }));
        assert!(!aliased.is_empty());
        assert!(aliased.has_no_fields());
    }
}
