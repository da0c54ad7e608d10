//! Declarative transform rules.
//!
//! A ruleset mirrors the shape of the requests it applies to: every key that is not one of the
//! rule kinds below names a sub-field and holds the rules for that sub-field.
//!
//! ```yaml
//! searchProducts:
//!   alias: products
//!   args:
//!     text: shorts
//!   results:
//!     removers: [customField]
//!     adders:
//!       - when: masterVariantId
//!         add: [masterVariant.id]
//! ```

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;

use crate::json_ext::Object;

/// The rules applied to the root of a request.
pub type TransformRuleset = FieldRules;

/// The rules applied to one field, and recursively to its sub-fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRules {
    /// Fields added when other fields are selected.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub adders: Vec<Adder>,

    /// Fields removed from the selection.
    #[serde(
        default,
        alias = "ignore",
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub removers: Vec<String>,

    /// Fields moved to another place of the selection.
    #[serde(default, alias = "moveFields", skip_serializing_if = "Vec::is_empty")]
    pub movers: Vec<Mover>,

    /// The upstream field this field is renamed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// Arguments set on the field, overwriting the request's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Object>,

    /// Fields wrapped into `... on Type` fragments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inline_fragments: Vec<InlineFragmentRule>,

    /// Rules for sub-fields, by field name.
    #[serde(flatten)]
    pub fields: IndexMap<String, FieldRules>,
}

impl FieldRules {
    /// The rules for the sub-field named `name`.
    pub fn field(&self, name: &str) -> Option<&FieldRules> {
        self.fields.get(name)
    }
}

/// Adds the `add` paths when one of the `when` paths is selected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Adder {
    /// Dotted paths checked in order. Without any, the adder always applies.
    #[serde(
        default,
        deserialize_with = "optional_one_or_many",
        skip_serializing_if = "Option::is_none"
    )]
    pub when: Option<Vec<String>>,

    /// Dotted paths to add.
    #[serde(deserialize_with = "one_or_many")]
    pub add: Vec<String>,
}

/// Moves `fields` (or every field) of `from` (or of the field itself) to `to`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mover {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    #[serde(default)]
    pub to: String,
}

/// Wraps `fields` in a `... on type_name` fragment when one of them is selected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineFragmentRule {
    pub type_name: String,
    pub fields: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        match value {
            OneOrMany::One(one) => vec![one],
            OneOrMany::Many(many) => many,
        }
    }
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    OneOrMany::deserialize(deserializer).map(Vec::from)
}

fn optional_one_or_many<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<OneOrMany<T>>::deserialize(deserializer)?.map(Vec::from))
}
