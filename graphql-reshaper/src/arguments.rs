//! Argument normalization.
//!
//! Each argument name can be bound to an [`ArgumentTransform`] that rewrites the argument set
//! of a field, eg. to clamp a negative `limit`. Fields can also declare required arguments,
//! whose transform runs even when the request did not pass them so that a default is injected.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;

use crate::error::ArgumentError;
use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::tree::QueryNode;

/// Rewrites the arguments of a field.
///
/// `name` is the argument the transform is registered for, `args` the complete argument set of
/// the field, which the transform may modify freely.
pub trait ArgumentTransform: Send + Sync {
    fn transform(&self, name: &str, args: &mut Object);
}

impl<F> ArgumentTransform for F
where
    F: Fn(&str, &mut Object) + Send + Sync,
{
    fn transform(&self, name: &str, args: &mut Object) {
        self(name, args)
    }
}

/// Configuration of the argument transforms.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct ArgumentsConfig {
    /// Transform applied to each argument, by argument name.
    pub transforms: BTreeMap<String, TransformConfig>,
    /// Arguments whose transform always runs on a field, by field name.
    pub required: BTreeMap<String, Vec<String>>,
}

/// A configurable argument transform.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum TransformConfig {
    /// Replaces a missing, non numeric or too small value.
    Clamp {
        /// Smallest accepted value.
        min: i64,
        /// Value used instead of a rejected one.
        default: i64,
    },
    /// Sets a value when the argument is missing or null.
    Default {
        #[schemars(with = "serde_json::Value")]
        value: Value,
    },
}

impl ArgumentTransform for TransformConfig {
    fn transform(&self, name: &str, args: &mut Object) {
        match self {
            TransformConfig::Clamp { min, default } => {
                let accepted = args
                    .get(name)
                    .and_then(Value::as_f64)
                    .is_some_and(|value| value >= *min as f64);
                if !accepted {
                    args.insert(ByteString::from(name), (*default).into());
                }
            }
            TransformConfig::Default { value } => {
                if args.get(name).is_none_or(Value::is_null) {
                    args.insert(ByteString::from(name), value.clone());
                }
            }
        }
    }
}

/// Applies the argument transforms to the `__args` of query nodes.
#[derive(Clone, Default)]
pub struct ArgumentsTransformer {
    transforms: HashMap<String, Arc<dyn ArgumentTransform>>,
    required: HashMap<String, Vec<String>>,
}

impl fmt::Debug for ArgumentsTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgumentsTransformer")
            .field("transforms", &self.transforms.keys().collect::<Vec<_>>())
            .field("required", &self.required)
            .finish()
    }
}

impl ArgumentsTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ArgumentsConfig) -> Self {
        let mut transformer = Self::new();
        for (name, transform) in &config.transforms {
            transformer = transformer.with_transform(name.clone(), transform.clone());
        }
        for (field, arguments) in &config.required {
            transformer = transformer.with_required(field.clone(), arguments.iter().cloned());
        }
        transformer
    }

    /// Registers the transform of the `name` argument, replacing any previous one.
    pub fn with_transform(
        mut self,
        name: impl Into<String>,
        transform: impl ArgumentTransform + 'static,
    ) -> Self {
        self.transforms.insert(name.into(), Arc::new(transform));
        self
    }

    /// Declares arguments whose transform runs on `field` even when they are not passed.
    pub fn with_required(
        mut self,
        field: impl Into<String>,
        arguments: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.required
            .entry(field.into())
            .or_default()
            .extend(arguments.into_iter().map(Into::into));
        self
    }

    /// Transforms the arguments of `node`, a selection of the field named `field`.
    ///
    /// Transforms run on a copy of the arguments, which replaces `__args` unless it ends up
    /// empty.
    pub fn transform(&self, node: &mut QueryNode, field: &str) -> Result<(), ArgumentError> {
        let original = node.args.as_ref();
        let mut args = original.cloned().unwrap_or_default();

        let names: Vec<String> = args.keys().map(|name| name.as_str().to_string()).collect();
        for name in &names {
            if let Some(transform) = self.transforms.get(name) {
                transform.transform(name, &mut args);
            }
        }

        if let Some(required) = self.required.get(field) {
            for argument in required {
                if original.is_some_and(|original| original.contains_key(argument.as_str())) {
                    continue;
                }
                let transform = self.transforms.get(argument).ok_or_else(|| {
                    ArgumentError::MissingTransform {
                        field: field.to_string(),
                        argument: argument.clone(),
                    }
                })?;
                tracing::trace!(field, argument, "injecting required argument");
                transform.transform(argument, &mut args);
            }
        }

        if !args.is_empty() {
            node.args = Some(args);
        }
        Ok(())
    }

    /// Transforms the arguments of every sub-selection of `node`, deepest first, then those of
    /// `node` itself.
    ///
    /// Each sub-selection is transformed as a selection of the field it currently targets.
    pub fn transform_recursive(
        &self,
        node: &mut QueryNode,
        field: &str,
    ) -> Result<(), ArgumentError> {
        self.transform_children(node)?;
        self.transform(node, field)
    }

    fn transform_children(&self, node: &mut QueryNode) -> Result<(), ArgumentError> {
        for (key, child) in node.fields.iter_mut() {
            let field = child.target_name(key).to_string();
            self.transform_recursive(child, &field)?;
        }
        for fragment in &mut node.fragments {
            self.transform_children(&mut fragment.selection)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use serde_json_bytes::json as bjson;

    use super::*;

    fn node(value: serde_json::Value) -> QueryNode {
        serde_json::from_value(value).unwrap()
    }

    fn args(node: &QueryNode) -> Value {
        Value::Object(node.args().cloned().unwrap_or_default())
    }

    fn transformer() -> ArgumentsTransformer {
        let config: ArgumentsConfig = serde_yaml::from_str(
            r#"
transforms:
  limit:
    clamp: { min: 0, default: 10 }
  offset:
    clamp: { min: 0, default: 0 }
  currentPage:
    clamp: { min: 0, default: 0 }
required:
  searchProducts: [limit, offset, currentPage]
"#,
        )
        .unwrap();
        ArgumentsTransformer::from_config(&config)
    }

    #[test]
    fn it_transforms_declared_arguments_and_keeps_the_others() {
        let mut search = node(json!({
            "__args": { "text": "meskwielt", "limit": -12, "offset": 12 }
        }));
        transformer().transform(&mut search, "").unwrap();
        assert_eq!(
            args(&search),
            bjson!({ "text": "meskwielt", "limit": 10, "offset": 12 })
        );
    }

    #[test]
    fn it_transforms_arguments_of_the_whole_tree() {
        let mut tree = node(json!({
            "result": { "somethingElse": { "__args": { "offset": -2 } } }
        }));
        transformer().transform_recursive(&mut tree, "").unwrap();
        assert_eq!(
            tree,
            node(json!({
                "result": { "somethingElse": { "__args": { "offset": 0 } } }
            }))
        );
    }

    #[test]
    fn it_injects_required_arguments() {
        let mut search = node(json!({ "__args": { "limit": -23 } }));
        transformer().transform(&mut search, "searchProducts").unwrap();
        assert_eq!(
            args(&search),
            bjson!({ "limit": 10, "offset": 0, "currentPage": 0 })
        );
    }

    #[test]
    fn required_arguments_follow_the_aliased_field() {
        let mut tree = node(json!({
            "products": { "__aliasFor": "searchProducts", "total": {} }
        }));
        transformer().transform_recursive(&mut tree, "").unwrap();
        assert_eq!(
            args(tree.field("products").unwrap()),
            bjson!({ "limit": 10, "offset": 0, "currentPage": 0 })
        );
    }

    #[test]
    fn it_leaves_nodes_without_arguments_untouched() {
        let mut leaf = node(json!({ "id": {} }));
        transformer().transform(&mut leaf, "").unwrap();
        assert_eq!(leaf.args(), None);
    }

    #[test]
    fn it_fails_on_required_arguments_without_transform() {
        let transformer = ArgumentsTransformer::new().with_required("searchProducts", ["sort"]);
        let mut search = QueryNode::new();
        assert_eq!(
            transformer.transform(&mut search, "searchProducts"),
            Err(ArgumentError::MissingTransform {
                field: "searchProducts".to_string(),
                argument: "sort".to_string(),
            })
        );
    }

    #[test]
    fn closures_and_defaults_are_transforms() {
        let transformer = ArgumentsTransformer::new()
            .with_transform("text", |name: &str, args: &mut Object| {
                if let Some(Value::String(text)) = args.get(name) {
                    let trimmed = text.as_str().trim().to_string();
                    args.insert(ByteString::from(name), Value::String(trimmed.into()));
                }
            })
            .with_transform(
                "sort",
                TransformConfig::Default {
                    value: bjson!("RELEVANCE"),
                },
            )
            .with_required("search", ["sort"]);
        let mut search = node(json!({ "__args": { "text": "  shorts " } }));
        transformer.transform(&mut search, "search").unwrap();
        assert_eq!(args(&search), bjson!({ "text": "shorts", "sort": "RELEVANCE" }));
    }
}
