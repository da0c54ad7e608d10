//! Maps upstream responses back to the shape of the original request.
//!
//! Every root field of the original request is handed to the [`FieldMapper`] registered for the
//! field it selects. Mappers receive the whole request and the whole upstream data, since a root
//! field may need data fetched for another one.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json_bytes::ByteString;

use crate::error::MapperError;
use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::tree::QueryNode;

/// Builds the response value of one root field.
///
/// `key` is the response key of the root field in `request`.
pub trait FieldMapper: Send + Sync {
    fn map(&self, request: &QueryNode, data: &Object, key: &str) -> Value;
}

impl<F> FieldMapper for F
where
    F: Fn(&QueryNode, &Object, &str) -> Value + Send + Sync,
{
    fn map(&self, request: &QueryNode, data: &Object, key: &str) -> Value {
        self(request, data, key)
    }
}

/// Field mappers by root field name.
#[derive(Clone, Default)]
pub struct MapperTable {
    mappers: HashMap<String, Arc<dyn FieldMapper>>,
}

impl fmt::Debug for MapperTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.mappers.keys()).finish()
    }
}

impl MapperTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the mapper of the `field` root field and returns the table.
    pub fn with_mapper(
        mut self,
        field: impl Into<String>,
        mapper: impl FieldMapper + 'static,
    ) -> Self {
        self.insert(field, mapper);
        self
    }

    /// Registers the mapper of the `field` root field, replacing any previous one.
    pub fn insert(&mut self, field: impl Into<String>, mapper: impl FieldMapper + 'static) {
        self.mappers.insert(field.into(), Arc::new(mapper));
    }

    pub fn get(&self, field: &str) -> Option<&dyn FieldMapper> {
        self.mappers.get(field).map(|mapper| mapper.as_ref())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.mappers.contains_key(field)
    }
}

/// Dispatches the root fields of a request to their mappers.
#[derive(Debug, Clone, Default)]
pub struct ResponseMapper {
    mappers: MapperTable,
}

impl ResponseMapper {
    pub fn new(mappers: MapperTable) -> Self {
        Self { mappers }
    }

    /// Builds the response to `request` from the upstream `data`.
    ///
    /// The response has exactly the root keys of `request`.
    pub fn map(&self, request: &QueryNode, data: &Object) -> Result<Object, MapperError> {
        let mut response = Object::new();
        for (key, node) in request.fields() {
            let field = node.target_name(key);
            let mapper = self
                .mappers
                .get(field)
                .ok_or_else(|| MapperError::MissingMapper {
                    field: field.to_string(),
                })?;
            response.insert(ByteString::from(key.as_str()), mapper.map(request, data, key));
        }
        Ok(response)
    }
}

/// Projects `value` onto the selection of `node`.
///
/// Objects keep the selected keys only, missing ones becoming `null`, and the keys of fragment
/// selections that are present. Lists are projected element-wise and leaf selections copy the
/// value as is.
pub fn select(node: &QueryNode, value: &Value) -> Value {
    if node.has_no_fields() && node.fragments().is_empty() {
        return value.clone();
    }
    match value {
        Value::Array(values) => {
            Value::Array(values.iter().map(|value| select(node, value)).collect())
        }
        Value::Object(object) => Value::Object(select_object(node, object)),
        _ => value.clone(),
    }
}

fn select_object(node: &QueryNode, object: &Object) -> Object {
    let mut output = Object::new();
    for (key, child) in node.fields() {
        let value = object
            .get(key.as_str())
            .map(|value| select(child, value))
            .unwrap_or_default();
        output.insert(ByteString::from(key.as_str()), value);
    }
    for fragment in node.fragments() {
        for (key, value) in select_object(fragment.selection(), object) {
            if object.contains_key(key.as_str()) {
                output.insert(key, value);
            }
        }
    }
    output
}
