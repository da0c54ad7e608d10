//! Performance oriented JSON manipulation.

use serde_json_bytes::ByteString;
use serde_json_bytes::Map;
pub use serde_json_bytes::Value;

/// A JSON object.
pub type Object = Map<ByteString, Value>;

/// Extension trait for [`serde_json_bytes::Value`].
pub trait ValueExt {
    /// Deep merge the JSON objects, array and override the values in `&mut self` if they already
    /// exists.
    fn deep_merge(&mut self, other: Self);
}

impl ValueExt for Value {
    fn deep_merge(&mut self, other: Self) {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => a.deep_merge(b),
            (Value::Array(a), Value::Array(b)) => {
                for (index, value) in b.into_iter().enumerate() {
                    match a.get_mut(index) {
                        Some(existing) => existing.deep_merge(value),
                        None => a.push(value),
                    }
                }
            }
            (a, b) => *a = b,
        }
    }
}

/// Extension trait for [`Object`].
pub trait ObjectExt {
    /// Merges every entry of `other` into `self`, recursing into nested objects.
    fn deep_merge(&mut self, other: Object);
}

impl ObjectExt for Object {
    fn deep_merge(&mut self, other: Object) {
        for (key, value) in other {
            match self.get_mut(key.as_str()) {
                Some(existing) => existing.deep_merge(value),
                None => {
                    self.insert(key, value);
                }
            }
        }
    }
}
