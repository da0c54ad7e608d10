//! Locates fields of a [`QueryNode`] by logical name, whatever key they are currently stored under.

use crate::tree::QueryNode;

/// Returns the key under which the field with the given logical name is stored in `node`.
///
/// A child stored directly under `logical_name` wins when its own alias history agrees with
/// that name. Otherwise the first child, in selection order, whose logical name matches is
/// returned.
pub fn resolve<'a>(node: &'a QueryNode, logical_name: &str) -> Option<&'a str> {
    if let Some((key, child)) = node.fields.get_key_value(logical_name) {
        if child.logical_name(key) == logical_name {
            return Some(key.as_str());
        }
    }
    node.fields
        .iter()
        .find(|(key, child)| child.logical_name(key) == logical_name)
        .map(|(key, _)| key.as_str())
}

/// Splits a dotted path such as `masterVariant.id` into its segments.
///
/// The empty path has no segments and designates the node itself.
pub fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|segment| !segment.is_empty())
}

/// Resolves every segment of a dotted path in turn, descending into the matched children.
pub fn resolve_path<'a>(node: &'a QueryNode, path: &str) -> Option<&'a QueryNode> {
    split_path(path).try_fold(node, |current, segment| {
        let key = resolve(current, segment)?;
        current.fields.get(key)
    })
}

/// Mutable counterpart of [`resolve_path`].
pub fn resolve_path_mut<'a>(node: &'a mut QueryNode, path: &str) -> Option<&'a mut QueryNode> {
    let mut current = node;
    for segment in split_path(path) {
        let key = resolve(current, segment)?.to_string();
        current = current.fields.get_mut(&key)?;
    }
    Some(current)
}
