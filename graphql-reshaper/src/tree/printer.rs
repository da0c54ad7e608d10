//! Prints a [`QueryNode`] back to GraphQL query text.
//!
//! The output is a single line wrapped in an anonymous selection block:
//! `{ key: aliasFor (name: value) { children } }`. The alias history recorded by the
//! transformer (`__initialAlias`) is never printed.

use std::collections::BTreeSet;
use std::fmt;

use apollo_compiler::ast::OperationType;

use super::QueryNode;
use crate::json_ext::Object;
use crate::json_ext::Value;

/// Renders `node` as GraphQL query text.
pub fn print(node: &QueryNode) -> String {
    node.to_string()
}

/// Renders `node` as an operation of the given type. Queries use the shorthand form.
pub fn print_operation(node: &QueryNode, operation_type: OperationType) -> String {
    match operation_type {
        OperationType::Query => print(node),
        OperationType::Mutation => format!("mutation {node}"),
        OperationType::Subscription => format!("subscription {node}"),
    }
}

pub(crate) fn write_query(f: &mut fmt::Formatter<'_>, node: &QueryNode) -> fmt::Result {
    f.write_str("{ ")?;
    write_selections(f, node)?;
    f.write_str(" }")
}

fn write_selections(f: &mut fmt::Formatter<'_>, node: &QueryNode) -> fmt::Result {
    let mut first = true;
    let mut separator = |f: &mut fmt::Formatter<'_>| {
        if std::mem::take(&mut first) {
            Ok(())
        } else {
            f.write_str(" ")
        }
    };
    for (key, child) in &node.fields {
        separator(f)?;
        write_field(f, key, child)?;
    }
    for fragment in &node.fragments {
        separator(f)?;
        write!(f, "... on {} {{ ", fragment.type_condition)?;
        write_selections(f, &fragment.selection)?;
        f.write_str(" }")?;
    }
    Ok(())
}

fn write_field(f: &mut fmt::Formatter<'_>, key: &str, node: &QueryNode) -> fmt::Result {
    f.write_str(key)?;
    if let Some(alias_for) = &node.alias_for {
        write!(f, ": {alias_for}")?;
    }
    if let Some(args) = node.args.as_ref().filter(|args| !args.is_empty()) {
        f.write_str(" (")?;
        write_arguments(f, args, &node.enum_args, "")?;
        f.write_str(")")?;
    }
    if !node.fields.is_empty() || !node.fragments.is_empty() {
        f.write_str(" { ")?;
        write_selections(f, node)?;
        f.write_str(" }")?;
    }
    Ok(())
}

fn write_arguments(
    f: &mut fmt::Formatter<'_>,
    args: &Object,
    enums: &BTreeSet<String>,
    path: &str,
) -> fmt::Result {
    let mut separator = "";
    for (name, value) in args {
        let name = name.as_str();
        write!(f, "{separator}{name}: ")?;
        if path.is_empty() {
            write_value(f, value, enums, name)?;
        } else {
            write_value(f, value, enums, &format!("{path}.{name}"))?;
        }
        separator = ", ";
    }
    Ok(())
}

fn write_value(
    f: &mut fmt::Formatter<'_>,
    value: &Value,
    enums: &BTreeSet<String>,
    path: &str,
) -> fmt::Result {
    match value {
        Value::Null => f.write_str("null"),
        Value::Bool(b) => write!(f, "{b}"),
        Value::Number(n) => write!(f, "{n}"),
        Value::String(s) if enums.contains(path) && is_enum_value(s.as_str()) => {
            f.write_str(s.as_str())
        }
        // JSON string escaping is valid GraphQL string escaping
        Value::String(s) => write!(f, "{}", serde_json::Value::from(s.as_str())),
        Value::Array(values) => {
            f.write_str("[")?;
            let mut separator = "";
            for value in values {
                f.write_str(separator)?;
                write_value(f, value, enums, path)?;
                separator = ", ";
            }
            f.write_str("]")
        }
        Value::Object(object) => {
            f.write_str("{")?;
            write_arguments(f, object, enums, path)?;
            f.write_str("}")
        }
    }
}

/// A GraphQL name other than `true`, `false` and `null`.
fn is_enum_value(value: &str) -> bool {
    let mut chars = value.chars();
    chars
        .next()
        .is_some_and(|first| first == '_' || first.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        && !matches!(value, "true" | "false" | "null")
}
