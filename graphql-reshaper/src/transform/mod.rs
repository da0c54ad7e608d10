//! Rewrites a request tree according to a [`TransformRuleset`].
//!
//! Rules are applied to each node in a fixed order:
//!
//! 1. adders
//! 2. rules of the sub-fields, dropping sub-fields left empty
//! 3. args
//! 4. removers
//! 5. movers
//! 6. alias
//! 7. inline fragments
//!
//! Fields named by rules are always located with [`resolve`], so a rule written for a field
//! keeps applying after the field was aliased.

use crate::resolver::resolve;
use crate::resolver::resolve_path;
use crate::resolver::resolve_path_mut;
use crate::resolver::split_path;
use crate::rules::Adder;
use crate::rules::FieldRules;
use crate::rules::InlineFragmentRule;
use crate::rules::Mover;
use crate::rules::TransformRuleset;
use crate::tree::Fragment;
use crate::tree::FragmentTag;
use crate::tree::QueryNode;


/// Applies a ruleset to request trees.
#[derive(Debug, Clone, Default)]
pub struct ObjectTransformer {
    rules: TransformRuleset,
}

impl ObjectTransformer {
    pub fn new(rules: TransformRuleset) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &TransformRuleset {
        &self.rules
    }

    /// Transforms `node` in place with the root rules.
    ///
    /// Returns true when nothing is left of the node, in which case it should not be sent
    /// upstream.
    pub fn transform(&self, node: &mut QueryNode) -> bool {
        transform_node(node, &self.rules)
    }
}

/// Transforms `node` in place and returns true when it ends up without fields or metadata.
pub fn transform_node(node: &mut QueryNode, rules: &FieldRules) -> bool {
    for adder in &rules.adders {
        add_fields(node, adder);
    }

    let keys: Vec<String> = node.fields.keys().cloned().collect();
    for key in keys {
        let Some(child) = node.fields.get_mut(&key) else {
            continue;
        };
        let Some(child_rules) = rules.field(child.target_name(&key)) else {
            continue;
        };
        if transform_node(child, child_rules) {
            tracing::trace!(%key, "removing emptied field");
            node.remove(&key);
        }
    }

    if let Some(args) = &rules.args {
        let node_args = node.args.get_or_insert_with(Default::default);
        for (name, value) in args {
            node_args.insert(name.clone(), value.clone());
        }
    }

    for remover in &rules.removers {
        if let Some(key) = resolve(node, remover).map(str::to_string) {
            tracing::trace!(%key, "removing field");
            node.remove(&key);
        }
    }

    for mover in &rules.movers {
        move_fields(node, mover);
    }

    if let Some(alias) = &rules.alias {
        node.initial_alias = Some(node.alias_for.take());
        node.alias_for = Some(alias.clone());
    }

    for inline_fragment in &rules.inline_fragments {
        add_inline_fragment(node, inline_fragment);
    }

    node.is_empty()
}

fn add_fields(node: &mut QueryNode, adder: &Adder) {
    let applies = match &adder.when {
        None => true,
        Some(when) => when.iter().any(|path| resolve_path(node, path).is_some()),
    };
    if !applies {
        return;
    }
    for path in &adder.add {
        tracing::trace!(%path, "adding field");
        add_path(node, path);
    }
}

/// Walks `path` by key, creating the missing nodes, and returns the last one.
fn add_path<'a>(node: &'a mut QueryNode, path: &str) -> &'a mut QueryNode {
    split_path(path).fold(node, |current, segment| {
        current.fields.entry(segment.to_string()).or_default()
    })
}

fn move_fields(node: &mut QueryNode, mover: &Mover) {
    let from = mover.from.as_deref().unwrap_or_default();
    let moved = match &mover.fields {
        Some(fields) => {
            let Some(source) = resolve_path_mut(node, from) else {
                return;
            };
            let moved = extract_fields(source, fields);
            if moved.has_no_fields() {
                return;
            }
            if source.has_no_fields() {
                prune_empty_path(node, from);
            }
            moved
        }
        None => {
            let mut segments = split_path(from);
            let fields = match (segments.next(), segments.next()) {
                // a direct child is detached along with its metadata
                (Some(segment), None) => {
                    let Some(key) = resolve(node, segment).map(str::to_string) else {
                        return;
                    };
                    match node.remove(&key) {
                        Some(source) => source.fields,
                        None => return,
                    }
                }
                // deeper sources stay behind without their fields
                _ => match resolve_path_mut(node, from) {
                    Some(source) => std::mem::take(&mut source.fields),
                    None => return,
                },
            };
            QueryNode {
                fields,
                ..Default::default()
            }
        }
    };
    tracing::trace!(from, to = %mover.to, "moving fields");
    add_path(node, &mover.to).merge(moved);
}

/// Removes the resolved `fields` from `source`, keeping their keys.
fn extract_fields(source: &mut QueryNode, fields: &[String]) -> QueryNode {
    let mut extracted = QueryNode::default();
    for field in fields {
        let Some(key) = resolve(source, field).map(str::to_string) else {
            continue;
        };
        if let Some(child) = source.remove(&key) {
            extracted.fields.insert(key, child);
        }
    }
    extracted
}

/// Removes the nodes along `path` left without fields, deepest first.
fn prune_empty_path(node: &mut QueryNode, path: &str) {
    let segments: Vec<&str> = split_path(path).collect();
    prune(node, &segments);
}

fn prune(node: &mut QueryNode, segments: &[&str]) {
    let Some((segment, rest)) = segments.split_first() else {
        return;
    };
    let Some(key) = resolve(node, segment).map(str::to_string) else {
        return;
    };
    let Some(child) = node.fields.get_mut(&key) else {
        return;
    };
    prune(child, rest);
    if child.has_no_fields() {
        node.remove(&key);
    }
}

fn add_inline_fragment(node: &mut QueryNode, rule: &InlineFragmentRule) {
    if !rule.fields.iter().any(|field| resolve(node, field).is_some()) {
        return;
    }
    let selection = extract_fields(node, &rule.fields);
    tracing::trace!(type_name = %rule.type_name, "adding inline fragment");
    node.fragments.push(Fragment::new(
        rule.type_name.clone(),
        FragmentTag::TypeName,
        selection,
    ));
}
