//! Builds a [`QueryNode`] tree from a parsed GraphQL document.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::HashSet;

use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::schema::ExtendedType;
use serde_json_bytes::ByteString;

use super::Fragment;
use super::FragmentTag;
use super::QueryNode;
use crate::error::QueryError;
use crate::json_ext::Object;
use crate::json_ext::Value;

/// The RECURSION_LIMIT is chosen to be:
///   < # expected to cause stack overflow &&
///   > # expected in a legitimate query
pub(crate) const DEFAULT_RECURSION_LIMIT: usize = 512;

const SKIP_DIRECTIVE_NAME: &str = "skip";
const INCLUDE_DIRECTIVE_NAME: &str = "include";
const IF_ARGUMENT_NAME: &str = "if";

/// Converts the selection set of one operation of a document into a [`QueryNode`].
pub struct TreeBuilder<'a> {
    document: &'a ast::Document,
    fragments: HashMap<&'a str, &'a Node<ast::FragmentDefinition>>,
    variables: Option<&'a Object>,
    schema: Option<&'a Schema>,
    recursion_limit: usize,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(document: &'a ast::Document) -> Self {
        let fragments = document
            .definitions
            .iter()
            .filter_map(|definition| match definition {
                ast::Definition::FragmentDefinition(fragment) => {
                    Some((fragment.name.as_str(), fragment))
                }
                _ => None,
            })
            .collect();
        Self {
            document,
            fragments,
            variables: None,
            schema: None,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }

    /// Values substituted for `$variable` arguments.
    ///
    /// Variables missing from `variables` take the default value of their definition, or
    /// `null` without one.
    pub fn variables(mut self, variables: &'a Object) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Schema used to recognize enum-typed variables, whose values are printed as enums.
    pub fn schema(mut self, schema: &'a Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn recursion_limit(mut self, recursion_limit: usize) -> Self {
        self.recursion_limit = recursion_limit;
        self
    }

    /// Builds the tree for the operation named `operation_name`, or for the first operation of
    /// the document.
    pub fn build(&self, operation_name: Option<&str>) -> Result<QueryNode, QueryError> {
        let operation = self.operation(operation_name)?;
        self.build_operation(operation)
    }

    /// Builds the tree of `operation`, usually found with [`TreeBuilder::operation`].
    pub fn build_operation(
        &self,
        operation: &ast::OperationDefinition,
    ) -> Result<QueryNode, QueryError> {
        Scope::new(self, operation).selection_set(&operation.selection_set, 0)
    }

    /// The operation named `operation_name`, or the first operation of the document.
    pub fn operation(
        &self,
        operation_name: Option<&str>,
    ) -> Result<&'a Node<ast::OperationDefinition>, QueryError> {
        let mut operations = self
            .document
            .definitions
            .iter()
            .filter_map(|definition| match definition {
                ast::Definition::OperationDefinition(operation) => Some(operation),
                _ => None,
            });
        match operation_name {
            Some(name) => operations
                .find(|operation| operation.name.as_ref().is_some_and(|n| n.as_str() == name))
                .ok_or_else(|| QueryError::UnknownOperation(name.to_string())),
            None => operations.next().ok_or(QueryError::NoOperation),
        }
    }

    fn is_enum(&self, type_name: &str) -> bool {
        self.schema.is_some_and(|schema| {
            matches!(schema.types.get(type_name), Some(ExtendedType::Enum(_)))
        })
    }
}

/// The variables of the operation being built.
struct Scope<'s, 'a> {
    builder: &'s TreeBuilder<'a>,
    variables: Object,
    enum_variables: HashSet<&'s str>,
}

impl<'s, 'a> Scope<'s, 'a> {
    fn new(builder: &'s TreeBuilder<'a>, operation: &'s ast::OperationDefinition) -> Self {
        let mut scope = Scope {
            builder,
            variables: builder.variables.cloned().unwrap_or_default(),
            enum_variables: HashSet::new(),
        };
        for definition in &operation.variables {
            let name = definition.name.as_str();
            let mut enums = BTreeSet::new();
            if let Some(default_value) = &definition.default_value {
                let value = scope.value(default_value, "", &mut enums);
                if !scope.variables.contains_key(name) {
                    scope.variables.insert(ByteString::from(name), value);
                }
            }
            // a default such as `$sort: Sort = NAME` types the variable without a schema
            if enums.contains("") || builder.is_enum(definition.ty.inner_named_type().as_str()) {
                scope.enum_variables.insert(name);
            }
        }
        scope
    }

    fn selection_set(
        &self,
        selections: &[ast::Selection],
        mut count: usize,
    ) -> Result<QueryNode, QueryError> {
        let recursion_limit = self.builder.recursion_limit;
        if count > recursion_limit {
            tracing::error!("selection processing recursion limit({recursion_limit}) exceeded");
            return Err(QueryError::RecursionLimitExceeded(recursion_limit));
        }
        count += 1;

        let mut node = QueryNode::default();
        for selection in selections {
            match selection {
                ast::Selection::Field(field) => {
                    if self.is_skipped(&field.directives) {
                        continue;
                    }
                    let key = field.alias.as_ref().unwrap_or(&field.name).to_string();
                    let child = self.selection_set(&field.selection_set, count)?;
                    let entry = node.fields.entry(key).or_default();
                    entry.merge(child);
                    if field.alias.is_some() {
                        entry.alias_for = Some(field.name.to_string());
                    }
                    if !field.arguments.is_empty() {
                        let (args, enums) = self.arguments(&field.arguments);
                        entry.args = Some(args);
                        entry.enum_args = enums;
                    }
                }
                ast::Selection::InlineFragment(inline_fragment) => {
                    if self.is_skipped(&inline_fragment.directives) {
                        continue;
                    }
                    let selection = self.selection_set(&inline_fragment.selection_set, count)?;
                    match &inline_fragment.type_condition {
                        Some(type_condition) => node.fragments.push(Fragment::new(
                            type_condition.as_str(),
                            FragmentTag::FragmentName,
                            selection,
                        )),
                        // `... { a }` selects on the enclosing type
                        None => node.merge(selection),
                    }
                }
                ast::Selection::FragmentSpread(fragment_spread) => {
                    if self.is_skipped(&fragment_spread.directives) {
                        continue;
                    }
                    let name = fragment_spread.fragment_name.as_str();
                    let definition = self
                        .builder
                        .fragments
                        .get(name)
                        .ok_or_else(|| QueryError::UnknownFragment(name.to_string()))?;
                    let selection = self.selection_set(&definition.selection_set, count)?;
                    node.fragments.push(Fragment::new(
                        definition.type_condition.as_str(),
                        FragmentTag::FragmentName,
                        selection,
                    ));
                }
            }
        }
        Ok(node)
    }

    /// The argument values, and the dotted paths of those holding enums.
    fn arguments(&self, arguments: &[Node<ast::Argument>]) -> (Object, BTreeSet<String>) {
        let mut enums = BTreeSet::new();
        let args = arguments
            .iter()
            .map(|argument| {
                let name = argument.name.as_str();
                (name.into(), self.value(&argument.value, name, &mut enums))
            })
            .collect();
        (args, enums)
    }

    /// Converts `value`, found at `path`, marking the paths of enum values in `enums`.
    ///
    /// Enum values are kept as strings. List items share the path of their list.
    fn value(&self, value: &ast::Value, path: &str, enums: &mut BTreeSet<String>) -> Value {
        match value {
            ast::Value::Null => Value::Null,
            ast::Value::Enum(name) => {
                enums.insert(path.to_string());
                Value::String(name.as_str().into())
            }
            ast::Value::Variable(name) => {
                let value = self
                    .variables
                    .get(name.as_str())
                    .cloned()
                    .unwrap_or_default();
                if self.enum_variables.contains(name.as_str())
                    && matches!(value, Value::String(_) | Value::Array(_))
                {
                    enums.insert(path.to_string());
                }
                value
            }
            ast::Value::String(s) => Value::String(s.as_str().into()),
            ast::Value::Float(f) => f
                .try_to_f64()
                .map(Into::into)
                .unwrap_or_else(|_| Value::String(f.as_str().into())),
            ast::Value::Int(i) => {
                let s = i.as_str();
                s.parse::<i64>()
                    .map(Into::into)
                    .or_else(|_| s.parse::<f64>().map(Into::into))
                    .unwrap_or_else(|_| Value::String(s.into()))
            }
            ast::Value::Boolean(b) => Value::Bool(*b),
            ast::Value::List(values) => Value::Array(
                values
                    .iter()
                    .map(|value| self.value(value, path, enums))
                    .collect(),
            ),
            ast::Value::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(name, value)| {
                        let path = if path.is_empty() {
                            name.to_string()
                        } else {
                            format!("{path}.{name}")
                        };
                        (name.as_str().into(), self.value(value, &path, enums))
                    })
                    .collect(),
            ),
        }
    }

    /// Statically evaluates `@skip(if:)` and `@include(if:)`.
    fn is_skipped(&self, directives: &ast::DirectiveList) -> bool {
        let condition = |directive_name: &str| {
            directives
                .iter()
                .find(|directive| directive.name.as_str() == directive_name)
                .and_then(|directive| {
                    directive
                        .arguments
                        .iter()
                        .find(|argument| argument.name.as_str() == IF_ARGUMENT_NAME)
                })
                .and_then(|argument| {
                    self.value(&argument.value, "", &mut BTreeSet::new())
                        .as_bool()
                })
        };
        condition(SKIP_DIRECTIVE_NAME) == Some(true)
            || condition(INCLUDE_DIRECTIVE_NAME) == Some(false)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;
    use serde_json_bytes::json as bjson;

    use super::*;

    fn node(value: serde_json::Value) -> QueryNode {
        serde_json::from_value(value).unwrap()
    }

    fn build(query: &str) -> QueryNode {
        let document = ast::Document::parse(query, "query.graphql").unwrap();
        TreeBuilder::new(&document).build(None).unwrap()
    }

    #[rstest]
    #[case::simple_alias(
        "{ dogs { dogsName: name age } }",
        json!({ "dogs": { "dogsName": { "__aliasFor": "name" }, "age": {} } })
    )]
    #[case::various_root_field_alias(
        "{ dogNames: dogs { name } dogAges: dogs { age } }",
        json!({
            "dogNames": { "__aliasFor": "dogs", "name": {} },
            "dogAges": { "__aliasFor": "dogs", "age": {} }
        })
    )]
    #[case::root_field_args(
        r#"{ search(text: "dogs") { name } }"#,
        json!({ "search": { "__args": { "text": "dogs" }, "name": {} } })
    )]
    #[case::field_args(
        r#"{ dogs { name(format: "capitalLetters") age } }"#,
        json!({ "dogs": { "name": { "__args": { "format": "capitalLetters" } }, "age": {} } })
    )]
    #[case::nested_args(
        r#"{ search(filter: {animal: "dog"}) { name } }"#,
        json!({ "search": { "__args": { "filter": { "animal": "dog" } }, "name": {} } })
    )]
    #[case::array_args(
        r#"{ search(filter: ["dogs", "cats"]) { name } }"#,
        json!({ "search": { "__args": { "filter": ["dogs", "cats"] }, "name": {} } })
    )]
    #[case::inline_fragments(
        "{ search { ... on ConfigSearch { id } label } }",
        json!({
            "search": {
                "__on": [{ "__fragmentName": "ConfigSearch", "id": {} }],
                "label": {}
            }
        })
    )]
    fn it_builds_trees(#[case] query: &str, #[case] expected: serde_json::Value) {
        assert_eq!(build(query), node(expected));
    }

    #[test]
    fn it_merges_selections_sharing_a_key() {
        let tree = build(
            r#"{
                search(text: "a") { name owner { age } }
                search(text: "b") { owner { gender } }
            }"#,
        );
        assert_eq!(
            tree,
            node(json!({
                "search": {
                    "__args": { "text": "b" },
                    "name": {},
                    "owner": { "age": {}, "gender": {} }
                }
            }))
        );
    }

    #[test]
    fn it_parses_scalar_argument_types() {
        let tree = build(
            "{ search(limit: 20, ratio: 0.5, inStock: false, sort: NAME, cursor: null) { id } }",
        );
        let args = tree.field("search").unwrap().args().unwrap();
        assert_eq!(
            Value::Object(args.clone()),
            bjson!({
                "limit": 20,
                "ratio": 0.5,
                "inStock": false,
                "sort": "NAME",
                "cursor": null
            })
        );
    }

    #[test]
    fn it_substitutes_variables() {
        let document = ast::Document::parse(
            "query Search($text: String, $limit: Int) { search(text: $text, limit: $limit) { id } }",
            "query.graphql",
        )
        .unwrap();
        let variables = bjson!({ "text": "shorts" });
        let tree = TreeBuilder::new(&document)
            .variables(variables.as_object().unwrap())
            .build(Some("Search"))
            .unwrap();
        assert_eq!(
            tree,
            node(json!({ "search": { "__args": { "text": "shorts", "limit": null }, "id": {} } }))
        );
    }

    #[test]
    fn missing_variables_take_their_default_value() {
        let document = ast::Document::parse(
            "query Search($limit: Int = 5, $sort: Sort = PRICE) { search(limit: $limit, sort: $sort) { id } }",
            "query.graphql",
        )
        .unwrap();
        let tree = TreeBuilder::new(&document).build(None).unwrap();
        assert_eq!(
            tree,
            node(json!({
                "search": {
                    "__args": { "limit": 5, "sort": "PRICE" },
                    "__enumArgs": ["sort"],
                    "id": {}
                }
            }))
        );

        let variables = bjson!({ "limit": 12 });
        let tree = TreeBuilder::new(&document)
            .variables(variables.as_object().unwrap())
            .build(None)
            .unwrap();
        let args = tree.field("search").unwrap().args().unwrap();
        assert_eq!(args.get("limit"), Some(&bjson!(12)));
    }

    #[test]
    fn it_records_enum_argument_paths() {
        let tree = build("{ search(sort: NAME, filter: { status: [ACTIVE], text: \"a\" }) { id } }");
        let search = tree.field("search").unwrap();
        assert_eq!(
            search.enum_args().iter().collect::<Vec<_>>(),
            vec!["filter.status", "sort"]
        );
    }

    #[test]
    fn enum_variables_are_recognized_with_a_schema() {
        let schema = crate::query::parse_schema(
            "enum Sort { NAME PRICE } type Query { search(sort: Sort, text: String): [String] }",
        )
        .unwrap();
        let document = ast::Document::parse(
            "query Search($sort: Sort, $text: String) { search(sort: $sort, text: $text) }",
            "query.graphql",
        )
        .unwrap();
        let variables = bjson!({ "sort": "NAME", "text": "NAME" });
        let tree = TreeBuilder::new(&document)
            .variables(variables.as_object().unwrap())
            .schema(&schema)
            .build(None)
            .unwrap();
        let search = tree.field("search").unwrap();
        assert_eq!(
            search.enum_args().iter().collect::<Vec<_>>(),
            vec!["sort"]
        );
    }

    #[test]
    fn it_expands_named_fragments_and_untyped_inline_fragments() {
        let tree = build(
            r#"
            query { search { ...Details ... { label } } }
            fragment Details on ConfigSearch { id }
            "#,
        );
        assert_eq!(
            tree,
            node(json!({
                "search": {
                    "label": {},
                    "__on": [{ "__fragmentName": "ConfigSearch", "id": {} }]
                }
            }))
        );
    }

    #[test]
    fn it_drops_statically_skipped_selections() {
        let tree = build("{ search { id @skip(if: true) name @include(if: false) label } }");
        assert_eq!(tree, node(json!({ "search": { "label": {} } })));
    }

    #[test]
    fn it_selects_operations_by_name() {
        let document =
            ast::Document::parse("query A { a } query B { b }", "query.graphql").unwrap();
        let builder = TreeBuilder::new(&document);
        assert_eq!(builder.build(None).unwrap(), node(json!({ "a": {} })));
        assert_eq!(builder.build(Some("B")).unwrap(), node(json!({ "b": {} })));
        assert_eq!(
            builder.build(Some("C")),
            Err(QueryError::UnknownOperation("C".to_string()))
        );
    }

    #[test]
    fn it_enforces_the_recursion_limit() {
        let document =
            ast::Document::parse("{ a { b { c { d } } } }", "query.graphql").unwrap();
        let result = TreeBuilder::new(&document).recursion_limit(2).build(None);
        assert_eq!(result, Err(QueryError::RecursionLimitExceeded(2)));
    }
}
