//! Parsing and validation of request documents.

use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::parser::Parser;
use apollo_compiler::validation::Valid;

use crate::error::QueryError;
use crate::tree::builder::DEFAULT_RECURSION_LIMIT;

const QUERY_PATH: &str = "query.graphql";
const SCHEMA_PATH: &str = "schema.graphql";
const INTROSPECTION_FIELDS: [&str; 2] = ["__schema", "__type"];

/// Parses a request document, checking its syntax only.
pub fn parse(source: &str) -> Result<ast::Document, QueryError> {
    parse_with_limit(source, DEFAULT_RECURSION_LIMIT)
}

pub(crate) fn parse_with_limit(
    source: &str,
    recursion_limit: usize,
) -> Result<ast::Document, QueryError> {
    let mut parser = Parser::new().recursion_limit(recursion_limit);
    let result = parser.parse_ast(source, QUERY_PATH);

    let recursion_limit = parser.recursion_reached();
    tracing::trace!(?recursion_limit, "recursion limit data");

    result.map_err(|invalid| QueryError::Parse(invalid.errors.to_string()))
}

/// Parses a request document and validates it against `schema`.
pub fn parse_and_validate(
    schema: &Valid<Schema>,
    source: &str,
) -> Result<ast::Document, QueryError> {
    let document = parse(source)?;
    validate(schema, &document)?;
    Ok(document)
}

pub(crate) fn validate(schema: &Valid<Schema>, document: &ast::Document) -> Result<(), QueryError> {
    document
        .to_executable_validate(schema)
        .map(|_| ())
        .map_err(|invalid| QueryError::Validation(invalid.errors.to_string()))
}

/// Parses and validates a schema definition.
pub fn parse_schema(sdl: &str) -> Result<Valid<Schema>, QueryError> {
    Schema::parse_and_validate(sdl, SCHEMA_PATH)
        .map_err(|invalid| QueryError::InvalidSchema(invalid.errors.to_string()))
}

/// True when `operation` selects `__schema` or `__type` at its root.
///
/// Such requests are answered by the upstream schema as is, without any reshaping.
pub fn is_introspection(operation: &ast::OperationDefinition) -> bool {
    selects_introspection(&operation.selection_set)
}

fn selects_introspection(selections: &[ast::Selection]) -> bool {
    selections.iter().any(|selection| match selection {
        ast::Selection::Field(field) => INTROSPECTION_FIELDS.contains(&field.name.as_str()),
        ast::Selection::InlineFragment(inline_fragment) => {
            selects_introspection(&inline_fragment.selection_set)
        }
        ast::Selection::FragmentSpread(_) => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::builder::TreeBuilder;

    const SCHEMA: &str = r#"
        type Query {
            searchProducts(text: String, limit: Int): ProductSearchResult
        }
        type ProductSearchResult {
            total: Int
            results: [Product]
        }
        type Product {
            id: ID!
            sku: String
        }
    "#;

    #[test]
    fn it_parses_documents() {
        let document = parse("{ searchProducts { total } }").unwrap();
        assert_eq!(document.definitions.len(), 1);
        assert!(matches!(parse("{ searchProducts { total }"), Err(QueryError::Parse(_))));
    }

    #[test]
    fn it_validates_documents_against_the_schema() {
        let schema = parse_schema(SCHEMA).unwrap();
        assert!(parse_and_validate(&schema, r#"{ searchProducts(text: "a") { total } }"#).is_ok());
        let error = parse_and_validate(&schema, "{ searchProducts { price } }").unwrap_err();
        assert!(matches!(error, QueryError::Validation(_)));
        assert!(error.to_string().contains("price"));
    }

    #[test]
    fn it_rejects_invalid_schemas() {
        assert!(matches!(
            parse_schema("type Query { search: Unknown }"),
            Err(QueryError::InvalidSchema(_))
        ));
    }

    fn operation(source: &str, name: Option<&str>) -> bool {
        let document = parse(source).unwrap();
        let operation = TreeBuilder::new(&document).operation(name).unwrap();
        is_introspection(operation)
    }

    #[test]
    fn it_detects_introspection() {
        assert!(operation("{ __schema { types { name } } }", None));
        assert!(operation(
            r#"query { ... { __type(name: "Product") { name } } }"#,
            None
        ));
        assert!(!operation("{ searchProducts { __typename total } }", None));
    }

    #[test]
    fn introspection_is_detected_on_the_selected_operation() {
        let source = "query A { __schema { queryType { name } } } query B { searchProducts { total } }";
        assert!(operation(source, Some("A")));
        assert!(!operation(source, Some("B")));
    }
}
