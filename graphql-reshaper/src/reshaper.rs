//! Request rewriting and response mapping pipeline.

use std::sync::Arc;

use apollo_compiler::Schema;
use apollo_compiler::validation::Valid;
use serde::Serialize;

use crate::arguments::ArgumentTransform;
use crate::arguments::ArgumentsTransformer;
use crate::configuration::Configuration;
use crate::error::ReshapeError;
use crate::json_ext::Object;
use crate::mapper::MapperTable;
use crate::mapper::ResponseMapper;
use crate::query;
use crate::transform::ObjectTransformer;
use crate::tree::QueryNode;
use crate::tree::builder::TreeBuilder;
use crate::tree::printer;

/// A request rewritten for the upstream schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReshapedRequest {
    /// The tree of the request as received.
    pub original: QueryNode,
    /// The tree sent upstream.
    pub transformed: QueryNode,
    /// The text of the upstream request.
    pub query: String,
    /// Introspection requests are forwarded unchanged.
    pub introspection: bool,
}

/// Rewrites requests with the configured rules and maps the upstream responses back.
#[derive(Debug, Clone)]
pub struct Reshaper {
    transformer: ObjectTransformer,
    arguments: ArgumentsTransformer,
    mapper: ResponseMapper,
    schema: Option<Arc<Valid<Schema>>>,
    recursion_limit: usize,
}

#[buildstructor::buildstructor]
impl Reshaper {
    /// Without a schema, requests are only checked for syntax errors.
    #[builder]
    pub fn new(
        configuration: Option<Configuration>,
        mappers: Option<MapperTable>,
        schema: Option<Arc<Valid<Schema>>>,
    ) -> Self {
        let configuration = configuration.unwrap_or_default();
        Self {
            arguments: ArgumentsTransformer::from_config(&configuration.arguments),
            recursion_limit: configuration.limits.recursion_limit,
            transformer: ObjectTransformer::new(configuration.rules),
            mapper: ResponseMapper::new(mappers.unwrap_or_default()),
            schema,
        }
    }
}

impl Reshaper {
    /// Registers a custom transform of the `name` argument, replacing the configured one.
    pub fn with_argument_transform(
        mut self,
        name: impl Into<String>,
        transform: impl ArgumentTransform + 'static,
    ) -> Self {
        self.arguments = self.arguments.with_transform(name, transform);
        self
    }

    /// Parses `source` and rewrites the selected operation for the upstream schema.
    #[tracing::instrument(level = "debug", skip(self, source, variables))]
    pub fn reshape(
        &self,
        source: &str,
        operation_name: Option<&str>,
        variables: &Object,
    ) -> Result<ReshapedRequest, ReshapeError> {
        let document = query::parse_with_limit(source, self.recursion_limit)?;
        if let Some(schema) = &self.schema {
            query::validate(schema, &document)?;
        }

        let mut builder = TreeBuilder::new(&document)
            .variables(variables)
            .recursion_limit(self.recursion_limit);
        if let Some(schema) = &self.schema {
            builder = builder.schema(schema);
        }
        let operation = builder.operation(operation_name)?;
        let original = builder.build_operation(operation)?;

        if query::is_introspection(operation) {
            tracing::debug!("forwarding introspection request");
            return Ok(ReshapedRequest {
                transformed: original.clone(),
                original,
                query: source.to_string(),
                introspection: true,
            });
        }

        let mut transformed = original.clone();
        if self.transformer.transform(&mut transformed) {
            return Err(ReshapeError::EmptyQuery);
        }
        self.arguments.transform_recursive(&mut transformed, "")?;

        let query = printer::print_operation(&transformed, operation.operation_type);
        tracing::debug!(%query, "reshaped request");
        Ok(ReshapedRequest {
            original,
            transformed,
            query,
            introspection: false,
        })
    }

    /// Builds the response to the original request from the upstream `data`.
    ///
    /// Responses to introspection requests are returned as is.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn map_response(
        &self,
        request: &ReshapedRequest,
        data: &Object,
    ) -> Result<Object, ReshapeError> {
        if request.introspection {
            return Ok(data.clone());
        }
        Ok(self.mapper.map(&request.original, data)?)
    }
}
