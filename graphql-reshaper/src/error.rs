//! Reshaper errors.
use displaydoc::Display;
use thiserror::Error;

pub use crate::configuration::ConfigurationError;

/// GraphQL parsing errors.
#[derive(Error, Debug, Display, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QueryError {
    /// parsing error: {0}
    Parse(String),
    /// invalid schema: {0}
    InvalidSchema(String),
    /// validation error: {0}
    Validation(String),
    /// unknown operation named "{0}"
    UnknownOperation(String),
    /// the document does not contain any operation
    NoOperation,
    /// unknown fragment named "{0}"
    UnknownFragment(String),
    /// selection processing recursion limit({0}) exceeded
    RecursionLimitExceeded(usize),
}

/// Errors raised while transforming arguments.
#[derive(Error, Debug, Display, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ArgumentError {
    /// argument '{argument}' is required on field '{field}' but has no transform
    MissingTransform {
        /// The field declaring the required argument.
        field: String,
        /// The required argument.
        argument: String,
    },
}

/// Errors raised while mapping an upstream response.
#[derive(Error, Debug, Display, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MapperError {
    /// no mapper registered for root field '{field}'
    MissingMapper {
        /// The logical name of the root field.
        field: String,
    },
}

/// Error types for the request pipeline.
#[derive(Error, Debug, Display)]
#[non_exhaustive]
pub enum ReshapeError {
    /// {0}
    Query(#[from] QueryError),
    /// {0}
    Argument(#[from] ArgumentError),
    /// {0}
    Mapper(#[from] MapperError),
    /// every root field was removed by the transform rules
    EmptyQuery,
}
