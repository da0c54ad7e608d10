//! Rewrites GraphQL requests for an upstream schema and maps the upstream responses back to the
//! shape the client asked for.

pub mod arguments;
mod configuration;
pub mod error;
mod executable;
pub mod json_ext;
pub mod mapper;
pub mod query;
mod reshaper;
pub mod resolver;
pub mod rules;
pub mod transform;
pub mod tree;

pub use arguments::ArgumentTransform;
pub use arguments::ArgumentsTransformer;
pub use configuration::Configuration;
pub use configuration::Limits;
pub use configuration::generate_config_schema;
pub use executable::main;
pub use mapper::FieldMapper;
pub use mapper::MapperTable;
pub use mapper::ResponseMapper;
pub use reshaper::ReshapedRequest;
pub use reshaper::Reshaper;
pub use rules::TransformRuleset;
pub use transform::ObjectTransformer;
pub use tree::Fragment;
pub use tree::FragmentTag;
pub use tree::QueryNode;
pub use tree::builder::TreeBuilder;
pub use tree::printer::print;
