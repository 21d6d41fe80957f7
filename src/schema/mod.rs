//! Live resource schema: retrieval, lookup and prompt grounding.
//!
//! Documents are request-scoped; nothing is cached between fetches.

pub mod grounding;
pub mod resolver;
pub mod tree;

pub use grounding::SchemaGrounding;
pub use resolver::{SchemaResolver, SchemaSource, find_resource_names, get_resource_schema};
pub use tree::{ResourceSchemaFragment, SchemaDocument, SchemaNode};
