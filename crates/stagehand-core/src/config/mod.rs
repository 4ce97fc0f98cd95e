//! Step configuration: types and input resolution.

pub mod resolver;
pub mod types;

pub use resolver::ConfigResolver;
pub use types::{ActionConfiguration, BinaryDescriptor, ToolVersion};
