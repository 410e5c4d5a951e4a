pub mod resolve;
pub mod types;

pub use resolve::SchemaResolver;
pub use types::{CanonicalField, DateSource, FieldBinding};
