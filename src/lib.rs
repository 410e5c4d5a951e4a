pub mod config;
pub mod discover;
pub mod duck;
pub mod process;
pub mod record;
pub mod schema;

pub use config::PipelineConfig;
pub use record::{CanonicalRecord, RawRow, SourceDescriptor};
