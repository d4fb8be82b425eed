pub mod directory;
pub mod parser;
pub mod payload;
pub mod pipeline;
pub mod recipient;
pub mod reporter;
pub mod sender;

pub use directory::{DirectoryStore, MemoryDirectory, PgDirectory};
pub use pipeline::{NotificationPipeline, PipelineSettings};
