mod collection;
pub mod in_memory_repository;
pub mod json_file_repository;

// Re-export every repository type
pub use in_memory_repository::{InMemoryRecordRepository, InMemorySchemaRepository};
pub use json_file_repository::{JsonFileRecordRepository, JsonFileSchemaRepository};
