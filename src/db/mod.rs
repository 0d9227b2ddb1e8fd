//! MongoDB persistence layer

pub mod mongo;
pub mod schemas;

pub use mongo::{is_duplicate_key, redact_uri, IntoIndexes, MongoClient, MongoCollection, MutMetadata};
