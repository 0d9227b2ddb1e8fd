//! Search projection
//!
//! Maps a plan onto a joined document tree and keeps that tree in step with
//! the canonical store.
//!
//! ```text
//! ChangeEvent ─▶ DocumentIndexer ─▶ mapper::flatten ─▶ SearchIndex::upsert
//!            └─▶ DescendantDeletor ─▶ children_of / delete (children first)
//! ```

pub mod deletor;
pub mod document;
pub mod indexer;
pub mod mapper;
pub mod mongo;
pub mod store;

pub use deletor::DescendantDeletor;
pub use document::{IndexNode, JoinRelation, NodeKind, SearchDocument};
pub use indexer::DocumentIndexer;
pub use mapper::flatten;
pub use mongo::MongoSearchIndex;
pub use store::{MemorySearchIndex, SearchIndex};
