//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define project-file data access contracts used by books.
//! - Isolate SQLite query details from lifecycle orchestration.
//!
//! # Invariants
//! - Repositories only accept connections migrated to the current schema.

pub mod project_repo;
