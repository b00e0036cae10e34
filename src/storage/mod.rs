//! Transactional storage for the agenda workflow.
//!
//! This module provides the `Repository` trait with in-memory and file-based
//! backends. Every write goes through an atomic `WriteBatch` commit.

pub mod batch;
pub mod file;
pub mod memory;
pub mod state;
pub mod traits;

pub use batch::{Write, WriteBatch};
pub use file::FileRepository;
pub use memory::MemoryRepository;
pub use state::{RepositoryState, STATE_SCHEMA_VERSION};
pub use traits::Repository;
