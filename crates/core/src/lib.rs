//! Core library for the todo service
//!
//! This crate contains the storage side of the service:
//! - The task record model
//! - The query pipeline (filter, sort, paginate, group-count)
//! - The `TaskRepository` contract with file and MongoDB backends
//! - Backend selection at startup

pub mod backend;
pub mod error;
pub mod task;

pub use backend::{open_repository, BackendKind, StorageConfig};
pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
