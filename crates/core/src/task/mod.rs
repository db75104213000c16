//! Task module
//!
//! This module contains the task record, the query pipeline and both
//! storage backends.

mod file_store;
mod model;
mod mongo_store;
pub mod query;
mod repository;

pub use file_store::FileTaskStore;
pub use model::*;
pub use mongo_store::{MongoConfig, MongoTaskStore};
pub use query::{GroupCount, GroupField, Page, SortField, SortOrder, TaskFilter, TaskSort};
pub use repository::TaskRepository;
