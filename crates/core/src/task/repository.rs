//! Task repository trait
//!
//! Defines the storage contract shared by every backend. Callers are written
//! once against this trait and never learn which medium is bound.

use async_trait::async_trait;

use super::model::{NewTask, Task, TaskId, TaskPatch};
use super::query::{GroupCount, GroupField, Page, TaskFilter, TaskSort};
use crate::backend::BackendKind;
use crate::Result;

/// Repository interface for task storage
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Which medium backs this repository
    fn kind(&self) -> BackendKind;

    /// Store a new task with a fresh id and timestamps
    async fn create(&self, new_task: NewTask) -> Result<Task>;

    /// Get a task by ID
    async fn get(&self, id: &TaskId) -> Result<Option<Task>>;

    /// Filter, sort and optionally paginate
    async fn find(&self, filter: &TaskFilter, sort: TaskSort, page: Option<Page>)
        -> Result<Vec<Task>>;

    /// Number of tasks matching the filter
    async fn count(&self, filter: &TaskFilter) -> Result<u64>;

    /// Group all tasks by one field and count each group
    async fn aggregate_count(&self, field: GroupField) -> Result<Vec<GroupCount>>;

    /// Merge a patch into one task; `Error::TaskNotFound` if absent
    async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task>;

    /// Remove one task and return it; `Error::TaskNotFound` if absent
    async fn delete(&self, id: &TaskId) -> Result<Task>;

    /// Merge a patch into every existing task in `ids`, returning how many changed
    async fn bulk_update(&self, ids: &[TaskId], patch: TaskPatch) -> Result<u64>;

    /// Remove every task in `ids`, returning how many were removed
    async fn bulk_delete(&self, ids: &[TaskId]) -> Result<u64>;
}
