//! File-based task storage implementation
//!
//! Stores every task in one JSON document on disk:
//! `{ "tasks": [...], "nextId": n }`. Each operation reads the whole document
//! and each mutation rewrites it once. Mutations inside this process are
//! serialized; writers in other processes are not coordinated with and the
//! last write wins.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;

use super::model::{NewTask, Task, TaskId, TaskPatch};
use super::query::{self, GroupCount, GroupField, Page, TaskFilter, TaskSort};
use super::repository::TaskRepository;
use crate::backend::BackendKind;
use crate::{Error, Result};

fn first_id() -> u64 {
    1
}

/// On-disk document layout
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskDocument {
    #[serde(default)]
    tasks: Vec<Task>,
    /// Kept for compatibility with existing data files
    #[serde(default = "first_id")]
    next_id: u64,
}

impl Default for TaskDocument {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            next_id: first_id(),
        }
    }
}

async fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    fs::write(path, bytes).await?;
    Ok(())
}

/// File-based task store using a single JSON document
pub struct FileTaskStore {
    /// Path to the JSON file
    path: PathBuf,
    /// Held across read-modify-write
    write_lock: Mutex<()>,
}

impl FileTaskStore {
    /// Create a new FileTaskStore
    ///
    /// If the file doesn't exist, it is created with an empty document.
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !fs::try_exists(&path).await? {
            write_json_pretty(&path, &TaskDocument::default()).await?;
            tracing::info!("Created task data file at {:?}", path);
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Path to the backing document
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<TaskDocument> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(TaskDocument::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_document(&self, document: &TaskDocument) -> Result<()> {
        write_json_pretty(&self.path, document).await
    }
}

#[async_trait]
impl TaskRepository for FileTaskStore {
    fn kind(&self) -> BackendKind {
        BackendKind::File
    }

    async fn create(&self, new_task: NewTask) -> Result<Task> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        let task = Task::from_new(new_task);
        if document.tasks.iter().any(|t| t.id == task.id) {
            return Err(Error::Storage(format!(
                "Task with ID {} already exists",
                task.id
            )));
        }
        document.tasks.push(task.clone());
        self.write_document(&document).await?;
        Ok(task)
    }

    async fn get(&self, id: &TaskId) -> Result<Option<Task>> {
        let document = self.read_document().await?;
        Ok(document.tasks.into_iter().find(|t| &t.id == id))
    }

    async fn find(
        &self,
        filter: &TaskFilter,
        sort: TaskSort,
        page: Option<Page>,
    ) -> Result<Vec<Task>> {
        let document = self.read_document().await?;
        let mut tasks = query::apply_filter(document.tasks, filter);
        query::apply_sort(&mut tasks, sort);
        Ok(match page {
            Some(page) => query::apply_page(tasks, page),
            None => tasks,
        })
    }

    async fn count(&self, filter: &TaskFilter) -> Result<u64> {
        let document = self.read_document().await?;
        Ok(document.tasks.iter().filter(|t| filter.matches(t)).count() as u64)
    }

    async fn aggregate_count(&self, field: GroupField) -> Result<Vec<GroupCount>> {
        let document = self.read_document().await?;
        Ok(query::group_counts(&document.tasks, field))
    }

    async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        let task = document
            .tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        task.apply(&patch);
        let updated = task.clone();
        self.write_document(&document).await?;
        Ok(updated)
    }

    async fn delete(&self, id: &TaskId) -> Result<Task> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        let index = document
            .tasks
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        let removed = document.tasks.remove(index);
        self.write_document(&document).await?;
        Ok(removed)
    }

    async fn bulk_update(&self, ids: &[TaskId], patch: TaskPatch) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        let wanted: HashSet<&TaskId> = ids.iter().collect();
        let mut modified = 0;
        for task in document.tasks.iter_mut().filter(|t| wanted.contains(&t.id)) {
            task.apply(&patch);
            modified += 1;
        }
        if modified > 0 {
            self.write_document(&document).await?;
        }
        Ok(modified)
    }

    async fn bulk_delete(&self, ids: &[TaskId]) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        let wanted: HashSet<&TaskId> = ids.iter().collect();
        let before = document.tasks.len();
        document.tasks.retain(|t| !wanted.contains(&t.id));
        let removed = (before - document.tasks.len()) as u64;
        if removed > 0 {
            self.write_document(&document).await?;
        }
        Ok(removed)
    }
}
