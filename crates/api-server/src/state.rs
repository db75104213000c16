//! Application state

use std::sync::Arc;

use todo_core::task::TaskRepository;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    task_store: Arc<dyn TaskRepository>,
    environment: String,
}

impl AppState {
    /// Create a new AppState around an already selected task backend
    pub fn new(task_store: Arc<dyn TaskRepository>, environment: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                task_store,
                environment: environment.into(),
            }),
        }
    }

    /// Get reference to the task store
    pub fn task_store(&self) -> &dyn TaskRepository {
        self.inner.task_store.as_ref()
    }

    pub fn environment(&self) -> &str {
        &self.inner.environment
    }
}
