//! Task API endpoints
//!
//! Translates HTTP requests into calls on the bound `TaskRepository`.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use todo_core::task::{
    Category, GroupCount, GroupField, Page, Priority, SortField, SortOrder, Task, TaskFilter,
    TaskId, TaskPatch, TaskSort,
};
use todo_core::Error;

use super::{error_response, ApiError};
use crate::state::AppState;
use crate::validation::{CreateTaskRequest, UpdateTaskRequest};

const DEFAULT_PAGE_SIZE: u64 = 50;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksQuery {
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub completed: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_order: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRequest {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub task_ids: Option<Vec<String>>,
}

/// Success envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_tasks: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Serialize)]
pub struct ListTasksResponse {
    pub success: bool,
    pub data: Vec<Task>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: u64,
    pub completed: u64,
    pub pending: u64,
    pub overdue: u64,
    pub priority_breakdown: Vec<GroupCount>,
    pub category_breakdown: Vec<GroupCount>,
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|value| !value.trim().is_empty())
}

impl ListTasksQuery {
    fn into_parts(self) -> Result<(TaskFilter, TaskSort, Page), String> {
        let mut filter = TaskFilter::default();
        if let Some(completed) = non_empty(self.completed) {
            filter.completed = Some(completed == "true");
        }
        if let Some(raw) = non_empty(self.priority) {
            filter.priority = Some(raw.parse::<Priority>().map_err(|e| e.to_string())?);
        }
        if let Some(raw) = non_empty(self.category) {
            filter.category = Some(raw.parse::<Category>().map_err(|e| e.to_string())?);
        }
        filter.search = non_empty(self.search);

        let field = match non_empty(self.sort_by) {
            Some(raw) => raw.parse::<SortField>().map_err(|e| e.to_string())?,
            None => SortField::CreatedAt,
        };
        let order = match self.sort_order.as_deref() {
            Some("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        };

        let page = Page::new(
            self.page.unwrap_or(1),
            self.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        );
        Ok((filter, TaskSort::new(field, order), page))
    }
}

/// Extractor rejections share the failure envelope
fn bad_request(message: String) -> ApiError {
    error_response(StatusCode::BAD_REQUEST, message)
}

/// Not-found becomes 404; anything else is logged and reported generically
fn storage_failure(context: &str, err: Error) -> ApiError {
    if err.is_not_found() {
        return error_response(StatusCode::NOT_FOUND, "Task not found");
    }
    tracing::error!("Error {}: {}", context, err);
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Failed to {}", context),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/tasks - Filtered, sorted, paginated listing
async fn list_tasks(
    State(state): State<AppState>,
    query: Result<Query<ListTasksQuery>, QueryRejection>,
) -> Result<Json<ListTasksResponse>, ApiError> {
    let Query(query) = query.map_err(|e| bad_request(e.body_text()))?;
    let (filter, sort, page) = query
        .into_parts()
        .map_err(|msg| error_response(StatusCode::BAD_REQUEST, msg))?;

    let store = state.task_store();
    let total = store
        .count(&filter)
        .await
        .map_err(|e| storage_failure("fetch tasks", e))?;
    let tasks = store
        .find(&filter, sort, Some(page))
        .await
        .map_err(|e| storage_failure("fetch tasks", e))?;

    let pagination = Pagination {
        current_page: page.page(),
        total_pages: total.div_ceil(page.limit()),
        total_tasks: total,
        has_next: page.skip() + (tasks.len() as u64) < total,
        has_prev: page.page() > 1,
    };

    Ok(Json(ListTasksResponse {
        success: true,
        data: tasks,
        pagination,
    }))
}

/// GET /api/tasks/stats - Totals and per-field breakdowns
async fn task_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<TaskStats>>, ApiError> {
    let store = state.task_store();
    let fail = |e| storage_failure("fetch statistics", e);

    let total = store.count(&TaskFilter::default()).await.map_err(fail)?;
    let completed = store
        .count(&TaskFilter::default().with_completed(true))
        .await
        .map_err(fail)?;
    let priority_breakdown = store
        .aggregate_count(GroupField::Priority)
        .await
        .map_err(fail)?;
    let category_breakdown = store
        .aggregate_count(GroupField::Category)
        .await
        .map_err(fail)?;
    let overdue = store
        .count(
            &TaskFilter::default()
                .with_due_before(Utc::now())
                .with_completed(false),
        )
        .await
        .map_err(fail)?;

    Ok(Json(ApiResponse::ok(TaskStats {
        total,
        completed,
        pending: total.saturating_sub(completed),
        overdue,
        priority_breakdown,
        category_breakdown,
    })))
}

/// GET /api/tasks/:id - Get a single task
async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Task>>, ApiError> {
    let task = state
        .task_store()
        .get(&TaskId::from(id))
        .await
        .map_err(|e| storage_failure("fetch task", e))?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Task not found"))?;

    Ok(Json(ApiResponse::ok(task)))
}

/// POST /api/tasks - Create a new task
async fn create_task(
    State(state): State<AppState>,
    req: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Task>>), ApiError> {
    let Json(req) = req.map_err(|e| bad_request(e.body_text()))?;
    let new_task = req
        .into_new_task()
        .map_err(|msg| error_response(StatusCode::BAD_REQUEST, msg))?;

    let created = state
        .task_store()
        .create(new_task)
        .await
        .map_err(|e| storage_failure("create task", e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(created).with_message("Task created successfully")),
    ))
}

/// PUT /api/tasks/:id - Merge the given fields into a task
async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    req: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Task>>, ApiError> {
    let Json(req) = req.map_err(|e| bad_request(e.body_text()))?;
    let patch = req
        .into_patch()
        .map_err(|msg| error_response(StatusCode::BAD_REQUEST, msg))?;

    let updated = state
        .task_store()
        .update(&TaskId::from(id), patch)
        .await
        .map_err(|e| storage_failure("update task", e))?;

    Ok(Json(
        ApiResponse::ok(updated).with_message("Task updated successfully"),
    ))
}

/// DELETE /api/tasks/:id - Delete a task
async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Task>>, ApiError> {
    let deleted = state
        .task_store()
        .delete(&TaskId::from(id))
        .await
        .map_err(|e| storage_failure("delete task", e))?;

    Ok(Json(
        ApiResponse::ok(deleted).with_message("Task deleted successfully"),
    ))
}

/// POST /api/tasks/bulk - complete, reopen or delete many tasks
async fn bulk_operation(
    State(state): State<AppState>,
    req: Result<Json<BulkRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let Json(req) = req.map_err(|e| bad_request(e.body_text()))?;
    let (action, raw_ids) = match (req.action, req.task_ids) {
        (Some(action), Some(ids)) if !action.is_empty() => (action, ids),
        _ => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "Action and taskIds array are required",
            ))
        }
    };
    let ids: Vec<TaskId> = raw_ids.into_iter().map(TaskId::from).collect();
    let store = state.task_store();
    let fail = |e| storage_failure("perform bulk operation", e);

    let data = match action.as_str() {
        "complete" | "incomplete" => {
            let patch = TaskPatch::completed(action == "complete");
            let modified = store.bulk_update(&ids, patch).await.map_err(fail)?;
            json!({ "modifiedCount": modified })
        }
        "delete" => {
            let deleted = store.bulk_delete(&ids).await.map_err(fail)?;
            json!({ "deletedCount": deleted })
        }
        _ => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "Invalid action. Use 'complete', 'incomplete', or 'delete'",
            ))
        }
    };

    tracing::info!("Bulk {} applied to {} requested tasks", action, ids.len());

    let message = format!("Bulk {} operation completed successfully", action);
    Ok(Json(ApiResponse::ok(data).with_message(message)))
}

// ============================================================================
// Router
// ============================================================================

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/stats", get(task_stats))
        .route("/api/tasks/bulk", post(bulk_operation))
        .route(
            "/api/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
}
