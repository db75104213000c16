//! MongoDB task storage implementation
//!
//! Delegates the repository contract to the database's own query engine.
//! Records keep the same field names as the file backend; dates are stored
//! as BSON dates so range and sort queries work natively.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Bson, Document};
use mongodb::options::{ClientOptions, Credential, ReturnDocument};
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize};

use super::model::{Category, NewTask, Priority, Task, TaskId, TaskPatch};
use super::query::{GroupCount, GroupField, Page, SortOrder, TaskFilter, TaskSort};
use super::repository::TaskRepository;
use crate::backend::BackendKind;
use crate::{Error, Result};

/// Connection settings for the document database
#[derive(Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub server_selection_timeout: Duration,
}

impl MongoConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: "todo".to_string(),
            collection: "tasks".to_string(),
            username: None,
            password: None,
            server_selection_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

impl fmt::Debug for MongoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoConfig")
            .field("database", &self.database)
            .field("collection", &self.collection)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("server_selection_timeout", &self.server_selection_timeout)
            .finish_non_exhaustive()
    }
}

/// Stored shape of a task inside the collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MongoTask {
    #[serde(rename = "_id")]
    id: Bson,
    #[serde(rename = "task")]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    priority: Priority,
    #[serde(default)]
    category: Category,
    #[serde(default)]
    due_date: Option<bson::DateTime>,
    #[serde(default)]
    tags: Vec<String>,
    created_at: bson::DateTime,
    updated_at: bson::DateTime,
}

fn to_bson_date(value: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(value.timestamp_millis())
}

fn from_bson_date(value: bson::DateTime) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(value.timestamp_millis())
        .ok_or_else(|| Error::Storage(format!("Date out of range: {}", value)))
}

/// Records written by older deployments may carry ObjectId keys
fn id_from_bson(id: Bson) -> TaskId {
    match id {
        Bson::String(s) => TaskId::from(s),
        Bson::ObjectId(oid) => TaskId::from(oid.to_hex()),
        other => TaskId::from(other.to_string()),
    }
}

/// Every stored form an id may take; a string that is not an ObjectId just
/// matches nothing in that form
fn id_candidates(id: &TaskId) -> Vec<Bson> {
    let mut candidates = vec![Bson::String(id.to_string())];
    if let Ok(oid) = ObjectId::parse_str(id.as_str()) {
        candidates.push(Bson::ObjectId(oid));
    }
    candidates
}

fn id_filter(id: &TaskId) -> Document {
    doc! { "_id": { "$in": id_candidates(id) } }
}

fn ids_filter(ids: &[TaskId]) -> Document {
    let candidates: Vec<Bson> = ids.iter().flat_map(id_candidates).collect();
    doc! { "_id": { "$in": candidates } }
}

impl From<&Task> for MongoTask {
    fn from(task: &Task) -> Self {
        Self {
            id: Bson::String(task.id.to_string()),
            title: task.title.clone(),
            description: task.description.clone(),
            completed: task.completed,
            priority: task.priority,
            category: task.category,
            due_date: task.due_date.map(to_bson_date),
            tags: task.tags.clone(),
            created_at: to_bson_date(task.created_at),
            updated_at: to_bson_date(task.updated_at),
        }
    }
}

impl TryFrom<MongoTask> for Task {
    type Error = Error;

    fn try_from(stored: MongoTask) -> Result<Self> {
        Ok(Self {
            id: id_from_bson(stored.id),
            title: stored.title,
            description: stored.description,
            completed: stored.completed,
            priority: stored.priority,
            category: stored.category,
            due_date: stored.due_date.map(from_bson_date).transpose()?,
            tags: stored.tags,
            created_at: from_bson_date(stored.created_at)?,
            updated_at: from_bson_date(stored.updated_at)?,
        })
    }
}

fn escape_regex(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(
            c,
            '\\' | '^' | '$' | '.' | '|' | '?' | '*' | '+' | '(' | ')' | '[' | ']' | '{' | '}'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn filter_document(filter: &TaskFilter) -> Document {
    let mut query = Document::new();
    if let Some(completed) = filter.completed {
        query.insert("completed", completed);
    }
    if let Some(priority) = filter.priority {
        query.insert("priority", priority.as_str());
    }
    if let Some(category) = filter.category {
        query.insert("category", category.as_str());
    }
    if let Some(due_before) = filter.due_before {
        query.insert("dueDate", doc! { "$lt": to_bson_date(due_before) });
    }
    if let Some(term) = filter.search_term() {
        let pattern = escape_regex(term);
        let clauses: Vec<Document> = ["task", "description", "tags"]
            .iter()
            .map(|field| {
                let mut clause = Document::new();
                clause.insert(*field, doc! { "$regex": pattern.as_str(), "$options": "i" });
                clause
            })
            .collect();
        query.insert("$or", clauses);
    }
    query
}

fn sort_document(sort: TaskSort) -> Document {
    let direction = match sort.order {
        SortOrder::Asc => 1,
        SortOrder::Desc => -1,
    };
    let mut ordering = Document::new();
    ordering.insert(sort.field.field_name(), direction);
    // Ids start with the creation millis, so ties only approximate insertion
    // order: ids minted in the same millisecond order by their random suffix,
    // unlike the stable in-memory sort of the file backend
    ordering.insert("_id", 1);
    ordering
}

fn set_document(patch: &TaskPatch, now: DateTime<Utc>) -> Document {
    let mut set = Document::new();
    if let Some(title) = &patch.title {
        set.insert("task", title.as_str());
    }
    if let Some(description) = &patch.description {
        set.insert("description", description.as_str());
    }
    if let Some(completed) = patch.completed {
        set.insert("completed", completed);
    }
    if let Some(priority) = patch.priority {
        set.insert("priority", priority.as_str());
    }
    if let Some(category) = patch.category {
        set.insert("category", category.as_str());
    }
    if let Some(due_date) = patch.due_date {
        set.insert(
            "dueDate",
            due_date.map(to_bson_date).map(Bson::DateTime).unwrap_or(Bson::Null),
        );
    }
    if let Some(tags) = &patch.tags {
        set.insert("tags", tags.clone());
    }
    set.insert("updatedAt", to_bson_date(now));
    doc! { "$set": set }
}

fn group_count_from_document(mut group: Document) -> GroupCount {
    let value = group.remove("_id").unwrap_or(Bson::Null).into_relaxed_extjson();
    let count = match group.get("count") {
        Some(Bson::Int32(n)) => (*n).max(0) as u64,
        Some(Bson::Int64(n)) => (*n).max(0) as u64,
        Some(Bson::Double(n)) => n.max(0.0) as u64,
        _ => 0,
    };
    GroupCount { value, count }
}

/// Task store backed by a MongoDB collection
pub struct MongoTaskStore {
    collection: Collection<MongoTask>,
}

impl MongoTaskStore {
    /// Connect and verify the server answers a ping
    pub async fn connect(config: &MongoConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(&config.uri).await?;
        options.app_name = Some("todo-api".to_string());
        options.server_selection_timeout = Some(config.server_selection_timeout);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            let mut credential = Credential::default();
            credential.username = Some(username.clone());
            credential.password = Some(password.clone());
            options.credential = Some(credential);
        }

        let client = Client::with_options(options)?;
        let database = client.database(&config.database);
        database.run_command(doc! { "ping": 1 }).await?;

        tracing::info!(
            "Connected to MongoDB database {} (collection {})",
            config.database,
            config.collection
        );

        Ok(Self {
            collection: database.collection::<MongoTask>(&config.collection),
        })
    }
}

#[async_trait]
impl TaskRepository for MongoTaskStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Mongo
    }

    async fn create(&self, new_task: NewTask) -> Result<Task> {
        let task = Task::from_new(new_task);
        self.collection.insert_one(MongoTask::from(&task)).await?;
        Ok(task)
    }

    async fn get(&self, id: &TaskId) -> Result<Option<Task>> {
        self.collection
            .find_one(id_filter(id))
            .await?
            .map(Task::try_from)
            .transpose()
    }

    async fn find(
        &self,
        filter: &TaskFilter,
        sort: TaskSort,
        page: Option<Page>,
    ) -> Result<Vec<Task>> {
        let mut action = self
            .collection
            .find(filter_document(filter))
            .sort(sort_document(sort));
        if let Some(page) = page {
            let limit = i64::try_from(page.limit()).unwrap_or(i64::MAX);
            action = action.skip(page.skip()).limit(limit);
        }
        let stored: Vec<MongoTask> = action.await?.try_collect().await?;
        stored.into_iter().map(Task::try_from).collect()
    }

    async fn count(&self, filter: &TaskFilter) -> Result<u64> {
        Ok(self
            .collection
            .count_documents(filter_document(filter))
            .await?)
    }

    async fn aggregate_count(&self, field: GroupField) -> Result<Vec<GroupCount>> {
        let pipeline = vec![
            doc! {
                "$group": { "_id": format!("${}", field.field_name()), "count": { "$sum": 1 } }
            },
            doc! { "$sort": { "_id": 1 } },
        ];
        let groups: Vec<Document> = self
            .collection
            .aggregate(pipeline)
            .await?
            .try_collect()
            .await?;
        Ok(groups.into_iter().map(group_count_from_document).collect())
    }

    async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task> {
        let updated = self
            .collection
            .find_one_and_update(id_filter(id), set_document(&patch, super::model::now()))
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        Task::try_from(updated)
    }

    async fn delete(&self, id: &TaskId) -> Result<Task> {
        let removed = self
            .collection
            .find_one_and_delete(id_filter(id))
            .await?
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        Task::try_from(removed)
    }

    async fn bulk_update(&self, ids: &[TaskId], patch: TaskPatch) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = self
            .collection
            .update_many(ids_filter(ids), set_document(&patch, super::model::now()))
            .await?;
        Ok(result.modified_count)
    }

    async fn bulk_delete(&self, ids: &[TaskId]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = self.collection.delete_many(ids_filter(ids)).await?;
        Ok(result.deleted_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::SortField;
    use chrono::TimeZone;

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(filter_document(&TaskFilter::default()).is_empty());
        assert!(filter_document(&TaskFilter::default().with_search("")).is_empty());
    }

    #[test]
    fn test_filter_document_clauses() {
        let due = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let filter = TaskFilter::default()
            .with_completed(false)
            .with_priority(Priority::High)
            .with_category(Category::Work)
            .with_due_before(due);
        let query = filter_document(&filter);

        assert_eq!(query.get_bool("completed").unwrap(), false);
        assert_eq!(query.get_str("priority").unwrap(), "high");
        assert_eq!(query.get_str("category").unwrap(), "work");
        let due_clause = query.get_document("dueDate").unwrap();
        assert_eq!(
            due_clause.get_datetime("$lt").unwrap().timestamp_millis(),
            due.timestamp_millis()
        );
    }

    #[test]
    fn test_search_becomes_escaped_or_over_three_fields() {
        let query = filter_document(&TaskFilter::default().with_search("c++ (v2)"));
        let clauses = query.get_array("$or").unwrap();
        assert_eq!(clauses.len(), 3);

        let fields: Vec<&str> = clauses
            .iter()
            .map(|c| c.as_document().unwrap().keys().next().unwrap().as_str())
            .collect();
        assert_eq!(fields, vec!["task", "description", "tags"]);

        let regex = clauses[2]
            .as_document()
            .unwrap()
            .get_document("tags")
            .unwrap();
        assert_eq!(regex.get_str("$regex").unwrap(), r"c\+\+ \(v2\)");
        assert_eq!(regex.get_str("$options").unwrap(), "i");
    }

    #[test]
    fn test_sort_document_breaks_ties_by_id() {
        let ordering = sort_document(TaskSort::desc(SortField::Title));
        let keys: Vec<&str> = ordering.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["task", "_id"]);
        assert_eq!(ordering.get_i32("task").unwrap(), -1);
        assert_eq!(ordering.get_i32("_id").unwrap(), 1);
    }

    #[test]
    fn test_set_document_only_names_patched_fields() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let update = set_document(&TaskPatch::completed(true), now);
        let set = update.get_document("$set").unwrap();

        let keys: Vec<&str> = set.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["completed", "updatedAt"]);
        assert_eq!(set.get_bool("completed").unwrap(), true);
    }

    #[test]
    fn test_set_document_clears_due_date_with_null() {
        let patch = TaskPatch {
            due_date: Some(None),
            ..TaskPatch::default()
        };
        let update = set_document(&patch, Utc::now());
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get("dueDate"), Some(&Bson::Null));
    }

    #[test]
    fn test_id_filter_accepts_legacy_object_ids() {
        let legacy = ObjectId::new();
        let candidates = id_candidates(&TaskId::from(legacy.to_hex()));
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1], Bson::ObjectId(legacy));

        let malformed = id_candidates(&TaskId::from("not-an-id"));
        assert_eq!(malformed, vec![Bson::String("not-an-id".to_string())]);
    }

    #[test]
    fn test_stored_task_conversion_keeps_fields() {
        let task = Task::from_new(
            NewTask::new("Stretch")
                .with_category(Category::Health)
                .with_due_date(crate::task::now())
                .with_tags(["daily"]),
        );
        let restored = Task::try_from(MongoTask::from(&task)).unwrap();
        assert_eq!(restored, task);

        let mut legacy = MongoTask::from(&task);
        let oid = ObjectId::new();
        legacy.id = Bson::ObjectId(oid);
        assert_eq!(Task::try_from(legacy).unwrap().id.as_str(), oid.to_hex());
    }

    #[test]
    fn test_group_count_decoding() {
        let group = group_count_from_document(doc! { "_id": "medium", "count": 2 });
        assert_eq!(group.value, serde_json::Value::from("medium"));
        assert_eq!(group.count, 2);

        let group = group_count_from_document(doc! { "_id": false, "count": 3_i64 });
        assert_eq!(group.value, serde_json::Value::from(false));
        assert_eq!(group.count, 3);
    }

    #[test]
    fn test_config_debug_redacts_password() {
        let config =
            MongoConfig::new("mongodb://localhost:27017").with_credentials("app", "s3cret");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }
}
