//! Query pipeline over in-memory task sequences
//!
//! `apply_filter` -> `apply_sort` -> `apply_page` is the fixed order used by
//! the file backend. These functions know nothing about any database's query
//! vocabulary.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::{Category, Priority, Task};
use crate::Error;

/// Conjunctive predicate over task fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub category: Option<Category>,
    /// Case-insensitive substring over title, description and tags
    pub search: Option<String>,
    /// Matches records whose due date is set and strictly earlier
    pub due_before: Option<DateTime<Utc>>,
}

impl TaskFilter {
    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_due_before(mut self, due_before: DateTime<Utc>) -> Self {
        self.due_before = Some(due_before);
        self
    }

    /// Search term, if one is present and non-empty
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.is_empty())
    }

    pub fn matches(&self, task: &Task) -> bool {
        if let Some(completed) = self.completed {
            if task.completed != completed {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if task.priority != priority {
                return false;
            }
        }
        if let Some(category) = self.category {
            if task.category != category {
                return false;
            }
        }
        if let Some(due_before) = self.due_before {
            match task.due_date {
                Some(due) if due < due_before => {}
                _ => return false,
            }
        }
        if let Some(term) = self.search_term() {
            let needle = term.to_lowercase();
            let hit = task.title.to_lowercase().contains(&needle)
                || task.description.to_lowercase().contains(&needle)
                || task.tags.iter().any(|tag| tag.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Sortable task fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    DueDate,
    #[serde(rename = "task")]
    Title,
    Priority,
    Category,
    Completed,
}

impl SortField {
    /// Persisted field name
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::CreatedAt => "createdAt",
            Self::UpdatedAt => "updatedAt",
            Self::DueDate => "dueDate",
            Self::Title => "task",
            Self::Priority => "priority",
            Self::Category => "category",
            Self::Completed => "completed",
        }
    }

    fn compare(&self, a: &Task, b: &Task) -> Ordering {
        match self {
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            // None sorts first, same as null in the document database
            Self::DueDate => a.due_date.cmp(&b.due_date),
            Self::Title => a.title.cmp(&b.title),
            // Enums order by stored string so both backends agree
            Self::Priority => a.priority.as_str().cmp(b.priority.as_str()),
            Self::Category => a.category.as_str().cmp(b.category.as_str()),
            Self::Completed => a.completed.cmp(&b.completed),
        }
    }
}

impl FromStr for SortField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createdAt" => Ok(Self::CreatedAt),
            "updatedAt" => Ok(Self::UpdatedAt),
            "dueDate" => Ok(Self::DueDate),
            "task" => Ok(Self::Title),
            "priority" => Ok(Self::Priority),
            "category" => Ok(Self::Category),
            "completed" => Ok(Self::Completed),
            other => Err(Error::InvalidInput(format!(
                "cannot sort by '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// One field and a direction; defaults to newest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskSort {
    pub field: SortField,
    pub order: SortOrder,
}

impl TaskSort {
    pub fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }

    pub fn asc(field: SortField) -> Self {
        Self::new(field, SortOrder::Asc)
    }

    pub fn desc(field: SortField) -> Self {
        Self::new(field, SortOrder::Desc)
    }
}

/// 1-indexed page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    page: u64,
    limit: u64,
}

impl Page {
    /// Page and limit are clamped to at least 1
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// Fields that can be grouped for counting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupField {
    Priority,
    Category,
    Completed,
}

impl GroupField {
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Priority => "priority",
            Self::Category => "category",
            Self::Completed => "completed",
        }
    }

    fn key(&self, task: &Task) -> Value {
        match self {
            Self::Priority => Value::from(task.priority.as_str()),
            Self::Category => Value::from(task.category.as_str()),
            Self::Completed => Value::from(task.completed),
        }
    }
}

/// A distinct value and how many records hold it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupCount {
    #[serde(rename = "_id")]
    pub value: Value,
    pub count: u64,
}

pub fn apply_filter(tasks: Vec<Task>, filter: &TaskFilter) -> Vec<Task> {
    tasks.into_iter().filter(|t| filter.matches(t)).collect()
}

/// Stable sort; ties keep their incoming order in both directions
pub fn apply_sort(tasks: &mut [Task], sort: TaskSort) {
    tasks.sort_by(|a, b| {
        let ord = sort.field.compare(a, b);
        match sort.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
}

pub fn apply_page(tasks: Vec<Task>, page: Page) -> Vec<Task> {
    let skip = usize::try_from(page.skip()).unwrap_or(usize::MAX);
    let limit = usize::try_from(page.limit()).unwrap_or(usize::MAX);
    tasks.into_iter().skip(skip).take(limit).collect()
}

/// Group-by-and-count in first-seen order
pub fn group_counts(tasks: &[Task], field: GroupField) -> Vec<GroupCount> {
    let mut groups: Vec<GroupCount> = Vec::new();
    for task in tasks {
        let key = field.key(task);
        match groups.iter_mut().find(|g| g.value == key) {
            Some(group) => group.count += 1,
            None => groups.push(GroupCount {
                value: key,
                count: 1,
            }),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::model::{NewTask, TaskId};
    use chrono::Duration;

    fn task(title: &str) -> Task {
        Task::from_new(NewTask::new(title))
    }

    fn titles(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.title.as_str()).collect()
    }

    #[test]
    fn test_filter_is_a_conjunction() {
        let mut a = task("a");
        a.priority = Priority::High;
        a.category = Category::Work;
        let mut b = task("b");
        b.priority = Priority::High;
        b.category = Category::Health;
        let mut c = task("c");
        c.priority = Priority::Low;
        c.category = Category::Work;
        let mut d = task("d");
        d.priority = Priority::High;
        d.category = Category::Work;
        d.completed = true;

        let filter = TaskFilter::default()
            .with_priority(Priority::High)
            .with_category(Category::Work)
            .with_completed(false);
        let result = apply_filter(vec![a, b, c, d], &filter);
        assert_eq!(titles(&result), vec!["a"]);
    }

    #[test]
    fn test_search_matches_any_field() {
        let mut by_tag = task("Groceries");
        by_tag.tags = vec!["Urgent".to_string()];
        let mut by_description = task("Call");
        by_description.description = "this is URGENT".to_string();
        let by_title = task("urgently fix roof");
        let unrelated = task("Read book");

        let filter = TaskFilter::default().with_search("urg");
        let result = apply_filter(vec![by_tag, by_description, by_title, unrelated], &filter);
        assert_eq!(titles(&result), vec!["Groceries", "Call", "urgently fix roof"]);
    }

    #[test]
    fn test_empty_search_is_ignored() {
        let filter = TaskFilter::default().with_search("");
        assert_eq!(apply_filter(vec![task("x"), task("y")], &filter).len(), 2);
    }

    #[test]
    fn test_due_before_requires_a_due_date() {
        let now = Utc::now();
        let mut overdue = task("overdue");
        overdue.due_date = Some(now - Duration::days(1));
        let mut future = task("future");
        future.due_date = Some(now + Duration::days(1));
        let undated = task("undated");

        let filter = TaskFilter::default().with_due_before(now);
        let result = apply_filter(vec![overdue, future, undated], &filter);
        assert_eq!(titles(&result), vec!["overdue"]);
    }

    #[test]
    fn test_sort_is_stable_in_both_directions() {
        let mut tasks: Vec<Task> = ["first", "second", "third"]
            .iter()
            .map(|t| task(t))
            .collect();
        tasks[1].priority = Priority::High;

        let mut asc = tasks.clone();
        apply_sort(&mut asc, TaskSort::asc(SortField::Priority));
        assert_eq!(titles(&asc), vec!["second", "first", "third"]);

        let mut desc = tasks;
        apply_sort(&mut desc, TaskSort::desc(SortField::Priority));
        assert_eq!(titles(&desc), vec!["first", "third", "second"]);
    }

    #[test]
    fn test_sort_by_due_date_puts_missing_first() {
        let now = Utc::now();
        let mut later = task("later");
        later.due_date = Some(now + Duration::days(2));
        let mut sooner = task("sooner");
        sooner.due_date = Some(now + Duration::days(1));
        let undated = task("undated");

        let mut tasks = vec![later, undated, sooner];
        apply_sort(&mut tasks, TaskSort::asc(SortField::DueDate));
        assert_eq!(titles(&tasks), vec!["undated", "sooner", "later"]);
    }

    #[test]
    fn test_pages_cover_the_sequence_exactly() {
        let tasks: Vec<Task> = (0..7).map(|i| task(&format!("t{i}"))).collect();
        for limit in 1..=8 {
            let mut seen: Vec<TaskId> = Vec::new();
            let mut page = 1;
            loop {
                let window = apply_page(tasks.clone(), Page::new(page, limit));
                if window.is_empty() {
                    break;
                }
                seen.extend(window.into_iter().map(|t| t.id));
                page += 1;
            }
            let expected: Vec<TaskId> = tasks.iter().map(|t| t.id.clone()).collect();
            assert_eq!(seen, expected, "limit {limit}");
        }
    }

    #[test]
    fn test_page_past_end_is_empty() {
        let tasks = vec![task("only")];
        assert!(apply_page(tasks, Page::new(3, 10)).is_empty());
    }

    #[test]
    fn test_page_clamps_to_one() {
        let page = Page::new(0, 0);
        assert_eq!(page.page(), 1);
        assert_eq!(page.limit(), 1);
        assert_eq!(page.skip(), 0);
    }

    #[test]
    fn test_group_counts_in_first_seen_order() {
        let mut high = task("a");
        high.priority = Priority::High;
        let tasks = vec![high, task("b"), task("c")];

        let groups = group_counts(&tasks, GroupField::Priority);
        assert_eq!(
            groups,
            vec![
                GroupCount {
                    value: Value::from("high"),
                    count: 1
                },
                GroupCount {
                    value: Value::from("medium"),
                    count: 2
                },
            ]
        );
    }

    #[test]
    fn test_sort_field_wire_names() {
        let field: SortField = serde_json::from_str("\"task\"").unwrap();
        assert_eq!(field, SortField::Title);
        let field: SortField = serde_json::from_str("\"dueDate\"").unwrap();
        assert_eq!(field.field_name(), "dueDate");
        let order: SortOrder = serde_json::from_str("\"asc\"").unwrap();
        assert_eq!(order, SortOrder::Asc);

        assert_eq!("updatedAt".parse::<SortField>().unwrap(), SortField::UpdatedAt);
        assert!("color".parse::<SortField>().is_err());
    }
}
