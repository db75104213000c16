//! Request bodies for task writes and their validation
//!
//! Storage accepts any well-typed value; length limits, enum membership and
//! date parsing are enforced here before anything reaches the backend.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};

use todo_core::task::{Category, NewTask, Priority, TaskPatch};

const MAX_TITLE_CHARS: usize = 500;
const MAX_DESCRIPTION_CHARS: usize = 1000;
const MAX_TAGS: usize = 10;
const MAX_TAG_CHARS: usize = 50;

/// Distinguishes an explicit `null` (`Some(None)`) from an absent field (`None`)
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub due_date: Option<Option<String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

fn title(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("\"task\" is not allowed to be empty".to_string());
    }
    if trimmed.chars().count() > MAX_TITLE_CHARS {
        return Err(format!(
            "\"task\" length must be less than or equal to {} characters long",
            MAX_TITLE_CHARS
        ));
    }
    Ok(trimmed.to_string())
}

fn description(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(format!(
            "\"description\" length must be less than or equal to {} characters long",
            MAX_DESCRIPTION_CHARS
        ));
    }
    Ok(trimmed.to_string())
}

fn priority(raw: &str) -> Result<Priority, String> {
    raw.parse().map_err(|_| "\"priority\" must be one of [low, medium, high]".to_string())
}

fn category(raw: &str) -> Result<Category, String> {
    raw.parse().map_err(|_| {
        "\"category\" must be one of [work, personal, shopping, health, education, other]"
            .to_string()
    })
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC)
pub fn parse_due_date(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| "\"dueDate\" must be a valid date".to_string())
}

fn tags(raw: Vec<String>) -> Result<Vec<String>, String> {
    if raw.len() > MAX_TAGS {
        return Err(format!(
            "\"tags\" must contain less than or equal to {} items",
            MAX_TAGS
        ));
    }
    raw.into_iter()
        .enumerate()
        .map(|(index, tag)| {
            let trimmed = tag.trim();
            if trimmed.chars().count() > MAX_TAG_CHARS {
                Err(format!(
                    "\"tags[{}]\" length must be less than or equal to {} characters long",
                    index, MAX_TAG_CHARS
                ))
            } else {
                Ok(trimmed.to_string())
            }
        })
        .collect()
}

impl CreateTaskRequest {
    pub fn into_new_task(self) -> Result<NewTask, String> {
        let raw_title = self.task.ok_or_else(|| "\"task\" is required".to_string())?;
        let mut new_task = NewTask::new(title(&raw_title)?);

        if let Some(raw) = self.description {
            new_task = new_task.with_description(description(&raw)?);
        }
        if let Some(raw) = self.priority {
            new_task = new_task.with_priority(priority(&raw)?);
        }
        if let Some(raw) = self.category {
            new_task = new_task.with_category(category(&raw)?);
        }
        if let Some(raw) = self.due_date {
            new_task = new_task.with_due_date(parse_due_date(&raw)?);
        }
        if let Some(raw) = self.tags {
            new_task = new_task.with_tags(tags(raw)?);
        }
        Ok(new_task)
    }
}

impl UpdateTaskRequest {
    pub fn into_patch(self) -> Result<TaskPatch, String> {
        Ok(TaskPatch {
            title: self.task.as_deref().map(title).transpose()?,
            description: self.description.as_deref().map(description).transpose()?,
            completed: self.completed,
            priority: self.priority.as_deref().map(priority).transpose()?,
            category: self.category.as_deref().map(category).transpose()?,
            due_date: match self.due_date {
                Some(Some(raw)) => Some(Some(parse_due_date(&raw)?)),
                Some(None) => Some(None),
                None => None,
            },
            tags: self.tags.map(tags).transpose()?,
        })
    }
}
