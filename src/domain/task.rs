//! Task domain model.
//!
//! A task is a short piece of text filed under one of two fixed
//! categories. Ids are UUID v4 values so that a client can mint them
//! offline and the service can accept them unchanged.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, SubsecRound, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::{Uuid, Variant, Version};

/// Length of the hyphenated UUID text form (`8-4-4-4-12`).
const HYPHENATED_LENGTH: usize = 36;

// =============================================================================
// Errors
// =============================================================================

/// Rule violations on task fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskValidationError {
    /// The description is empty once trimmed.
    #[error("Description cannot be empty")]
    EmptyDescription,

    /// The category is not one of the known values.
    #[error("Category must be one of: Personal, Professional")]
    InvalidCategory(String),
}

/// Errors produced when parsing a task id from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskIdError {
    /// The text is not a hyphenated UUID.
    #[error("Invalid task ID format: {0}")]
    Malformed(String),

    /// The text is a UUID, but not a random (v4) one.
    #[error("Task ID is not a UUID v4: {0}")]
    NotVersion4(String),
}

// =============================================================================
// Value Objects - Newtypes
// =============================================================================

/// Unique identifier for a task.
///
/// Serialized as the lowercase hyphenated UUID string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Creates a `TaskId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Generates a new random (v4) `TaskId`.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a hyphenated UUID v4 string.
    ///
    /// Simple, braced and URN forms are rejected even though they name a
    /// valid UUID; only the `xxxxxxxx-xxxx-4xxx-[89ab]xxx-xxxxxxxxxxxx`
    /// shape is accepted (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`TaskIdError::Malformed`] when the text is not a hyphenated
    /// UUID and [`TaskIdError::NotVersion4`] when it is not a v4 UUID.
    pub fn parse_v4(text: &str) -> Result<Self, TaskIdError> {
        if text.len() != HYPHENATED_LENGTH {
            return Err(TaskIdError::Malformed(text.to_string()));
        }

        let uuid = Uuid::try_parse(text).map_err(|_| TaskIdError::Malformed(text.to_string()))?;

        if uuid.get_version() != Some(Version::Random) || uuid.get_variant() != Variant::RFC4122 {
            return Err(TaskIdError::NotVersion4(text.to_string()));
        }

        Ok(Self(uuid))
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = TaskIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse_v4(value)
    }
}

/// A UTC timestamp with millisecond precision.
///
/// Rendered as RFC 3339 with exactly three fractional digits and a `Z`
/// suffix (`2025-01-31T09:15:00.123Z`), which sorts lexicographically in
/// time order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a `Timestamp` from a `DateTime<Utc>`, dropping sub-millisecond digits.
    #[must_use]
    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        Self(datetime.trunc_subsecs(3))
    }

    /// Returns the inner `DateTime<Utc>`.
    #[must_use]
    pub const fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Returns the current time.
    #[must_use]
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Returns the current time, or `previous + 1ms` if the clock has not
    /// moved past `previous` yet.
    #[must_use]
    pub fn now_after(previous: Self) -> Self {
        let now = Self::now();
        if now > previous {
            now
        } else {
            Self(previous.0 + TimeDelta::milliseconds(1))
        }
    }

    /// Parses an RFC 3339 timestamp.
    ///
    /// # Errors
    ///
    /// Returns the underlying `chrono` parse error for malformed input.
    pub fn parse(text: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(text)
            .map(|datetime| Self::from_datetime(datetime.with_timezone(&Utc)))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Enums
// =============================================================================

/// The category a task is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Personal,
    Professional,
}

impl Category {
    /// Every category, in display order.
    pub const ALL: [Self; 2] = [Self::Personal, Self::Professional];

    /// Returns the wire name of the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Personal => "Personal",
            Self::Professional => "Professional",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = TaskValidationError;

    /// Parses the exact wire name (case-sensitive).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Personal" => Ok(Self::Personal),
            "Professional" => Ok(Self::Professional),
            _ => Err(TaskValidationError::InvalidCategory(value.to_string())),
        }
    }
}

/// Checks that a description has visible content.
///
/// The description itself is stored as given; only its trimmed form is
/// inspected.
///
/// # Errors
///
/// Returns [`TaskValidationError::EmptyDescription`] when the trimmed text is empty.
pub fn validate_description(description: &str) -> Result<(), TaskValidationError> {
    if description.trim().is_empty() {
        return Err(TaskValidationError::EmptyDescription);
    }
    Ok(())
}

// =============================================================================
// Task Patch
// =============================================================================

/// Partial update of a task. Only the supplied fields are replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    /// Replacement description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Replacement completion flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TaskPatch {
    /// A patch that only sets `completed`.
    #[must_use]
    pub const fn completed(completed: bool) -> Self {
        Self {
            description: None,
            completed: Some(completed),
        }
    }

    /// A patch that only sets `description`.
    #[must_use]
    pub fn description(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            completed: None,
        }
    }

    /// Returns `true` if the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.description.is_none() && self.completed.is_none()
    }

    /// Combines two patches; fields set in `later` win.
    #[must_use]
    pub fn merge(self, later: Self) -> Self {
        Self {
            description: later.description.or(self.description),
            completed: later.completed.or(self.completed),
        }
    }
}

// =============================================================================
// Task
// =============================================================================

/// The task entity.
///
/// # Examples
///
/// ```
/// use todo_sync::domain::{Category, Task, TaskId, TaskPatch, Timestamp};
///
/// let created = Timestamp::now();
/// let task = Task::new(TaskId::generate(), "Buy milk", Category::Personal, created);
/// assert!(!task.completed);
///
/// let done = task.apply(&TaskPatch::completed(true), Timestamp::now_after(created));
/// assert!(done.completed);
/// assert!(done.updated_at > done.created_at);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier for the task.
    pub id: TaskId,
    /// What needs doing.
    pub description: String,
    /// The category the task is filed under.
    pub category: Category,
    /// Whether the task has been done.
    pub completed: bool,
    /// Timestamp when the task was created.
    pub created_at: Timestamp,
    /// Timestamp of the last mutation.
    pub updated_at: Timestamp,
}

impl Task {
    /// Creates a new, not yet completed task.
    ///
    /// `created_at` and `updated_at` are both set to `timestamp`.
    #[must_use]
    pub fn new(
        id: TaskId,
        description: impl Into<String>,
        category: Category,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            description: description.into(),
            category,
            completed: false,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Returns the timestamp the next mutation of this task should carry.
    #[must_use]
    pub fn next_update_stamp(&self) -> Timestamp {
        Timestamp::now_after(self.updated_at)
    }

    /// Returns a new task with the patch applied and `updated_at` set to `timestamp`.
    #[must_use]
    pub fn apply(self, patch: &TaskPatch, timestamp: Timestamp) -> Self {
        Self {
            description: patch.description.clone().unwrap_or(self.description),
            completed: patch.completed.unwrap_or(self.completed),
            updated_at: timestamp,
            ..self
        }
    }

    /// Returns `true` if the task is filed under `category`.
    #[must_use]
    pub fn belongs_to(&self, category: Category) -> bool {
        self.category == category
    }

    /// Returns `true` if the task is completed and filed under `category`.
    #[must_use]
    pub fn is_completed_in(&self, category: Category) -> bool {
        self.completed && self.belongs_to(category)
    }
}

// =============================================================================
// Tests
// =============================================================================
