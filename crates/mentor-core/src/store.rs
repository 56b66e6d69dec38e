//! Lesson and message persistence.
//!
//! Lessons and their message histories are stored as two JSON documents
//! under the mentor data directory:
//!
//! - `lessons.json`: ordered lesson array, most recent first
//! - `messages.json`: map from lesson id to ordered message array
//!
//! Every mutation rewrites both documents as complete snapshots, so the
//! persisted state always matches the in-memory state. Volumes are small
//! (single user, local device), so whole-document rewrites are fine.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// File name of the persisted lesson list.
pub const LESSONS_FILE: &str = "lessons.json";
/// File name of the persisted message map.
pub const MESSAGES_FILE: &str = "messages.json";

/// User-facing text for a reply that failed mid-stream. Shown verbatim;
/// the underlying error goes to the log only.
pub const ERROR_MESSAGE_TEXT: &str = "Sorry, I encountered an error processing your request.";

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    /// Returns the wire-format role string.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// A named topic scoping one tutoring conversation.
///
/// Immutable after creation; there is no edit operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub subject: String,
    pub description: String,
    /// Creation time, epoch milliseconds.
    pub created_at: i64,
}

/// One turn in a lesson's conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub text: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    /// Terminal failure marker; once set, the text is fixed and further
    /// appends are inert.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl Message {
    /// Creates a user message with a fresh id and the current time.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text.into())
    }

    /// Creates an empty model placeholder, filled as chunks stream in.
    pub fn model_placeholder() -> Self {
        Self::new(Role::Model, String::new())
    }

    fn new(role: Role, text: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            text,
            timestamp: chrono::Utc::now().timestamp_millis(),
            is_error: false,
        }
    }
}

/// In-memory lesson collection with write-through JSON persistence.
#[derive(Debug)]
pub struct SessionStore {
    dir: PathBuf,
    lessons: Vec<Lesson>,
    messages: HashMap<String, Vec<Message>>,
}

impl SessionStore {
    /// Loads the store from `dir`, treating missing documents as empty.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let lessons: Vec<Lesson> = read_document(&dir.join(LESSONS_FILE))?.unwrap_or_default();
        let mut messages: HashMap<String, Vec<Message>> =
            read_document(&dir.join(MESSAGES_FILE))?.unwrap_or_default();

        // Every lesson id has a message entry, even if the documents drifted.
        for lesson in &lessons {
            messages.entry(lesson.id.clone()).or_default();
        }

        Ok(Self {
            dir,
            lessons,
            messages,
        })
    }

    /// Returns lessons in display order (most recent first).
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    /// Returns the lesson with the given id, if any.
    pub fn lesson(&self, id: &str) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.id == id)
    }

    /// Returns lessons whose title or subject contains `term`
    /// (case-insensitive), in display order. An empty term matches all.
    pub fn search_lessons(&self, term: &str) -> Vec<&Lesson> {
        let needle = term.to_lowercase();
        self.lessons
            .iter()
            .filter(|l| {
                l.title.to_lowercase().contains(&needle)
                    || l.subject.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Returns the ordered message history for a lesson.
    pub fn messages(&self, lesson_id: &str) -> &[Message] {
        self.messages.get(lesson_id).map_or(&[], Vec::as_slice)
    }

    /// Inserts a lesson at the front and creates its empty history.
    ///
    /// Ids are generated fresh by the caller, so no duplicate check is done.
    pub fn create_lesson(&mut self, lesson: Lesson) -> Result<()> {
        self.messages.insert(lesson.id.clone(), Vec::new());
        self.lessons.insert(0, lesson);
        self.persist()
    }

    /// Removes a lesson and its message history.
    ///
    /// Returns whether the lesson existed. The destructive-action
    /// confirmation gate is the caller's responsibility.
    pub fn delete_lesson(&mut self, id: &str) -> Result<bool> {
        let before = self.lessons.len();
        self.lessons.retain(|l| l.id != id);
        self.messages.remove(id);
        if self.lessons.len() == before {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    /// Appends a message to a lesson's history.
    ///
    /// Unknown lesson ids are a silent no-op; the presentation layer only
    /// references ids it was handed.
    pub fn append_message(&mut self, lesson_id: &str, message: Message) -> Result<()> {
        let Some(history) = self.messages.get_mut(lesson_id) else {
            tracing::debug!(lesson_id, "append_message for unknown lesson ignored");
            return Ok(());
        };
        history.push(message);
        self.persist()
    }

    /// Appends a streamed text delta to a message.
    ///
    /// No-op for unknown ids or for messages already marked errored.
    pub fn append_message_text(
        &mut self,
        lesson_id: &str,
        message_id: &str,
        delta: &str,
    ) -> Result<()> {
        let Some(message) = self.find_message(lesson_id, message_id) else {
            tracing::debug!(lesson_id, message_id, "text delta for unknown message ignored");
            return Ok(());
        };
        if message.is_error {
            return Ok(());
        }
        message.text.push_str(delta);
        self.persist()
    }

    /// Marks a message as a terminal failure with the fixed user-facing text.
    pub fn mark_message_errored(&mut self, lesson_id: &str, message_id: &str) -> Result<()> {
        let Some(message) = self.find_message(lesson_id, message_id) else {
            tracing::debug!(lesson_id, message_id, "error mark for unknown message ignored");
            return Ok(());
        };
        message.is_error = true;
        message.text = ERROR_MESSAGE_TEXT.to_string();
        self.persist()
    }

    fn find_message(&mut self, lesson_id: &str, message_id: &str) -> Option<&mut Message> {
        self.messages
            .get_mut(lesson_id)?
            .iter_mut()
            .find(|m| m.id == message_id)
    }

    /// Writes both documents as complete snapshots.
    fn persist(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        write_document(&self.dir.join(LESSONS_FILE), &self.lessons)?;
        write_document(&self.dir.join(MESSAGES_FILE), &self.messages)?;
        Ok(())
    }
}

fn read_document<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(value))
}

fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string(value).context("Failed to serialize document")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}
