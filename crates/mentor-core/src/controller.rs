//! Session controller: turns user intents into store mutations and
//! streaming-backend calls.
//!
//! One request may be in flight at a time (a busy flag, not a queue). The
//! send protocol is optimistic: the user message and an empty model
//! placeholder are appended before the backend is called, then streamed
//! deltas fill the placeholder in arrival order.

use anyhow::Result;
use futures_util::StreamExt;

use crate::prompts;
use crate::provider::{ChatTurn, StreamEvent, StreamingBackend};
use crate::store::{Lesson, Message, SessionStore};

/// Fields for a new lesson, as raised by the presentation layer.
#[derive(Debug, Clone)]
pub struct NewLesson {
    pub title: String,
    pub subject: String,
    pub description: String,
}

/// Pre-canned study prompts; these go through the normal send path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Summary,
    Flashcards,
    Quiz,
}

impl Shortcut {
    /// Returns the user text sent for this shortcut.
    pub fn prompt_text(self) -> &'static str {
        match self {
            Shortcut::Summary => prompts::SUMMARY_PROMPT,
            Shortcut::Flashcards => prompts::FLASHCARDS_PROMPT,
            Shortcut::Quiz => prompts::QUIZ_PROMPT,
        }
    }
}

/// Read-only view of the controller state, re-derived on demand.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub lessons: Vec<Lesson>,
    pub active_lesson_id: Option<String>,
    pub messages_for_active: Vec<Message>,
    pub is_streaming: bool,
}

/// Owns write access to the lesson and message collections.
pub struct SessionController<B> {
    store: SessionStore,
    backend: B,
    active_lesson_id: Option<String>,
    streaming: bool,
}

impl<B> SessionController<B> {
    pub fn new(store: SessionStore, backend: B) -> Self {
        Self {
            store,
            backend,
            active_lesson_id: None,
            streaming: false,
        }
    }

    /// Creates a lesson from the given fields and makes it active.
    ///
    /// Returns the generated lesson id.
    pub fn create_lesson(&mut self, fields: NewLesson) -> Result<String> {
        let lesson = Lesson {
            id: uuid::Uuid::new_v4().to_string(),
            title: fields.title,
            subject: fields.subject,
            description: fields.description,
            created_at: chrono::Utc::now().timestamp_millis(),
        };
        let id = lesson.id.clone();
        tracing::info!(lesson_id = %id, title = %lesson.title, "creating lesson");
        self.store.create_lesson(lesson)?;
        self.active_lesson_id = Some(id.clone());
        Ok(id)
    }

    /// Deletes a lesson and its history. The caller has already confirmed.
    ///
    /// Clears the active selection when it pointed at the deleted lesson.
    pub fn delete_lesson(&mut self, id: &str) -> Result<bool> {
        let existed = self.store.delete_lesson(id)?;
        if existed {
            tracing::info!(lesson_id = %id, "deleted lesson");
            if self.active_lesson_id.as_deref() == Some(id) {
                self.active_lesson_id = None;
            }
        }
        Ok(existed)
    }

    /// Selects the active lesson. The presentation layer only passes ids it
    /// was handed, so unknown ids simply leave no lesson resolvable.
    pub fn select_lesson(&mut self, id: &str) {
        self.active_lesson_id = Some(id.to_string());
    }

    /// Returns the active lesson, if one is selected and still exists.
    pub fn active_lesson(&self) -> Option<&Lesson> {
        self.store.lesson(self.active_lesson_id.as_deref()?)
    }

    /// Returns a read-only snapshot for rendering.
    pub fn snapshot(&self) -> Snapshot {
        let messages_for_active = self
            .active_lesson_id
            .as_deref()
            .map(|id| self.store.messages(id).to_vec())
            .unwrap_or_default();
        Snapshot {
            lessons: self.store.lessons().to_vec(),
            active_lesson_id: self.active_lesson_id.clone(),
            messages_for_active,
            is_streaming: self.streaming,
        }
    }
}

impl<B: StreamingBackend> SessionController<B> {
    /// Sends a pre-canned shortcut prompt through the normal send path.
    pub async fn send_shortcut(
        &mut self,
        shortcut: Shortcut,
        on_delta: impl FnMut(&str),
    ) -> Result<()> {
        self.send_message(shortcut.prompt_text(), on_delta).await
    }

    /// Sends a user message in the active lesson and streams the reply.
    ///
    /// Ignored (no observable effect) when no lesson is active or a stream
    /// is already in flight. `on_delta` is invoked for each text fragment
    /// in arrival order, after the fragment has been applied to the store.
    ///
    /// On failure the placeholder is marked errored with a fixed user-facing
    /// string; the underlying error is logged, never shown.
    pub async fn send_message(
        &mut self,
        text: &str,
        mut on_delta: impl FnMut(&str),
    ) -> Result<()> {
        let Some(lesson_id) = self.active_lesson_id.clone() else {
            tracing::debug!("send_message without active lesson ignored");
            return Ok(());
        };
        if self.streaming {
            tracing::debug!("send_message while streaming ignored");
            return Ok(());
        }
        let Some(lesson) = self.store.lesson(&lesson_id).cloned() else {
            tracing::debug!(%lesson_id, "active lesson no longer exists");
            return Ok(());
        };

        // History as it stood before this exchange; the new user text rides
        // separately and is never duplicated into it.
        let prior: Vec<ChatTurn> = self
            .store
            .messages(&lesson_id)
            .iter()
            .map(ChatTurn::from)
            .collect();

        self.store.append_message(&lesson_id, Message::user(text))?;
        let placeholder = Message::model_placeholder();
        let placeholder_id = placeholder.id.clone();
        self.store.append_message(&lesson_id, placeholder)?;

        self.streaming = true;
        let outcome = self
            .run_stream(&lesson, &prior, text, &placeholder_id, &mut on_delta)
            .await;
        self.streaming = false;

        if let Err(error) = outcome {
            tracing::warn!(%lesson_id, %error, "streaming reply failed");
            self.store.mark_message_errored(&lesson_id, &placeholder_id)?;
        }
        Ok(())
    }

    async fn run_stream(
        &mut self,
        lesson: &Lesson,
        prior: &[ChatTurn],
        text: &str,
        placeholder_id: &str,
        on_delta: &mut impl FnMut(&str),
    ) -> Result<()> {
        let mut stream = self
            .backend
            .stream_lesson_reply(lesson, prior, text)
            .await?;

        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::TextDelta { text } => {
                    self.store
                        .append_message_text(&lesson.id, placeholder_id, &text)?;
                    on_delta(&text);
                }
                StreamEvent::Completed { usage } => {
                    if let Some(usage) = usage {
                        tracing::debug!(
                            prompt_tokens = usage.prompt_tokens,
                            output_tokens = usage.output_tokens,
                            "stream completed"
                        );
                    }
                    break;
                }
                StreamEvent::Error {
                    error_type,
                    message,
                } => {
                    return Err(
                        crate::provider::ProviderError::api_error(&error_type, &message).into(),
                    );
                }
            }
        }
        Ok(())
    }
}
