//! Streaming generation backends.

pub mod gemini;
pub mod shared;

pub use shared::{
    ChatTurn, ProviderError, ProviderErrorKind, ProviderResult, ProviderStream, StreamEvent,
    Usage, resolve_api_key, resolve_base_url,
};

use anyhow::Result;

use crate::store::Lesson;

/// The seam between the session controller and a streaming transport.
///
/// One outbound capability: open a streaming tutoring reply for a lesson,
/// given the prior ordered turn history and the new user text. The prior
/// history is strictly the turns before the current exchange; the new text
/// is carried separately and never duplicated inside `history`.
pub trait StreamingBackend {
    /// Opens the stream. Each invocation is an independent request carrying
    /// its own full history; the backend holds no state between calls.
    fn stream_lesson_reply(
        &self,
        lesson: &Lesson,
        history: &[ChatTurn],
        prompt: &str,
    ) -> impl Future<Output = Result<ProviderStream>> + Send;
}
