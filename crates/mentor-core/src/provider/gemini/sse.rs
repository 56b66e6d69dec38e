//! Gemini SSE stream parser.

use std::collections::VecDeque;
use std::pin::Pin;

use eventsource_stream::{EventStream, Eventsource};
use futures_util::Stream;
use serde_json::Value;

use crate::provider::{ProviderError, ProviderErrorKind, ProviderResult, StreamEvent, Usage};

/// Parses Server-Sent Events from Gemini streaming responses into
/// normalized [`StreamEvent`]s.
///
/// Gemini sends rolling accumulated text (the full text so far in each
/// chunk); the parser emits only the new suffix per chunk, so deltas arrive
/// in order and concatenate to the final text. No buffering or reordering.
pub struct GeminiSseParser<S> {
    inner: EventStream<S>,
    pending: VecDeque<StreamEvent>,
    /// Accumulated text for delta calculation
    last_text: String,
    final_usage: Option<Usage>,
    final_finish_reason: Option<String>,
    emitted_done: bool,
}

impl<S> GeminiSseParser<S> {
    pub fn new(stream: S) -> Self
    where
        S: Eventsource,
    {
        Self {
            inner: stream.eventsource(),
            pending: VecDeque::new(),
            last_text: String::new(),
            final_usage: None,
            final_finish_reason: None,
            emitted_done: false,
        }
    }

    fn handle_event_data(&mut self, data: &str) -> ProviderResult<()> {
        let trimmed = data.trim();
        if trimmed.is_empty() || trimmed == "[DONE]" {
            return Ok(());
        }

        let value = serde_json::from_str::<Value>(trimmed).map_err(|err| {
            ProviderError::new(
                ProviderErrorKind::Parse,
                format!("Failed to parse SSE JSON: {err}"),
            )
        })?;
        self.handle_chunk(&value);
        Ok(())
    }

    fn handle_chunk(&mut self, value: &Value) {
        let payload = value.get("response").unwrap_or(value);

        if let Some(error) = value.get("error").or_else(|| payload.get("error")) {
            let error_type = error
                .get("status")
                .or_else(|| error.get("code"))
                .and_then(|v| v.as_str())
                .unwrap_or("error")
                .to_string();
            let message = error
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown error")
                .to_string();
            self.pending.push_back(StreamEvent::Error {
                error_type,
                message,
            });
            return;
        }

        if let Some(usage) = payload
            .get("usageMetadata")
            .or_else(|| payload.get("usage_metadata"))
        {
            let prompt = usage
                .get("promptTokenCount")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let completion = usage
                .get("candidatesTokenCount")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            self.final_usage = Some(Usage {
                prompt_tokens: prompt,
                output_tokens: completion,
            });
        }

        if let Some(candidates) = payload.get("candidates").and_then(|v| v.as_array())
            && let Some(candidate) = candidates.first()
        {
            if let Some(reason) = candidate.get("finishReason").and_then(|v| v.as_str()) {
                self.final_finish_reason = Some(reason.to_string());
            }

            if let Some(content) = candidate.get("content")
                && let Some(parts) = content.get("parts").and_then(|v| v.as_array())
            {
                let mut combined_text = String::new();
                for part in parts {
                    if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
                        combined_text.push_str(text);
                    }
                }

                if !combined_text.is_empty() {
                    let delta = if combined_text.starts_with(&self.last_text) {
                        combined_text[self.last_text.len()..].to_string()
                    } else {
                        combined_text.clone()
                    };
                    self.last_text = combined_text;
                    if !delta.is_empty() {
                        self.pending.push_back(StreamEvent::TextDelta { text: delta });
                    }
                }
            }
        }

        if self.final_finish_reason.is_some() && !self.emitted_done {
            self.emitted_done = true;
            self.pending.push_back(StreamEvent::Completed {
                usage: self.final_usage,
            });
        }
    }
}

impl<S, E> Stream for GeminiSseParser<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = ProviderResult<StreamEvent>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;

        loop {
            if let Some(event) = self.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }

            let inner = Pin::new(&mut self.inner);
            match inner.poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    if let Err(err) = self.handle_event_data(&event.data) {
                        return Poll::Ready(Some(Err(err)));
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(ProviderError::new(
                        ProviderErrorKind::Parse,
                        format!("SSE stream error: {e}"),
                    ))));
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures_util::stream;
    use serde_json::json;

    use super::*;

    fn create_test_parser() -> GeminiSseParser<impl Stream<Item = Result<Bytes, std::io::Error>>>
    {
        GeminiSseParser::new(stream::empty())
    }

    fn chunk_with_text(text: &str) -> Value {
        json!({
            "candidates": [{
                "content": {
                    "parts": [{"text": text}]
                }
            }]
        })
    }

    fn drain(parser: &mut GeminiSseParser<impl Stream>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = parser.pending.pop_front() {
            events.push(event);
        }
        events
    }

    /// Gemini sends rolling incremental text (full accumulated text each
    /// time); only the new suffix is emitted.
    #[test]
    fn test_rolling_text_emits_suffix_deltas() {
        let mut parser = create_test_parser();

        parser.handle_chunk(&chunk_with_text("Step "));
        parser.handle_chunk(&chunk_with_text("Step 1: "));
        parser.handle_chunk(&chunk_with_text("Step 1: light absorption."));

        let events = drain(&mut parser);
        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta { text: "Step ".to_string() },
                StreamEvent::TextDelta { text: "1: ".to_string() },
                StreamEvent::TextDelta { text: "light absorption.".to_string() },
            ]
        );
    }

    #[test]
    fn test_repeated_text_emits_no_delta() {
        let mut parser = create_test_parser();

        parser.handle_chunk(&chunk_with_text("Hello"));
        parser.handle_chunk(&chunk_with_text("Hello"));

        let events = drain(&mut parser);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_finish_reason_emits_completed_with_usage() {
        let mut parser = create_test_parser();

        parser.handle_chunk(&json!({
            "candidates": [{
                "content": {"parts": [{"text": "Done"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {
                "promptTokenCount": 10,
                "candidatesTokenCount": 20
            }
        }));

        let events = drain(&mut parser);
        assert_eq!(events[0], StreamEvent::TextDelta { text: "Done".to_string() });
        assert_eq!(
            events[1],
            StreamEvent::Completed {
                usage: Some(Usage {
                    prompt_tokens: 10,
                    output_tokens: 20
                })
            }
        );
    }

    #[test]
    fn test_completed_emitted_once() {
        let mut parser = create_test_parser();

        parser.handle_chunk(&json!({
            "candidates": [{"finishReason": "STOP"}]
        }));
        parser.handle_chunk(&json!({
            "candidates": [{"finishReason": "STOP"}]
        }));

        let events = drain(&mut parser);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], StreamEvent::Completed { .. }));
    }

    #[test]
    fn test_error_object_emits_error_event() {
        let mut parser = create_test_parser();

        parser.handle_chunk(&json!({
            "error": {
                "status": "RESOURCE_EXHAUSTED",
                "message": "Quota exceeded"
            }
        }));

        let events = drain(&mut parser);
        assert_eq!(
            events,
            vec![StreamEvent::Error {
                error_type: "RESOURCE_EXHAUSTED".to_string(),
                message: "Quota exceeded".to_string(),
            }]
        );
    }

    #[test]
    fn test_done_marker_and_blank_data_ignored() {
        let mut parser = create_test_parser();

        parser.handle_event_data("[DONE]").unwrap();
        parser.handle_event_data("   ").unwrap();

        assert!(parser.pending.is_empty());
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let mut parser = create_test_parser();

        let err = parser.handle_event_data("{not json").unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Parse);
    }

    /// End-to-end through the `Stream` impl: SSE bytes in, events out.
    #[tokio::test]
    async fn test_stream_parses_sse_bytes() {
        use futures_util::StreamExt;

        let body = concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hi\"}]}}]}\n\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hi there\"}]},\"finishReason\":\"STOP\"}]}\n\n",
        );
        let byte_stream = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from(body))]);

        let events: Vec<_> = GeminiSseParser::new(byte_stream)
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta { text: "Hi".to_string() },
                StreamEvent::TextDelta { text: " there".to_string() },
                StreamEvent::Completed { usage: None },
            ]
        );
    }
}
