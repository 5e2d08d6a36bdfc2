//! SSE framing: `data: <json>\n\n` per frame, `data: [DONE]\n\n` terminator.

use crate::gateway::dispatch::StreamEvent;
use axum::response::sse::Event;
use futures_util::{Stream, StreamExt};

/// Wraps a raw payload string as one SSE data frame.
pub fn data_frame(payload: &str) -> String {
    format!("data: {payload}\n\n")
}

pub fn done_frame() -> String {
    "data: [DONE]\n\n".to_string()
}

/// Converts a provider [`StreamEvent`] stream into axum SSE events.
pub fn to_sse_stream<S>(stream: S) -> impl Stream<Item = Result<Event, std::convert::Infallible>>
where
    S: Stream<Item = Result<StreamEvent, crate::gateway::error::GatewayError>>,
{
    stream.map(|item| {
        let event = match item {
            Ok(StreamEvent::Chunk(json)) => Event::default().data(json),
            Ok(StreamEvent::Done) => Event::default().data("[DONE]"),
            Err(e) => Event::default().data(
                serde_json::json!({"error": e.to_string()}).to_string(),
            ),
        };
        Ok(event)
    })
}

/// Builds the exact two-frame stream a cache-hit streaming request replays:
/// one data frame carrying the full cached body, then the terminator.
pub fn cached_replay_frames(response_body: &serde_json::Value) -> String {
    format!("{}{}", data_frame(&response_body.to_string()), done_frame())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_replay_is_exactly_two_frames() {
        let body = serde_json::json!({"ok": true});
        let replayed = cached_replay_frames(&body);
        let frame_count = replayed.matches("\n\n").count();
        assert_eq!(frame_count, 2);
        assert!(replayed.ends_with("data: [DONE]\n\n"));
    }
}
