/// Streaming response decoder.
///
/// Consumes the SSE byte stream of a chat-completion response and emits
/// typed parts (text, thinking, tool calls) in arrival order. Three
/// cooperating incremental parsers handle the competing encodings:
/// the think-tag splitter, the inline tool-call token parser, and the
/// structured tool-call delta accumulator, with a shared dedup guard so a
/// call surfaced through more than one path is reported once.
mod accumulator;
mod dedup;
mod inline_call;
pub mod think;

use futures_util::{Stream, StreamExt};

use crate::error::BridgeError;
use crate::host::{CancelToken, HostCapabilities, PartSink, ResponsePart};
use crate::protocol::{ChatStreamChunk, StreamChoice, StreamDelta};
use crate::stream::{is_done_event, sse_event_stream};

use self::accumulator::{FlushMode, ToolCallAccumulator};
use self::dedup::EmittedCallGuard;
use self::inline_call::InlineCallParser;
use self::think::{Segment, SegmentKind, ThinkSplitter};

/// All decoder state for one chat response.
///
/// Created at response start, mutated only while processing that response's
/// chunks, and cleared on every exit path. Never shared across requests.
pub struct StreamSession {
    capabilities: HostCapabilities,
    splitter: ThinkSplitter,
    inline: InlineCallParser,
    accumulator: ToolCallAccumulator,
    guard: EmittedCallGuard,
    has_emitted_text: bool,
    emitted_tool_flush_hint: bool,
    drained: bool,
}

impl StreamSession {
    #[must_use]
    pub fn new(capabilities: HostCapabilities) -> Self {
        Self {
            capabilities,
            splitter: ThinkSplitter::new(),
            inline: InlineCallParser::new(),
            accumulator: ToolCallAccumulator::new(),
            guard: EmittedCallGuard::new(),
            has_emitted_text: false,
            emitted_tool_flush_hint: false,
            drained: false,
        }
    }

    /// Process one parsed chunk, emitting parts in order: explicit thinking,
    /// content (split into thinking/plain, plain scanned for inline tool
    /// calls), structured tool-call deltas, then the finish signal.
    ///
    /// Returns whether any part was emitted for this chunk.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ToolArguments`] when a terminal
    /// `finish_reason` arrives while a buffered tool call still has invalid
    /// JSON arguments.
    pub fn process_chunk(
        &mut self,
        chunk: ChatStreamChunk,
        sink: &mut dyn PartSink,
    ) -> Result<bool, BridgeError> {
        let mut emitted = false;
        let Some(choice) = chunk.choices.into_iter().next() else {
            return Ok(emitted);
        };
        let StreamChoice {
            delta,
            finish_reason,
            thinking: choice_thinking,
            ..
        } = choice;
        let StreamDelta {
            content,
            thinking: delta_thinking,
            tool_calls,
            ..
        } = delta;

        // Explicit reasoning field; some backends attach it to the choice.
        if let Some(thinking) = choice_thinking.or(delta_thinking) {
            let (text, id, metadata) = thinking.into_parts();
            if let Some(text) = text {
                self.report_thinking(text, id, metadata, sink);
                emitted = true;
            }
        }

        if let Some(content) = content {
            if !content.is_empty() {
                let mut segments = Vec::new();
                self.splitter.push_into(&content, &mut segments);
                for segment in segments {
                    emitted |= self.route_segment(segment, sink);
                }
            }
        }

        if let Some(tool_calls) = tool_calls {
            // A single-space text part before the first tool call flushes
            // downstream UI buffers; at most once per session.
            if !tool_calls.is_empty() && self.has_emitted_text && !self.emitted_tool_flush_hint {
                sink.report(ResponsePart::Text(" ".to_string()));
                self.emitted_tool_flush_hint = true;
                emitted = true;
            }
            for fragment in &tool_calls {
                emitted |= self.accumulator.absorb(fragment, &mut self.guard, sink);
            }
        }

        if matches!(finish_reason.as_deref(), Some("stop" | "tool_calls")) {
            emitted |= self
                .accumulator
                .flush(FlushMode::Strict, &mut self.guard, sink)?;
        }
        Ok(emitted)
    }

    /// Handle the `[DONE]` sentinel: flush buffered tool calls without
    /// raising on incomplete JSON, and force-attempt the in-flight inline
    /// call.
    pub fn handle_done(&mut self, sink: &mut dyn PartSink) {
        let _ = self
            .accumulator
            .flush(FlushMode::Soft, &mut self.guard, sink);
        self.inline.flush_active(&mut self.guard, sink);
    }

    /// Final drain at end-of-stream or cancellation. Emits whatever the
    /// splitter and parsers still hold (soft semantics), then clears all
    /// session state. Safe to invoke more than once.
    pub fn drain(&mut self, sink: &mut dyn PartSink) {
        if self.drained {
            return;
        }
        self.drained = true;
        if let Some(segment) = self.splitter.flush() {
            self.route_segment(segment, sink);
        }
        self.inline.flush_active(&mut self.guard, sink);
        let _ = self
            .accumulator
            .flush(FlushMode::Soft, &mut self.guard, sink);
        self.clear();
    }

    /// Clear all state without emitting anything. Used on error exits where
    /// buffered partial data must not surface after the failure.
    pub fn abort(&mut self) {
        self.drained = true;
        self.clear();
    }

    fn clear(&mut self) {
        self.splitter = ThinkSplitter::new();
        self.inline.clear();
        self.accumulator.clear();
        self.guard.clear();
    }

    fn route_segment(&mut self, segment: Segment, sink: &mut dyn PartSink) -> bool {
        match segment.kind {
            SegmentKind::Marked => {
                self.report_thinking(segment.value, None, None, sink);
                true
            }
            SegmentKind::Plain => {
                let outcome = self.inline.process(&segment.value, &mut self.guard, sink);
                if outcome.emitted_text {
                    self.has_emitted_text = true;
                }
                outcome.emitted_any
            }
        }
    }

    fn report_thinking(
        &mut self,
        text: String,
        id: Option<String>,
        metadata: Option<serde_json::Value>,
        sink: &mut dyn PartSink,
    ) {
        if self.capabilities.thinking_parts {
            sink.report(ResponsePart::Thinking { text, id, metadata });
        } else {
            // Hosts without a thinking part type get the reasoning as
            // ordinary text.
            sink.report(ResponsePart::Text(text));
            self.has_emitted_text = true;
        }
    }
}

/// Decode a chat-completion SSE byte stream into response parts.
///
/// Chunks are processed strictly in order; the only suspension point is the
/// next network read. Cancellation is observed at the top of the read loop:
/// reading stops, already-emitted parts stand, and the final drain still
/// runs. On a hard error (strict-flush violation) all remaining buffered
/// state is discarded without further emission.
///
/// # Errors
///
/// Returns [`BridgeError::ToolArguments`] for a strict-flush violation; see
/// [`StreamSession::process_chunk`].
pub async fn decode_chat_stream<S, E>(
    byte_stream: S,
    capabilities: HostCapabilities,
    sink: &mut dyn PartSink,
    cancel: &CancelToken,
) -> Result<(), BridgeError>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: std::fmt::Debug + Send + 'static,
{
    let mut session = StreamSession::new(capabilities);
    let mut events = Box::pin(sse_event_stream(byte_stream));

    let outcome = loop {
        if cancel.is_cancelled() {
            tracing::debug!("decode cancelled; stopping reads");
            break Ok(());
        }
        let Some(event) = events.next().await else {
            break Ok(());
        };
        if is_done_event(&event) {
            session.handle_done(sink);
            continue;
        }
        match serde_json::from_str::<ChatStreamChunk>(&event.data) {
            Ok(chunk) => {
                if let Err(err) = session.process_chunk(chunk, sink) {
                    break Err(err);
                }
            }
            Err(err) => {
                // Best-effort streaming tolerance: skip the line, keep going.
                tracing::debug!("skipping malformed SSE payload: {err}");
            }
        }
    };

    match outcome {
        Ok(()) => {
            session.drain(sink);
            Ok(())
        }
        Err(err) => {
            session.abort();
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{StreamToolCall, StreamToolCallFunction, ThinkingDelta};

    fn chunk_with_content(content: &str) -> ChatStreamChunk {
        ChatStreamChunk {
            id: None,
            choices: vec![StreamChoice {
                index: 0,
                delta: StreamDelta {
                    content: Some(content.to_string()),
                    ..StreamDelta::default()
                },
                finish_reason: None,
                thinking: None,
            }],
            usage: None,
        }
    }

    fn chunk_with_tool_call(index: u32, id: Option<&str>, name: Option<&str>, args: &str) -> ChatStreamChunk {
        ChatStreamChunk {
            id: None,
            choices: vec![StreamChoice {
                index: 0,
                delta: StreamDelta {
                    tool_calls: Some(vec![StreamToolCall {
                        index: Some(index),
                        id: id.map(str::to_string),
                        type_: None,
                        function: Some(StreamToolCallFunction {
                            name: name.map(str::to_string),
                            arguments: Some(args.to_string()),
                        }),
                    }]),
                    ..StreamDelta::default()
                },
                finish_reason: None,
                thinking: None,
            }],
            usage: None,
        }
    }

    fn finish_chunk(reason: &str) -> ChatStreamChunk {
        ChatStreamChunk {
            id: None,
            choices: vec![StreamChoice {
                index: 0,
                delta: StreamDelta::default(),
                finish_reason: Some(reason.to_string()),
                thinking: None,
            }],
            usage: None,
        }
    }

    #[test]
    fn test_think_tags_become_thinking_parts() {
        let mut session = StreamSession::new(HostCapabilities::default());
        let mut parts: Vec<ResponsePart> = Vec::new();
        session
            .process_chunk(chunk_with_content("Hello<thi"), &mut parts)
            .unwrap();
        session
            .process_chunk(chunk_with_content("nk>Reason</think>World"), &mut parts)
            .unwrap();
        session.drain(&mut parts);

        assert_eq!(
            parts,
            vec![
                ResponsePart::Text("Hello".to_string()),
                ResponsePart::Thinking {
                    text: "Reason".to_string(),
                    id: None,
                    metadata: None
                },
                ResponsePart::Text("World".to_string()),
            ]
        );
    }

    #[test]
    fn test_thinking_degrades_to_text_without_capability() {
        let mut session = StreamSession::new(HostCapabilities {
            thinking_parts: false,
        });
        let mut parts: Vec<ResponsePart> = Vec::new();
        session
            .process_chunk(chunk_with_content("<think>deep</think>"), &mut parts)
            .unwrap();
        session.drain(&mut parts);
        assert_eq!(parts, vec![ResponsePart::Text("deep".to_string())]);
    }

    #[test]
    fn test_explicit_thinking_field_on_delta() {
        let mut session = StreamSession::new(HostCapabilities::default());
        let mut parts: Vec<ResponsePart> = Vec::new();
        let mut chunk = chunk_with_content("answer");
        chunk.choices[0].delta.thinking = Some(ThinkingDelta::Text("mulling".to_string()));
        session.process_chunk(chunk, &mut parts).unwrap();
        session.drain(&mut parts);

        // Thinking from the explicit field precedes the chunk's content.
        assert_eq!(
            parts,
            vec![
                ResponsePart::Thinking {
                    text: "mulling".to_string(),
                    id: None,
                    metadata: None
                },
                ResponsePart::Text("answer".to_string()),
            ]
        );
    }

    #[test]
    fn test_flush_hint_emitted_once_before_first_tool_call() {
        let mut session = StreamSession::new(HostCapabilities::default());
        let mut parts: Vec<ResponsePart> = Vec::new();
        session
            .process_chunk(chunk_with_content("Let me check."), &mut parts)
            .unwrap();
        session
            .process_chunk(
                chunk_with_tool_call(0, Some("c0"), Some("first"), "{}"),
                &mut parts,
            )
            .unwrap();
        session
            .process_chunk(
                chunk_with_tool_call(1, Some("c1"), Some("second"), "{}"),
                &mut parts,
            )
            .unwrap();
        session.drain(&mut parts);

        let hint_count = parts
            .iter()
            .filter(|part| matches!(part, ResponsePart::Text(text) if text == " "))
            .count();
        assert_eq!(hint_count, 1);
        assert!(matches!(&parts[0], ResponsePart::Text(t) if t == "Let me check."));
        assert!(matches!(&parts[1], ResponsePart::Text(t) if t == " "));
        assert!(matches!(&parts[2], ResponsePart::ToolCall { name, .. } if name == "first"));
    }

    #[test]
    fn test_no_flush_hint_without_preceding_text() {
        let mut session = StreamSession::new(HostCapabilities::default());
        let mut parts: Vec<ResponsePart> = Vec::new();
        session
            .process_chunk(
                chunk_with_tool_call(0, Some("c0"), Some("t"), "{}"),
                &mut parts,
            )
            .unwrap();
        session.drain(&mut parts);
        assert_eq!(parts.len(), 1);
        assert!(matches!(&parts[0], ResponsePart::ToolCall { .. }));
    }

    #[test]
    fn test_strict_flush_error_on_stop_with_invalid_args() {
        let mut session = StreamSession::new(HostCapabilities::default());
        let mut parts: Vec<ResponsePart> = Vec::new();
        session
            .process_chunk(
                chunk_with_tool_call(0, Some("c0"), Some("t"), "{\"a\":"),
                &mut parts,
            )
            .unwrap();
        let err = session
            .process_chunk(finish_chunk("stop"), &mut parts)
            .unwrap_err();
        assert!(matches!(err, BridgeError::ToolArguments(_)));
    }

    #[test]
    fn test_done_flush_drops_invalid_args_silently() {
        let mut session = StreamSession::new(HostCapabilities::default());
        let mut parts: Vec<ResponsePart> = Vec::new();
        session
            .process_chunk(
                chunk_with_tool_call(0, Some("c0"), Some("t"), "{\"a\":"),
                &mut parts,
            )
            .unwrap();
        session.handle_done(&mut parts);
        session.drain(&mut parts);
        assert!(parts.is_empty());
    }

    #[test]
    fn test_inline_and_structured_twin_emits_once() {
        let mut session = StreamSession::new(HostCapabilities::default());
        let mut parts: Vec<ResponsePart> = Vec::new();
        session
            .process_chunk(
                chunk_with_content(
                    "<|tool_call_begin|>search<|tool_call_argument_begin|>{\"q\":\"x\"}<|tool_call_end|>",
                ),
                &mut parts,
            )
            .unwrap();
        session
            .process_chunk(
                chunk_with_tool_call(0, Some("c0"), Some("search"), "{\"q\":\"x\"}"),
                &mut parts,
            )
            .unwrap();
        session
            .process_chunk(finish_chunk("tool_calls"), &mut parts)
            .unwrap();
        session.drain(&mut parts);

        let calls: Vec<_> = parts
            .iter()
            .filter(|part| matches!(part, ResponsePart::ToolCall { .. }))
            .collect();
        assert_eq!(calls.len(), 1);
    }

    #[test]
    fn test_drain_is_idempotent() {
        let mut session = StreamSession::new(HostCapabilities::default());
        let mut parts: Vec<ResponsePart> = Vec::new();
        session
            .process_chunk(chunk_with_content("tail<thi"), &mut parts)
            .unwrap();
        session.drain(&mut parts);
        let after_first = parts.len();
        session.drain(&mut parts);
        assert_eq!(parts.len(), after_first);
        assert!(matches!(parts.last(), Some(ResponsePart::Text(t)) if t == "<thi"));
    }

    #[test]
    fn test_empty_choices_chunk_is_ignored() {
        let mut session = StreamSession::new(HostCapabilities::default());
        let mut parts: Vec<ResponsePart> = Vec::new();
        session
            .process_chunk(ChatStreamChunk::default(), &mut parts)
            .unwrap();
        assert!(parts.is_empty());
    }
}
