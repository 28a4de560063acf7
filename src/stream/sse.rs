/// SSE (Server-Sent Events) frame parser and stream utilities.
///
/// Handles the low-level parsing of SSE frames from a byte stream, including
/// buffering partial lines and carrying partial UTF-8 sequences across reads.
use std::collections::VecDeque;

use futures_util::Stream;
use memchr::memchr_iter;

/// A parsed SSE event. Only the `data` payload matters to the decoder;
/// the event type is retained for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Check whether an event is the terminal `[DONE]` sentinel.
#[must_use]
pub fn is_done_event(event: &SseEvent) -> bool {
    event.data.trim() == "[DONE]"
}

// ---------------------------------------------------------------------------
// SseParser — incremental SSE line parser
// ---------------------------------------------------------------------------

/// Incremental SSE parser.
///
/// Feed it text chunks (split at arbitrary byte boundaries) and it yields
/// fully-assembled [`SseEvent`] frames:
/// - `data:` lines append to the data buffer (one leading space stripped)
/// - an empty line dispatches the pending frame
/// - `event:` sets the event type for the next frame
/// - comment lines (leading `:`) and unknown fields are ignored
pub struct SseParser {
    buffer: String,
    read_offset: usize,
    event_type: Option<String>,
    data_buffer: String,
    has_data: bool,
}

impl SseParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            read_offset: 0,
            event_type: None,
            data_buffer: String::new(),
            has_data: false,
        }
    }

    /// Feed raw text and return any complete events parsed.
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        let mut out = Vec::new();
        self.feed_into(chunk, &mut out);
        out
    }

    /// Feed raw text and append complete events into a caller-provided buffer.
    pub fn feed_into(&mut self, chunk: &str, out: &mut Vec<SseEvent>) {
        self.buffer.push_str(chunk);
        let mut processed_up_to = self.read_offset;
        let scan_start = processed_up_to;
        let bytes = self.buffer.as_bytes();
        for rel_pos in memchr_iter(b'\n', &bytes[scan_start..]) {
            let line_end = scan_start + rel_pos;
            let mut line = &self.buffer[processed_up_to..line_end];
            if let Some(stripped) = line.strip_suffix('\r') {
                line = stripped;
            }
            Self::process_line(
                line,
                &mut self.event_type,
                &mut self.data_buffer,
                &mut self.has_data,
                out,
            );
            processed_up_to = line_end + 1;
        }

        self.read_offset = processed_up_to;
        if self.read_offset == self.buffer.len() {
            self.buffer.clear();
            self.read_offset = 0;
            return;
        }
        // Compact once the consumed prefix dominates the buffer.
        if self.read_offset > 0
            && (self.read_offset >= self.buffer.len() / 2 || self.read_offset >= 8 * 1024)
        {
            self.buffer.drain(..self.read_offset);
            self.read_offset = 0;
        }
    }

    /// Dispatch whatever is pending at end-of-stream.
    ///
    /// A trailing `data:` line without its terminating blank line is still
    /// surfaced so a truncated final frame is not lost.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let tail = self.buffer[self.read_offset..].trim_end_matches('\r');
        if !tail.is_empty() {
            let mut sink = Vec::new();
            let line = tail.to_owned();
            Self::process_line(
                &line,
                &mut self.event_type,
                &mut self.data_buffer,
                &mut self.has_data,
                &mut sink,
            );
        }
        self.buffer.clear();
        self.read_offset = 0;
        if self.has_data {
            self.has_data = false;
            Some(SseEvent {
                event: self.event_type.take(),
                data: std::mem::take(&mut self.data_buffer),
            })
        } else {
            None
        }
    }

    fn process_line(
        line: &str,
        event_type: &mut Option<String>,
        data_buffer: &mut String,
        has_data: &mut bool,
        events: &mut Vec<SseEvent>,
    ) {
        if line.is_empty() {
            if *has_data {
                events.push(SseEvent {
                    event: event_type.take(),
                    data: std::mem::take(data_buffer),
                });
                *has_data = false;
            }
            return;
        }

        if line.starts_with(':') {
            return;
        }

        if let Some(value) = line.strip_prefix("data:") {
            // Per spec: strip exactly one leading space after the colon.
            let value = value.strip_prefix(' ').unwrap_or(value);
            if *has_data {
                data_buffer.push('\n');
            } else {
                *has_data = true;
            }
            data_buffer.push_str(value);
        } else if let Some(value) = line.strip_prefix("event:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            *event_type = Some(value.to_string());
        }
        // id:, retry:, and unknown field names are ignored.
    }
}

impl Default for SseParser {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Stream utility
// ---------------------------------------------------------------------------

/// Split a byte stream into SSE events using [`SseParser`].
///
/// Bytes arriving from an HTTP response body are decoded as UTF-8 (partial
/// multi-byte sequences carry over to the next read), fed into the parser,
/// and complete [`SseEvent`] frames are yielded in order. When the byte
/// stream ends, a pending unterminated frame is flushed as a final event.
pub fn sse_event_stream<S, E>(byte_stream: S) -> impl Stream<Item = SseEvent> + Send
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: std::fmt::Debug + Send + 'static,
{
    use futures_util::StreamExt;

    struct DecodeState<S> {
        stream: std::pin::Pin<Box<S>>,
        parser: SseParser,
        remainder: Vec<u8>,
        pending: VecDeque<SseEvent>,
        ended: bool,
    }

    futures_util::stream::unfold(
        DecodeState {
            stream: Box::pin(byte_stream),
            parser: SseParser::new(),
            remainder: Vec::new(),
            pending: VecDeque::with_capacity(8),
            ended: false,
        },
        |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    return Some((event, state));
                }
                if state.ended {
                    return None;
                }

                match state.stream.as_mut().next().await {
                    Some(Ok(bytes)) => {
                        state.remainder.extend_from_slice(&bytes);
                        let mut parsed = Vec::new();
                        match std::str::from_utf8(&state.remainder) {
                            Ok(text) => {
                                state.parser.feed_into(text, &mut parsed);
                                state.remainder.clear();
                            }
                            Err(e) => {
                                let valid_up_to = e.valid_up_to();
                                if valid_up_to > 0 {
                                    // Safety: valid_up_to is a valid UTF-8 boundary.
                                    let text = unsafe {
                                        std::str::from_utf8_unchecked(
                                            &state.remainder[..valid_up_to],
                                        )
                                    };
                                    state.parser.feed_into(text, &mut parsed);
                                    state.remainder.copy_within(valid_up_to.., 0);
                                    state.remainder.truncate(state.remainder.len() - valid_up_to);
                                }
                            }
                        }
                        state.pending.extend(parsed);
                    }
                    Some(Err(err)) => {
                        tracing::debug!("SSE byte stream error, ending stream: {err:?}");
                        state.ended = true;
                        if let Some(event) = state.parser.finish() {
                            state.pending.push_back(event);
                        }
                    }
                    None => {
                        state.ended = true;
                        if let Some(event) = state.parser.finish() {
                            state.pending.push_back(event);
                        }
                    }
                }
            }
        },
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::StreamExt;

    #[test]
    fn test_parse_simple_data_frame() {
        let mut parser = SseParser::new();
        let events = parser.feed("data: hello world\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello world");
        assert!(events[0].event.is_none());
    }

    #[test]
    fn test_parse_multiline_data() {
        let mut parser = SseParser::new();
        let events = parser.feed("data: line1\ndata: line2\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "line1\nline2");
    }

    #[test]
    fn test_parse_multiple_frames() {
        let mut parser = SseParser::new();
        let events = parser.feed("data: first\n\ndata: second\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "first");
        assert_eq!(events[1].data, "second");
    }

    #[test]
    fn test_parse_ignores_comments_and_unknown_fields() {
        let mut parser = SseParser::new();
        let events = parser.feed(": keepalive\nid: 7\nretry: 100\ndata: hello\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn test_parse_done_frame() {
        let mut parser = SseParser::new();
        let events = parser.feed("data: [DONE]\n\n");
        assert_eq!(events.len(), 1);
        assert!(is_done_event(&events[0]));
    }

    #[test]
    fn test_parse_incremental_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed("data: hel").is_empty());
        assert!(parser.feed("lo\n").is_empty());
        let events = parser.feed("\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn test_parse_data_no_space_after_colon() {
        let mut parser = SseParser::new();
        let events = parser.feed("data:nospace\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "nospace");
    }

    #[test]
    fn test_parse_crlf_line_endings() {
        let mut parser = SseParser::new();
        let events = parser.feed("data: hello\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn test_parse_empty_lines_without_data_dont_emit() {
        let mut parser = SseParser::new();
        assert!(parser.feed("\n\n\n").is_empty());
    }

    #[test]
    fn test_finish_flushes_unterminated_frame() {
        let mut parser = SseParser::new();
        assert!(parser.feed("data: tail").is_empty());
        let event = parser.finish().expect("trailing frame");
        assert_eq!(event.data, "tail");
        assert!(parser.finish().is_none());
    }

    #[test]
    fn test_finish_on_empty_parser_is_noop() {
        let mut parser = SseParser::new();
        assert!(parser.finish().is_none());
    }

    #[tokio::test]
    async fn test_sse_event_stream_basic() {
        let source = futures_util::stream::iter(vec![
            Ok::<Bytes, std::convert::Infallible>(Bytes::from_static(b"data: a\n\ndata: ")),
            Ok(Bytes::from_static(b"b\n\n")),
        ]);
        let events: Vec<SseEvent> = sse_event_stream(source).collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "a");
        assert_eq!(events[1].data, "b");
    }

    #[tokio::test]
    async fn test_sse_event_stream_utf8_split_across_chunks() {
        // "é" is 0xC3 0xA9; split it across reads.
        let source = futures_util::stream::iter(vec![
            Ok::<Bytes, std::convert::Infallible>(Bytes::from_static(b"data: caf\xc3")),
            Ok(Bytes::from_static(b"\xa9\n\n")),
        ]);
        let events: Vec<SseEvent> = sse_event_stream(source).collect().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "café");
    }

    #[tokio::test]
    async fn test_sse_event_stream_flushes_trailing_frame_on_close() {
        let source = futures_util::stream::iter(vec![Ok::<Bytes, std::convert::Infallible>(
            Bytes::from_static(b"data: last"),
        )]);
        let events: Vec<SseEvent> = sse_event_stream(source).collect().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "last");
    }
}
