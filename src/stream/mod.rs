pub mod sse;

pub use sse::{is_done_event, sse_event_stream, SseEvent, SseParser};
