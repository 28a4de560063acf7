/// Tag-delimited segment splitter.
///
/// Splits streamed text into alternating plain and marked (reasoning)
/// segments using `<think>`/`</think>` markers, across arbitrary chunk
/// boundaries. The pending buffer only ever holds bytes that could still be
/// the prefix of a marker not yet fully seen; everything else is emitted as
/// soon as it arrives.
use memchr::memmem;

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// Which side of the markers a segment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Ordinary assistant text.
    Plain,
    /// Text between the reasoning markers.
    Marked,
}

/// A contiguous run of same-kind text. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub value: String,
}

/// Incremental splitter state for one stream session.
#[derive(Debug)]
pub struct ThinkSplitter {
    buffer: String,
    mode: SegmentKind,
}

impl ThinkSplitter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            mode: SegmentKind::Plain,
        }
    }

    /// Feed a chunk of text and collect the segments it completes.
    ///
    /// Markers may be split at any byte boundary between chunks; a suffix
    /// that could still turn into a marker is withheld until resolved.
    pub fn push(&mut self, text: &str) -> Vec<Segment> {
        let mut segments = Vec::new();
        self.push_into(text, &mut segments);
        segments
    }

    pub fn push_into(&mut self, text: &str, segments: &mut Vec<Segment>) {
        if text.is_empty() {
            return;
        }
        self.buffer.push_str(text);

        loop {
            if self.buffer.is_empty() {
                return;
            }
            let marker = match self.mode {
                SegmentKind::Plain => THINK_OPEN,
                SegmentKind::Marked => THINK_CLOSE,
            };

            match memmem::find(self.buffer.as_bytes(), marker.as_bytes()) {
                Some(index) => {
                    if index > 0 {
                        segments.push(Segment {
                            kind: self.mode,
                            value: self.buffer[..index].to_string(),
                        });
                    }
                    self.buffer.drain(..index + marker.len());
                    self.mode = match self.mode {
                        SegmentKind::Plain => SegmentKind::Marked,
                        SegmentKind::Marked => SegmentKind::Plain,
                    };
                }
                None => {
                    let held = longest_suffix_prefix(&self.buffer, marker);
                    if held == self.buffer.len() {
                        // Entire buffer could still become the marker.
                        return;
                    }
                    let emit_len = self.buffer.len() - held;
                    segments.push(Segment {
                        kind: self.mode,
                        value: self.buffer[..emit_len].to_string(),
                    });
                    self.buffer.drain(..emit_len);
                    return;
                }
            }
        }
    }

    /// Emit whatever is buffered at end-of-stream as one final segment.
    ///
    /// A second call on an empty buffer is a no-op, so draining twice is safe.
    pub fn flush(&mut self) -> Option<Segment> {
        if self.buffer.is_empty() {
            return None;
        }
        Some(Segment {
            kind: self.mode,
            value: std::mem::take(&mut self.buffer),
        })
    }
}

impl Default for ThinkSplitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Length of the longest suffix of `text` that is a strict prefix of
/// `marker`. Markers are ASCII, so the returned length is always a valid
/// char boundary in `text`.
fn longest_suffix_prefix(text: &str, marker: &str) -> usize {
    let max = marker.len().saturating_sub(1).min(text.len());
    for k in (1..=max).rev() {
        if text.as_bytes().ends_with(&marker.as_bytes()[..k]) {
            return k;
        }
    }
    0
}
