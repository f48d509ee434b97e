//! Line splitting for upstream bodies and SSE framing for downstream bodies.
//!
//! Upstream bridge and push bodies are consumed line by line: a `data:`
//! prefixed SSE line or one NDJSON object per line. Bytes may arrive split
//! at arbitrary boundaries, including inside a multi-byte UTF-8 sequence.
use std::collections::VecDeque;

use futures_util::Stream;
use memchr::memchr_iter;

/// Terminal frame of every downstream stream.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

// ---------------------------------------------------------------------------
// LineSplitter
// ---------------------------------------------------------------------------

/// Incremental line splitter.
///
/// Feed it text chunks and it yields complete lines without their `\n` or
/// `\r\n` terminator.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: String,
    read_offset: usize,
}

impl LineSplitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw text and return the complete lines it closes.
    pub fn feed(&mut self, chunk: &str) -> Vec<String> {
        let mut out = VecDeque::new();
        self.feed_into(chunk, &mut out);
        out.into()
    }

    /// Feed raw text and append complete lines into a caller-provided queue.
    pub fn feed_into(&mut self, chunk: &str, out: &mut VecDeque<String>) {
        self.buffer.push_str(chunk);
        let mut processed_up_to = self.read_offset;
        let scan_start = processed_up_to;
        for rel_pos in memchr_iter(b'\n', &self.buffer.as_bytes()[scan_start..]) {
            let line_end = scan_start + rel_pos;
            let line = &self.buffer[processed_up_to..line_end];
            out.push_back(line.strip_suffix('\r').unwrap_or(line).to_string());
            processed_up_to = line_end + 1;
        }

        self.read_offset = processed_up_to;
        if self.read_offset == self.buffer.len() {
            self.buffer.clear();
            self.read_offset = 0;
            return;
        }
        let should_compact = self.read_offset > 0
            && (self.read_offset >= self.buffer.len() / 2 || self.read_offset >= 8 * 1024);
        if should_compact {
            self.buffer.drain(..self.read_offset);
            self.read_offset = 0;
        }
    }

    /// Take the unterminated trailing line, if any.
    pub fn finish(&mut self) -> Option<String> {
        let rest = &self.buffer[self.read_offset..];
        let line = rest.strip_suffix('\r').unwrap_or(rest);
        let line = (!line.is_empty()).then(|| line.to_string());
        self.buffer.clear();
        self.read_offset = 0;
        line
    }
}

/// Decode as much of `pending` as forms valid UTF-8 and feed it to the
/// splitter. An incomplete trailing sequence stays in `pending`; invalid
/// sequences become U+FFFD.
fn feed_utf8(pending: &mut Vec<u8>, splitter: &mut LineSplitter, out: &mut VecDeque<String>) {
    loop {
        match std::str::from_utf8(pending) {
            Ok(text) => {
                splitter.feed_into(text, out);
                pending.clear();
                return;
            }
            Err(e) => {
                let valid_up_to = e.valid_up_to();
                if let Ok(text) = std::str::from_utf8(&pending[..valid_up_to]) {
                    splitter.feed_into(text, out);
                }
                match e.error_len() {
                    Some(invalid_len) => {
                        splitter.feed_into("\u{fffd}", out);
                        pending.drain(..valid_up_to + invalid_len);
                    }
                    None => {
                        pending.drain(..valid_up_to);
                        return;
                    }
                }
            }
        }
    }
}

struct LineStreamState<S> {
    stream: std::pin::Pin<Box<S>>,
    splitter: LineSplitter,
    pending_bytes: Vec<u8>,
    lines: VecDeque<String>,
    finished: bool,
}

/// Split a byte stream into text lines.
///
/// A transport error is yielded once and ends the stream. At end of input
/// any unterminated trailing line is yielded as a final line.
pub fn line_stream<S, E>(byte_stream: S) -> impl Stream<Item = Result<String, E>> + Send
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: Send + 'static,
{
    use futures_util::StreamExt;

    let state = LineStreamState {
        stream: Box::pin(byte_stream),
        splitter: LineSplitter::new(),
        pending_bytes: Vec::new(),
        lines: VecDeque::with_capacity(8),
        finished: false,
    };

    futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(line) = state.lines.pop_front() {
                return Some((Ok(line), state));
            }
            if state.finished {
                return None;
            }

            match state.stream.as_mut().next().await {
                Some(Ok(bytes)) => {
                    state.pending_bytes.extend_from_slice(&bytes);
                    feed_utf8(
                        &mut state.pending_bytes,
                        &mut state.splitter,
                        &mut state.lines,
                    );
                }
                Some(Err(err)) => {
                    state.finished = true;
                    return Some((Err(err), state));
                }
                None => {
                    state.finished = true;
                    if !state.pending_bytes.is_empty() {
                        let tail = String::from_utf8_lossy(&state.pending_bytes).into_owned();
                        state.pending_bytes.clear();
                        state.splitter.feed_into(&tail, &mut state.lines);
                    }
                    if let Some(line) = state.splitter.finish() {
                        state.lines.push_back(line);
                    }
                }
            }
        }
    })
}
