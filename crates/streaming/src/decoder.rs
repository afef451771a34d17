//! Incremental NDJSON frame decoder.
//!
//! Chunks arrive with arbitrary boundaries: mid-line, mid-object, even in the
//! middle of a multi-byte UTF-8 sequence. The decoder accumulates raw bytes and
//! only turns a line into text once its terminating `\n` has arrived, so every
//! line is decoded exactly once and in order.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures_util::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::frame::{EventFrame, MalformedFrame};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DecoderStats {
    pub chunks: u64,
    pub bytes: u64,
    /// Complete lines extracted, blank ones included.
    pub lines: u64,
    pub blank_lines: u64,
    pub frames: u64,
    pub malformed: u64,
}

/// Byte accumulator that splits a chunked body into frames.
///
/// Invariant: after every [`FrameDecoder::push`] the buffer holds at most one
/// partial (newline-less) line.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    // Prefix of `buf` already known to contain no line break.
    scanned: usize,
    stats: DecoderStats,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Bytes of the pending partial line.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Appends a chunk and returns every frame completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<EventFrame> {
        let mut out = VecDeque::new();
        self.push_into(chunk, &mut out);
        out.into()
    }

    pub fn push_into(&mut self, chunk: &[u8], out: &mut VecDeque<EventFrame>) {
        self.stats.chunks += 1;
        self.stats.bytes += chunk.len() as u64;
        self.buf.extend_from_slice(chunk);

        let mut line_start = 0;
        let mut cursor = self.scanned;
        while let Some(offset) = self.buf[cursor..].iter().position(|b| *b == b'\n') {
            let line_end = cursor + offset;
            let frame = decode_line(&self.buf[line_start..line_end]);
            self.stats.lines += 1;
            self.tally(frame, out);
            line_start = line_end + 1;
            cursor = line_start;
        }

        self.buf.drain(..line_start);
        self.scanned = self.buf.len();
    }

    /// Flushes the trailing partial line at end of input.
    ///
    /// A trailing line that does not parse is what a transport closing
    /// mid-write leaves behind, so it is dropped instead of surfacing as a
    /// malformed frame.
    pub fn finish(&mut self) -> Option<EventFrame> {
        let rest = std::mem::take(&mut self.buf);
        self.scanned = 0;
        match decode_line(&rest)? {
            EventFrame::Malformed(m) => {
                debug!(
                    bytes = rest.len(),
                    reason = %m.reason,
                    "discarding truncated trailing line"
                );
                None
            }
            frame => {
                self.stats.lines += 1;
                self.stats.frames += 1;
                Some(frame)
            }
        }
    }

    fn tally(&mut self, frame: Option<EventFrame>, out: &mut VecDeque<EventFrame>) {
        let Some(frame) = frame else {
            self.stats.blank_lines += 1;
            return;
        };
        self.stats.frames += 1;
        if let EventFrame::Malformed(m) = &frame {
            self.stats.malformed += 1;
            warn!(reason = %m.reason, line = %m.raw_text, "malformed frame");
        }
        out.push_back(frame);
    }
}

fn decode_line(bytes: &[u8]) -> Option<EventFrame> {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => EventFrame::parse_line(text),
        Err(err) => {
            let text = String::from_utf8_lossy(bytes);
            if text.trim().is_empty() {
                return None;
            }
            Some(EventFrame::Malformed(MalformedFrame {
                raw_text: text.into_owned(),
                reason: err.to_string(),
            }))
        }
    }
}

/// Lazy adapter from a stream of byte chunks to a stream of frames.
///
/// A chunk error is yielded once and ends the stream; the partial line is
/// dropped in that case. A clean end of input flushes the partial line through
/// [`FrameDecoder::finish`].
pub struct FrameStream<S> {
    inner: Option<S>,
    decoder: FrameDecoder,
    ready: VecDeque<EventFrame>,
}

impl<S> FrameStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner: Some(inner),
            decoder: FrameDecoder::new(),
            ready: VecDeque::new(),
        }
    }

    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    pub fn is_exhausted(&self) -> bool {
        self.inner.is_none() && self.ready.is_empty()
    }
}

/// Wraps a chunk stream into a [`FrameStream`].
pub fn frames<S>(chunks: S) -> FrameStream<S> {
    FrameStream::new(chunks)
}

impl<S, B, E> Stream for FrameStream<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
{
    type Item = Result<EventFrame, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if let Some(frame) = this.ready.pop_front() {
                return Poll::Ready(Some(Ok(frame)));
            }
            let Some(inner) = this.inner.as_mut() else {
                return Poll::Ready(None);
            };
            match ready!(inner.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => this.decoder.push_into(chunk.as_ref(), &mut this.ready),
                Some(Err(err)) => {
                    this.inner = None;
                    return Poll::Ready(Some(Err(err)));
                }
                None => {
                    this.inner = None;
                    if let Some(frame) = this.decoder.finish() {
                        this.ready.push_back(frame);
                    }
                }
            }
        }
    }
}
