//! Streaming relay: copies upstream chunks into the response body as they
//! arrive.
//!
//! Each poll of the returned stream awaits exactly one upstream chunk and
//! yields it, so nothing is batched and ordering is preserved. Chunks are
//! decoded as UTF-8 incrementally; a character split across two chunks is
//! held back until its remaining bytes arrive.

use std::time::Instant;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use tracing::{info, warn, Instrument, Span};

use crate::upstream::{ChunkStream, UpstreamError};

/// Incremental UTF-8 decoder. Incomplete trailing sequences are carried into
/// the next call; invalid bytes become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    carry: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.carry);
        buf.extend_from_slice(chunk);

        let mut out = String::with_capacity(buf.len());
        let mut rest: &[u8] = &buf;
        loop {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    out.push_str(s);
                    break;
                }
                Err(e) => {
                    let (valid, tail) = rest.split_at(e.valid_up_to());
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                        None => {
                            self.carry = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush a dangling partial sequence at end of input.
    pub fn finish(&mut self) -> String {
        if self.carry.is_empty() {
            return String::new();
        }
        let carry = std::mem::take(&mut self.carry);
        String::from_utf8_lossy(&carry).into_owned()
    }
}

struct Relay {
    upstream: ChunkStream,
    decoder: Utf8Decoder,
    chunks: usize,
    bytes: usize,
    started: Instant,
    done: bool,
    span: Span,
}

/// Turn an upstream chunk stream into a response body stream.
///
/// An upstream failure is logged and forwarded as the stream's final item;
/// the HTTP layer then aborts the connection since the status is already
/// committed.
pub fn relay(upstream: ChunkStream) -> impl Stream<Item = Result<Bytes, UpstreamError>> + Send + 'static {
    let state = Relay {
        upstream,
        decoder: Utf8Decoder::new(),
        chunks: 0,
        bytes: 0,
        started: Instant::now(),
        done: false,
        span: Span::current(),
    };

    stream::unfold(state, |mut st| {
        let span = st.span.clone();
        async move {
            loop {
                if st.done {
                    return None;
                }
                match st.upstream.next().await {
                    Some(Ok(chunk)) => {
                        if chunk.is_empty() {
                            continue;
                        }
                        let text = st.decoder.decode(&chunk);
                        if text.is_empty() {
                            continue;
                        }
                        st.chunks += 1;
                        st.bytes += text.len();
                        return Some((Ok(Bytes::from(text)), st));
                    }
                    Some(Err(e)) => {
                        warn!(
                            error = %e,
                            chunks = st.chunks,
                            bytes = st.bytes,
                            "upstream failed mid-stream; ending response"
                        );
                        st.done = true;
                        return Some((Err(e), st));
                    }
                    None => {
                        st.done = true;
                        let tail = st.decoder.finish();
                        st.bytes += tail.len();
                        info!(
                            chunks = st.chunks,
                            bytes = st.bytes,
                            elapsed_ms = st.started.elapsed().as_millis() as u64,
                            "relay complete"
                        );
                        if tail.is_empty() {
                            return None;
                        }
                        return Some((Ok(Bytes::from(tail)), st));
                    }
                }
            }
        }
        .instrument(span)
    })
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use tracing_test::traced_test;

    type Item = Result<Bytes, &'static str>;

    fn ok(b: &'static [u8]) -> Item {
        Ok(Bytes::from_static(b))
    }

    fn upstream(items: Vec<Item>) -> ChunkStream {
        stream::iter(
            items
                .into_iter()
                .map(|item| item.map_err(|m| UpstreamError::Interrupted(m.to_owned()))),
        )
        .boxed()
    }

    async fn body_of(s: ChunkStream) -> (Vec<Bytes>, Option<UpstreamError>) {
        let mut parts = Vec::new();
        let mut failure = None;
        let mut body = Box::pin(relay(s));
        while let Some(item) = body.next().await {
            match item {
                Ok(b) => parts.push(b),
                Err(e) => failure = Some(e),
            }
        }
        (parts, failure)
    }

    #[tokio::test]
    async fn chunks_arrive_in_order() {
        let (parts, failure) =
            body_of(upstream(vec![ok(b"Hel"), ok(b"lo, "), ok(b"world")])).await;
        assert!(failure.is_none());
        assert_eq!(parts.len(), 3);
        assert_eq!(parts.concat(), b"Hello, world");
    }

    #[tokio::test]
    async fn empty_chunks_are_skipped() {
        let (parts, _) = body_of(upstream(vec![ok(b""), ok(b"a"), ok(b""), ok(b"b")])).await;
        assert_eq!(parts, vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
    }

    #[tokio::test]
    async fn split_character_is_held_until_complete() {
        let euro = "\u{20ac}".as_bytes(); // three bytes
        let first = Bytes::from(vec![b'x', euro[0], euro[1]]);
        let second = Bytes::from(vec![euro[2], b'y']);
        let (parts, _) = body_of(upstream(vec![Ok(first), Ok(second)])).await;
        assert_eq!(parts, vec![Bytes::from_static(b"x"), Bytes::from("\u{20ac}y")]);
    }

    #[tokio::test]
    async fn dangling_partial_sequence_is_flushed_lossily() {
        let (parts, _) = body_of(upstream(vec![ok(b"ok\xe2\x82")])).await;
        assert_eq!(parts.concat(), "ok\u{fffd}".as_bytes());
    }

    #[tokio::test]
    #[traced_test]
    async fn mid_stream_failure_ends_body() {
        let (parts, failure) =
            body_of(upstream(vec![ok(b"partial"), Err("reset"), ok(b"never")])).await;
        assert_eq!(parts, vec![Bytes::from_static(b"partial")]);
        assert!(matches!(failure, Some(UpstreamError::Interrupted(_))));
        assert!(logs_contain("upstream failed mid-stream"));
    }

    #[test]
    fn invalid_bytes_become_replacement_characters() {
        let mut d = Utf8Decoder::new();
        assert_eq!(d.decode(b"a\xffb"), "a\u{fffd}b");
        assert_eq!(d.finish(), "");
    }
}
