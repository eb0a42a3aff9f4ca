//! Splitting PDP response bodies into decision messages.
//!
//! Streaming bodies are newline-delimited JSON, optionally as server-sent
//! events (`data: {...}`). A non-streaming body is one JSON document without
//! a trailing newline. Blank lines and SSE comments are keep-alives.

use bytes::{Buf, Bytes, BytesMut};
use futures_util::future;
use futures_util::stream::{self, Stream, StreamExt};
use serde::de::IgnoredAny;

use pepgate_core::error::Result;
use pepgate_core::Decision;

const SSE_DATA: &[u8] = b"data:";

#[derive(Debug, Default)]
pub struct DecisionFramer {
    buf: BytesMut,
}

impl DecisionFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete message, if one is buffered.
    pub fn next_message(&mut self) -> Option<Bytes> {
        loop {
            let Some(pos) = self.buf.iter().position(|b| *b == b'\n') else {
                return self.take_complete_document();
            };
            let line = self.buf.split_to(pos + 1).freeze();
            if let Some(msg) = payload(line) {
                return Some(msg);
            }
        }
    }

    /// Whatever is left once the body ended.
    pub fn finish(&mut self) -> Option<Bytes> {
        let rest = self.buf.split().freeze();
        payload(rest)
    }

    // A chunk carrying one whole JSON object without a newline.
    fn take_complete_document(&mut self) -> Option<Bytes> {
        let start = self.buf.iter().position(|b| !b.is_ascii_whitespace())?;
        if self.buf[start] != b'{' {
            return None;
        }
        serde_json::from_slice::<IgnoredAny>(&self.buf).ok()?;
        self.buf.advance(start);
        Some(self.buf.split().freeze())
    }
}

fn payload(line: Bytes) -> Option<Bytes> {
    let trimmed = trim(&line);
    if trimmed.is_empty() || trimmed.starts_with(b":") {
        return None;
    }
    let body = trimmed.strip_prefix(SSE_DATA).map_or(trimmed, trim);
    if body.is_empty() {
        return None;
    }
    Some(line.slice_ref(body))
}

fn trim(s: &[u8]) -> &[u8] {
    let start = s.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(s.len());
    let end = s.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
    &s[start..end]
}

/// Messages of a body, in order. A transport error ends the stream.
pub fn frames<S>(body: S) -> impl Stream<Item = Bytes>
where
    S: Stream<Item = Result<Bytes>>,
{
    let state = (Box::pin(body), DecisionFramer::new(), false);
    stream::unfold(state, |(mut body, mut framer, mut done)| async move {
        loop {
            if let Some(msg) = framer.next_message() {
                return Some((msg, (body, framer, done)));
            }
            if done {
                return framer.finish().map(|msg| (msg, (body, framer, true)));
            }
            match body.next().await {
                Some(Ok(chunk)) => framer.push(&chunk),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "decision body failed");
                    done = true;
                }
                None => done = true,
            }
        }
    })
}

/// Decisions of a body. Keep-alives and unparsable messages are skipped.
pub fn decisions<S>(body: S) -> impl Stream<Item = Decision>
where
    S: Stream<Item = Result<Bytes>>,
{
    frames(body).filter_map(|msg| {
        future::ready(match Decision::from_slice(&msg) {
            Ok(d) => Some(d),
            Err(e) => {
                tracing::debug!(error = %e, "skipping non-decision message");
                None
            }
        })
    })
}
