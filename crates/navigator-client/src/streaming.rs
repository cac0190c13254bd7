use crate::error::{NavigatorClientError, Result};
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

const MAX_SSE_BUFFER_BYTES: usize = 10 * 1024 * 1024;

/// Wraps a `reqwest` byte stream and yields the payload of each complete
/// `data:` line.
///
/// The Fleet Navigator backend frames its chat stream as newline-delimited
/// SSE: one `data: <payload>` line per event. A chunk boundary can fall in
/// the middle of a line, so bytes are buffered until a `\n` arrives; the
/// incomplete trailing line survives across reads. Lines without the `data:`
/// prefix (`event:` names, blank keep-alive lines) are skipped.
///
/// Payloads are yielded verbatim after the `data:` prefix. Whether a payload
/// is JSON or a raw token chunk is decided downstream by
/// [`StreamEvent::classify`](crate::types::events::StreamEvent::classify).
pub(crate) struct SseLineStream {
    inner: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buffer: Vec<u8>,
}

impl SseLineStream {
    pub(crate) fn new(stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(stream),
            buffer: Vec::new(),
        }
    }
}

impl Stream for SseLineStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match extract_payload(&mut self.buffer) {
                Extracted::Payload(p) => return Poll::Ready(Some(Ok(p))),
                Extracted::Overflow => {
                    return Poll::Ready(Some(Err(NavigatorClientError::Stream(
                        "SSE buffer exceeded 10 MB without a complete line".to_string(),
                    ))));
                }
                Extracted::NeedMore => {}
            }

            match self.inner.as_mut().poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => {
                    // Flush a trailing line that arrived without a newline.
                    if !self.buffer.is_empty() {
                        let remaining = std::mem::take(&mut self.buffer);
                        if let Some(payload) = parse_data_line(&remaining) {
                            return Poll::Ready(Some(Ok(payload)));
                        }
                    }
                    return Poll::Ready(None);
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(NavigatorClientError::Http(e))));
                }
                Poll::Ready(Some(Ok(chunk))) => {
                    self.buffer.extend_from_slice(&chunk);
                }
            }
        }
    }
}

enum Extracted {
    Payload(String),
    NeedMore,
    Overflow,
}

/// Drains complete lines from the front of the buffer until a `data:` line
/// is found or the buffer holds no full line.
fn extract_payload(buffer: &mut Vec<u8>) -> Extracted {
    while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=newline).collect();
        if let Some(payload) = parse_data_line(&line[..line.len() - 1]) {
            return Extracted::Payload(payload);
        }
    }
    if buffer.len() > MAX_SSE_BUFFER_BYTES {
        return Extracted::Overflow;
    }
    Extracted::NeedMore
}

/// The payload is everything after the `data:` prefix, untrimmed: raw token
/// chunks are significant down to their whitespace.
fn parse_data_line(line: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(line).ok()?;
    let line = text.strip_suffix('\r').unwrap_or(text);
    let payload = line.strip_prefix("data:")?;
    if payload.is_empty() {
        return None;
    }
    Some(payload.to_string())
}
