//! Fragment streams for streamed pipe runs.
//!
//! A streamed run is delivered as an ordered, finite sequence of
//! [`Fragment`]s over a bounded channel. [`FragmentStream::collect`] is the
//! only way to turn a sequence into text: it yields the concatenation only when
//! the terminal [`Fragment::Done`] arrives, so an abandoned sequence never
//! produces a partial result.

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::types::StreamChunk;
use crate::error::DialogueError;

/// Default channel capacity between the SSE reader task and the consumer.
pub const FRAGMENT_BUFFER: usize = 32;

/// One element of a streamed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// A piece of generated text, in order.
    Text(String),
    /// The sequence is complete.
    Done,
    /// The producer gave up; everything received so far must be discarded.
    Failed(String),
}

/// Consumer side of a streamed response.
pub struct FragmentStream {
    receiver: mpsc::Receiver<Fragment>,
}

impl FragmentStream {
    /// Wrap an existing receiver.
    pub fn new(receiver: mpsc::Receiver<Fragment>) -> Self {
        Self { receiver }
    }

    /// Create a bounded producer/consumer pair.
    pub fn channel(capacity: usize) -> (mpsc::Sender<Fragment>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx))
    }

    /// Build a stream that replays the given fragments and then closes.
    ///
    /// No terminal fragment is appended; include [`Fragment::Done`] to model a
    /// finished sequence.
    pub fn from_fragments(fragments: impl IntoIterator<Item = Fragment>) -> Self {
        let fragments: Vec<Fragment> = fragments.into_iter().collect();
        let (tx, stream) = Self::channel(fragments.len());
        for fragment in fragments {
            // Capacity equals the fragment count, so this cannot be full.
            let _ = tx.try_send(fragment);
        }
        stream
    }

    /// Drain the sequence, observing each text fragment as it arrives.
    ///
    /// Returns the concatenated text once [`Fragment::Done`] is seen. A
    /// [`Fragment::Failed`] or a channel that closes before `Done` yields
    /// [`DialogueError::Interrupted`] and the collected text is dropped.
    pub async fn collect<F>(mut self, mut on_fragment: F) -> Result<String, DialogueError>
    where
        F: FnMut(&str),
    {
        let mut text = String::new();
        let mut fragments = 0usize;

        while let Some(fragment) = self.receiver.recv().await {
            match fragment {
                Fragment::Text(chunk) => {
                    on_fragment(&chunk);
                    text.push_str(&chunk);
                    fragments += 1;
                }
                Fragment::Done => {
                    debug!(fragments, chars = text.len(), "Fragment stream completed");
                    return Ok(text);
                }
                Fragment::Failed(message) => {
                    warn!(fragments, error = %message, "Fragment stream failed");
                    return Err(DialogueError::Interrupted { fragments });
                }
            }
        }

        warn!(fragments, "Fragment stream closed before completion");
        Err(DialogueError::Interrupted { fragments })
    }
}

/// Incremental decoder for `text/event-stream` bodies.
///
/// Bytes are buffered until a full line is available so multi-byte
/// characters split across network chunks decode intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw body bytes, returning every fragment completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Fragment> {
        self.buffer.extend_from_slice(bytes);

        let mut fragments = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(fragment) = decode_line(&String::from_utf8_lossy(&line)) {
                fragments.push(fragment);
            }
        }
        fragments
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<Fragment> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        decode_line(&String::from_utf8_lossy(&line))
    }
}

fn decode_line(line: &str) -> Option<Fragment> {
    let line = line.trim_end_matches(['\r', '\n']);
    let payload = line.strip_prefix("data:")?.trim_start();

    if payload == "[DONE]" {
        return Some(Fragment::Done);
    }
    if payload.is_empty() {
        return None;
    }

    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => chunk.text().map(|t| Fragment::Text(t.to_string())),
        Err(e) => Some(Fragment::Failed(format!("Malformed stream chunk: {}", e))),
    }
}

/// Pump an SSE response body into a fragment channel on a background task.
///
/// The task stops as soon as the consumer drops its [`FragmentStream`].
pub(crate) fn spawn_sse_reader(response: reqwest::Response, capacity: usize) -> FragmentStream {
    let (tx, stream) = FragmentStream::channel(capacity);

    tokio::spawn(async move {
        let mut decoder = SseDecoder::new();
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    let _ = tx.send(Fragment::Failed(e.to_string())).await;
                    return;
                }
            };

            for fragment in decoder.push(&bytes) {
                let terminal = !matches!(fragment, Fragment::Text(_));
                if tx.send(fragment).await.is_err() {
                    debug!("Fragment consumer went away; stopping reader");
                    return;
                }
                if terminal {
                    return;
                }
            }
        }

        if let Some(fragment) = decoder.finish() {
            let terminal = !matches!(fragment, Fragment::Text(_));
            if tx.send(fragment).await.is_err() || terminal {
                return;
            }
        }

        warn!("SSE body closed before [DONE]");
        let _ = tx
            .send(Fragment::Failed("stream closed before [DONE]".to_string()))
            .await;
    });

    stream
}
