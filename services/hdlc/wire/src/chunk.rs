//! Payload chunking.
//!
//! Splits an outgoing payload into pieces no larger than the configured
//! chunk size, each of which travels in one information frame.

use crate::frame::DEFAULT_MAX_CHUNK_SIZE;
use bytes::{Bytes, BytesMut};

/// Chunker for splitting payloads into frame-sized pieces
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
}

impl Chunker {
    /// Create a chunker producing pieces of at most `chunk_size` bytes.
    ///
    /// A size of zero is treated as one.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Maximum chunk size
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split a payload into consecutive chunks. An empty payload has none.
    pub fn chunk(&self, payload: Bytes) -> Vec<Bytes> {
        let total = (payload.len() + self.chunk_size - 1) / self.chunk_size;
        let mut chunks = Vec::with_capacity(total);
        let mut offset = 0;

        while offset < payload.len() {
            let end = std::cmp::min(offset + self.chunk_size, payload.len());
            chunks.push(payload.slice(offset..end));
            offset = end;
        }

        chunks
    }

    /// Split text line by line, each line chunked on its own.
    ///
    /// Line terminators (`\n` or `\r\n`) are stripped and empty lines
    /// produce no chunks.
    pub fn chunk_lines(&self, text: Bytes) -> Vec<Bytes> {
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < text.len() {
            let end = text[start..]
                .iter()
                .position(|&b| b == b'\n')
                .map_or(text.len(), |pos| start + pos);
            let mut line = text.slice(start..end);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            chunks.extend(self.chunk(line));
            start = end + 1;
        }

        chunks
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK_SIZE)
    }
}

/// Concatenate chunks back into one payload
pub fn reassemble<'a>(chunks: impl IntoIterator<Item = &'a Bytes>) -> Bytes {
    let mut out = BytesMut::new();
    for chunk in chunks {
        out.extend_from_slice(chunk);
    }
    out.freeze()
}
