//! Chunk-boundary tolerant UTF-8 decoding for pane output.
//!
//! Pane bytes arrive in arbitrary slices, so a multi-byte character can be
//! split across two deliveries. [`Utf8StreamDecoder`] keeps the trailing
//! partial sequence until the next chunk completes it, and
//! [`finish`](Utf8StreamDecoder::finish) flushes whatever is left when the
//! stream closes.
//!
//! Decoding is non-fatal: each maximal invalid subpart becomes one U+FFFD,
//! exactly as `String::from_utf8_lossy` would produce for the whole stream.

const REPLACEMENT: char = '\u{FFFD}';

/// Streaming UTF-8 decoder. One instance per pane.
#[derive(Debug, Default, Clone)]
pub struct Utf8StreamDecoder {
    /// Bytes of an incomplete trailing sequence from the previous chunk.
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk`, returning all fully decodable text.
    ///
    /// A trailing partial multi-byte sequence is retained and prepended to the
    /// next call.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        if self.pending.is_empty() {
            let mut out = String::with_capacity(chunk.len());
            let consumed = decode_into(chunk, &mut out, false);
            self.pending.extend_from_slice(&chunk[consumed..]);
            return out;
        }

        self.pending.extend_from_slice(chunk);
        let mut out = String::with_capacity(self.pending.len());
        let consumed = decode_into(&self.pending, &mut out, false);
        self.pending.drain(..consumed);
        out
    }

    /// Flush retained bytes. Genuinely truncated residue becomes U+FFFD.
    ///
    /// The decoder is empty afterwards and may be reused.
    pub fn finish(&mut self) -> String {
        let pending = std::mem::take(&mut self.pending);
        let mut out = String::new();
        decode_into(&pending, &mut out, true);
        out
    }

    /// Number of bytes currently held back waiting for continuation bytes.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Decode `bytes` into `out`, returning how many bytes were consumed.
///
/// With `flush == false` an incomplete sequence at the very end is left
/// unconsumed; with `flush == true` it is replaced by one U+FFFD.
fn decode_into(bytes: &[u8], out: &mut String, flush: bool) -> usize {
    let mut rest = bytes;
    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                out.push_str(valid);
                return bytes.len();
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                if let Ok(text) = std::str::from_utf8(valid) {
                    out.push_str(text);
                }
                match e.error_len() {
                    Some(len) => {
                        out.push(REPLACEMENT);
                        rest = &after[len..];
                    }
                    None if flush => {
                        out.push(REPLACEMENT);
                        return bytes.len();
                    }
                    None => return bytes.len() - after.len(),
                }
            }
        }
    }
}
