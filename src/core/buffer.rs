//! Receive-side byte buffer for the line stream.
//!
//! Bytes go in at the tail as the socket yields them and come out at the
//! head as whole units. Decoding happens only on a complete unit, so a
//! multi-byte character split across two socket reads is never cut in half.

use crate::core::error::Result;

#[derive(Debug, Default)]
pub struct ReceiveBuffer {
    bytes: Vec<u8>,
}

impl ReceiveBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn append(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Removes one unit ending with `delimiter` (delimiter included).
    ///
    /// The unit is consumed even when it fails to decode.
    pub fn take_until(&mut self, delimiter: u8) -> Result<Option<String>> {
        let Some(pos) = self.bytes.iter().position(|&b| b == delimiter) else {
            return Ok(None);
        };
        let unit: Vec<u8> = self.bytes.drain(..=pos).collect();
        decode(unit).map(Some)
    }

    /// Removes exactly `count` characters once enough bytes are buffered.
    pub fn take_chars(&mut self, count: usize) -> Result<Option<String>> {
        let mut end = 0;
        for _ in 0..count {
            let Some(&lead) = self.bytes.get(end) else {
                return Ok(None);
            };
            end += utf8_width(lead);
        }
        if end > self.bytes.len() {
            return Ok(None);
        }
        let unit: Vec<u8> = self.bytes.drain(..end).collect();
        decode(unit).map(Some)
    }

    /// Removes everything buffered, unless the tail is a character still
    /// waiting for its remaining bytes.
    pub fn take_all(&mut self) -> Result<Option<String>> {
        if self.bytes.is_empty() {
            return Ok(None);
        }
        match std::str::from_utf8(&self.bytes) {
            Ok(_) => {}
            Err(e) if e.error_len().is_none() => return Ok(None),
            Err(e) => {
                self.bytes.clear();
                return Err(e.into());
            }
        }
        let unit = std::mem::take(&mut self.bytes);
        decode(unit).map(Some)
    }

    /// Evicts the partial unit, replacing undecodable bytes.
    pub fn clear(&mut self) -> String {
        let bytes = std::mem::take(&mut self.bytes);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

fn decode(unit: Vec<u8>) -> Result<String> {
    String::from_utf8(unit).map_err(|e| e.utf8_error().into())
}

/// Encoded length implied by a leading byte. Bytes that cannot lead a
/// sequence count as one so validation rejects them.
fn utf8_width(lead: u8) -> usize {
    match lead {
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 1,
    }
}
