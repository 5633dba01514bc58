// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Filter service block codec.
//!
//! Header replacements and block-page bodies are not length-prefixed; each one
//! ends with `\n\n\0\0`. The decoder scans for that terminator, which may
//! straddle two reads, and strips the trailing NUL pair before handing the
//! block out.

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::engine_core::constants::{limits, wire};
use crate::engine_core::errors::AdapterError;

/// What to do when the peer closes the stream before a terminator arrives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EofPolicy {
    /// Treat end-of-stream as the end of the block; nothing is stripped
    #[default]
    ImplicitEnd,
    /// End-of-stream inside a block is a protocol violation
    Strict,
}

impl EofPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "implicit_end" | "implicit" | "lenient" => Some(EofPolicy::ImplicitEnd),
            "strict" | "error" => Some(EofPolicy::Strict),
            _ => None,
        }
    }
}

pub struct BlockCodec {
    eof_policy: EofPolicy,
    max_block: usize,
    // bytes of the buffer already known not to start a terminator
    scanned: usize,
}

impl BlockCodec {
    #[must_use]
    pub fn new(eof_policy: EofPolicy) -> Self {
        Self {
            eof_policy,
            max_block: limits::MAX_BLOCK_SIZE_BYTES,
            scanned: 0,
        }
    }

    #[must_use]
    pub fn with_max_block(mut self, max_block: usize) -> Self {
        self.max_block = max_block;
        self
    }

    fn find_terminator(&self, src: &[u8]) -> Option<usize> {
        let term = wire::BLOCK_TERMINATOR;
        // back off so a terminator split over two reads is still seen
        let start = self.scanned.saturating_sub(term.len() - 1);
        src.get(start..)?
            .windows(term.len())
            .position(|w| w == term)
            .map(|pos| start + pos)
    }
}

impl Default for BlockCodec {
    fn default() -> Self {
        Self::new(EofPolicy::default())
    }
}

impl Decoder for BlockCodec {
    type Item = Bytes;
    type Error = AdapterError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        trace!("Block decoder scanning {} buffered bytes", src.len());
        match self.find_terminator(src) {
            Some(pos) => {
                let mut block = src.split_to(pos + wire::BLOCK_TERMINATOR.len());
                block.truncate(block.len() - wire::BLOCK_RESERVED_SUFFIX.len());
                self.scanned = 0;
                Ok(Some(block.freeze()))
            }
            None => {
                if src.len() > self.max_block {
                    return Err(AdapterError::ProtocolViolation(format!(
                        "framed block exceeds {} bytes without terminator",
                        self.max_block
                    )));
                }
                self.scanned = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(block) = self.decode(src)? {
            return Ok(Some(block));
        }
        self.scanned = 0;
        match self.eof_policy {
            EofPolicy::ImplicitEnd => Ok(Some(src.split().freeze())),
            EofPolicy::Strict => Err(AdapterError::ProtocolViolation(format!(
                "stream ended inside a framed block after {} bytes",
                src.len()
            ))),
        }
    }
}

/// Frames a payload for the wire. Used by filter service implementations
/// and test peers; the adapter itself only decodes.
impl<'a> Encoder<&'a [u8]> for BlockCodec {
    type Error = AdapterError;

    fn encode(&mut self, item: &'a [u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.len() + wire::BLOCK_RESERVED_SUFFIX.len());
        dst.extend_from_slice(item);
        if !item.ends_with(b"\n\n") {
            dst.extend_from_slice(b"\n\n");
        }
        dst.extend_from_slice(wire::BLOCK_RESERVED_SUFFIX);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut BlockCodec, chunks: &[&[u8]]) -> Vec<Bytes> {
        let mut buf = BytesMut::new();
        let mut out = Vec::new();
        for chunk in chunks {
            buf.extend_from_slice(chunk);
            while let Some(block) = codec.decode(&mut buf).unwrap() {
                out.push(block);
            }
        }
        out
    }

    #[test]
    fn test_strips_reserved_suffix_only() {
        let mut codec = BlockCodec::default();
        let blocks = decode_all(&mut codec, &[b"X-New: 1\n\n\0\0"]);
        assert_eq!(blocks, vec![Bytes::from_static(b"X-New: 1\n\n")]);
    }

    #[test]
    fn test_terminator_straddles_reads() {
        let mut codec = BlockCodec::default();
        let blocks = decode_all(&mut codec, &[b"<html>blocked</html>\n\n", b"\0\0"]);
        assert_eq!(blocks, vec![Bytes::from_static(b"<html>blocked</html>\n\n")]);

        let mut codec = BlockCodec::default();
        let blocks = decode_all(&mut codec, &[b"abc\n", b"\n\0", b"\0"]);
        assert_eq!(blocks, vec![Bytes::from_static(b"abc\n\n")]);
    }

    #[test]
    fn test_leftover_bytes_stay_buffered() {
        let mut codec = BlockCodec::default();
        let mut buf = BytesMut::from(&b"one\n\n\0\0two"[..]);
        let block = codec.decode(&mut buf).unwrap();
        assert_eq!(block, Some(Bytes::from_static(b"one\n\n")));
        assert_eq!(&buf[..], b"two");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_incomplete_block_waits() {
        let mut codec = BlockCodec::default();
        let mut buf = BytesMut::from(&b"partial\n\n\0"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), 10);
    }

    #[test]
    fn test_oversized_block_rejected() {
        let mut codec = BlockCodec::default().with_max_block(8);
        let mut buf = BytesMut::from(&b"0123456789"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(AdapterError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_eof_policies() {
        let mut lenient = BlockCodec::new(EofPolicy::ImplicitEnd);
        let mut buf = BytesMut::from(&b"truncated\n\n"[..]);
        assert_eq!(
            lenient.decode_eof(&mut buf).unwrap(),
            Some(Bytes::from_static(b"truncated\n\n"))
        );

        let mut strict = BlockCodec::new(EofPolicy::Strict);
        let mut buf = BytesMut::from(&b"truncated\n\n"[..]);
        assert!(strict.decode_eof(&mut buf).is_err());
    }

    #[test]
    fn test_encoder_appends_terminator() {
        let mut codec = BlockCodec::default();
        let mut dst = BytesMut::new();
        codec.encode(&b"X-New: 1"[..], &mut dst).unwrap();
        assert_eq!(&dst[..], b"X-New: 1\n\n\0\0");
    }
}
