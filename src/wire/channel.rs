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

//! Framed duplex channel to the filter service.
//!
//! One channel per transaction. It is closed when dropped, which only happens
//! when the owning transaction is destroyed.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio_util::codec::Decoder;
use tracing::{debug, trace};

use crate::engine_core::constants::wire;
use crate::engine_core::errors::AdapterError;
use crate::wire::codec::{BlockCodec, EofPolicy};

pub struct FramedChannel<S> {
    stream: S,
    read_buf: BytesMut,
    codec: BlockCodec,
    timeout: Option<Duration>,
}

impl FramedChannel<UnixStream> {
    /// Connect to the filter service listening on a local socket.
    pub async fn connect(
        address: &Path,
        timeout: Option<Duration>,
        eof_policy: EofPolicy,
    ) -> Result<Self, AdapterError> {
        debug!("Connecting to filter service at {}", address.display());
        let connecting = UnixStream::connect(address);
        let stream = match timeout {
            Some(limit) => tokio::time::timeout(limit, connecting)
                .await
                .map_err(|_| AdapterError::Timeout {
                    operation: "connecting to the filter service",
                    after: limit,
                })?,
            None => connecting.await,
        }
        .map_err(|source| AdapterError::Connect {
            address: address.display().to_string(),
            source,
        })?;
        Ok(Self::from_stream(stream, timeout, eof_policy))
    }
}

impl<S> FramedChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn from_stream(stream: S, timeout: Option<Duration>, eof_policy: EofPolicy) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(wire::READ_CHUNK_SIZE),
            codec: BlockCodec::new(eof_policy),
            timeout,
        }
    }

    /// Write the whole buffer, continuing after short writes.
    pub async fn write_exact(&mut self, bytes: &[u8]) -> Result<(), AdapterError> {
        let mut written = 0;
        while written < bytes.len() {
            let n = with_deadline(
                self.timeout,
                "writing to the filter service",
                self.stream.write(&bytes[written..]),
            )
            .await?;
            if n == 0 {
                return Err(AdapterError::ShortWrite {
                    what: "data",
                    written,
                    expected: bytes.len(),
                });
            }
            written += n;
            trace!("Wrote {} bytes, {} of {} in total", n, written, bytes.len());
        }
        with_deadline(
            self.timeout,
            "flushing the filter service channel",
            self.stream.flush(),
        )
        .await
    }

    /// Write a single marker byte. Anything but a complete one-byte write is fatal.
    pub async fn write_marker(&mut self, what: &'static str, byte: u8) -> Result<(), AdapterError> {
        let n = with_deadline(self.timeout, "writing a marker byte", self.stream.write(&[byte]))
            .await?;
        if n != 1 {
            return Err(AdapterError::ShortWrite {
                what,
                written: n,
                expected: 1,
            });
        }
        Ok(())
    }

    /// Tell the filter service that the block just read was fully received.
    pub async fn send_ack(&mut self) -> Result<(), AdapterError> {
        self.write_marker("acknowledgement", wire::ACK_MESSAGE_RECEIVED)
            .await
    }

    /// Read exactly one byte. End-of-stream is a protocol violation.
    pub async fn read_byte(&mut self) -> Result<u8, AdapterError> {
        if !self.read_buf.is_empty() {
            let byte = self.read_buf.split_to(1);
            return Ok(byte[0]);
        }
        let mut one = [0u8; 1];
        let n = self.read_once(&mut one).await?;
        if n != 1 {
            return Err(AdapterError::ProtocolViolation(
                "filter service closed the channel before sending a verdict".to_string(),
            ));
        }
        Ok(one[0])
    }

    /// Read one terminator-framed block with the reserved suffix stripped.
    pub async fn read_framed_block(&mut self) -> Result<Bytes, AdapterError> {
        let mut scratch = [0u8; wire::READ_CHUNK_SIZE];
        loop {
            if let Some(block) = self.codec.decode(&mut self.read_buf)? {
                trace!("Framed block complete: {} bytes", block.len());
                return Ok(block);
            }
            let n = self.read_once(&mut scratch).await?;
            if n == 0 {
                debug!("Filter service closed the channel inside a framed block");
                return match self.codec.decode_eof(&mut self.read_buf)? {
                    Some(block) => Ok(block),
                    None => Ok(Bytes::new()),
                };
            }
            self.read_buf.extend_from_slice(&scratch[..n]);
        }
    }

    async fn read_once(&mut self, buf: &mut [u8]) -> Result<usize, AdapterError> {
        with_deadline(
            self.timeout,
            "reading from the filter service",
            self.stream.read(buf),
        )
        .await
    }
}

async fn with_deadline<T, F>(
    limit: Option<Duration>,
    operation: &'static str,
    fut: F,
) -> Result<T, AdapterError>
where
    F: Future<Output = std::io::Result<T>>,
{
    match limit {
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| AdapterError::Timeout { operation, after })?
            .map_err(AdapterError::from),
        None => fut.await.map_err(AdapterError::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn pair() -> (FramedChannel<UnixStream>, UnixStream) {
        let (ours, theirs) = UnixStream::pair().unwrap();
        (
            FramedChannel::from_stream(ours, Some(Duration::from_secs(5)), EofPolicy::ImplicitEnd),
            theirs,
        )
    }

    #[tokio::test]
    async fn test_block_split_across_writes() {
        let (mut channel, mut peer) = pair();
        let writer = tokio::spawn(async move {
            peer.write_all(b"X-Blocked: yes\n\n").await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            peer.write_all(b"\0\0").await.unwrap();
            peer
        });
        let block = channel.read_framed_block().await.unwrap();
        assert_eq!(&block[..], b"X-Blocked: yes\n\n");
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn test_verdict_after_block_is_not_lost() {
        let (mut channel, mut peer) = pair();
        peer.write_all(b"hdr\n\n\0\0v").await.unwrap();
        assert_eq!(&channel.read_framed_block().await.unwrap()[..], b"hdr\n\n");
        assert_eq!(channel.read_byte().await.unwrap(), b'v');
    }

    #[tokio::test]
    async fn test_read_byte_on_closed_channel() {
        let (mut channel, peer) = pair();
        drop(peer);
        assert!(matches!(
            channel.read_byte().await,
            Err(AdapterError::ProtocolViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_eof_inside_block_is_implicit_end() {
        let (mut channel, mut peer) = pair();
        peer.write_all(b"no terminator").await.unwrap();
        drop(peer);
        assert_eq!(&channel.read_framed_block().await.unwrap()[..], b"no terminator");
    }

    #[tokio::test]
    async fn test_eof_inside_block_strict() {
        let (ours, mut peer) = UnixStream::pair().unwrap();
        let mut channel = FramedChannel::from_stream(ours, None, EofPolicy::Strict);
        peer.write_all(b"no terminator").await.unwrap();
        drop(peer);
        assert!(matches!(
            channel.read_framed_block().await,
            Err(AdapterError::ProtocolViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_write_exact_large_buffer() {
        let (mut channel, mut peer) = pair();
        let payload = vec![b'a'; 512 * 1024];
        let expected = payload.len();
        let reader = tokio::spawn(async move {
            let mut received = Vec::new();
            peer.read_to_end(&mut received).await.unwrap();
            received.len()
        });
        channel.write_exact(&payload).await.unwrap();
        drop(channel);
        assert_eq!(reader.await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_read_times_out() {
        let (ours, _peer) = UnixStream::pair().unwrap();
        let mut channel =
            FramedChannel::from_stream(ours, Some(Duration::from_millis(20)), EofPolicy::ImplicitEnd);
        assert!(matches!(
            channel.read_byte().await,
            Err(AdapterError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_connect_failure_carries_address() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.sock");
        match FramedChannel::connect(&path, None, EofPolicy::ImplicitEnd).await {
            Err(AdapterError::Connect { address, .. }) => assert!(address.ends_with("missing.sock")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("connect to a missing socket succeeded"),
        }
    }
}
