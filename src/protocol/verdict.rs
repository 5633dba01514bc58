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

//! Verdict exchange.
//!
//! The round-trip steps shared by both transaction kinds. Which steps apply,
//! and whether a verdict byte is acknowledged, is decided by `ProtocolPhase`.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::engine_core::errors::AdapterError;
use crate::engine_core::models::{ProtocolPhase, Replacement, Verdict};
use crate::wire::channel::FramedChannel;

/// Send raw header images back to back; the peer finds each header end itself.
pub async fn send_headers<S>(
    channel: &mut FramedChannel<S>,
    headers: &[&[u8]],
) -> Result<(), AdapterError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    for header in headers {
        channel.write_exact(header).await?;
    }
    Ok(())
}

/// Read one verdict byte and validate it against the phase alphabet.
/// Response-side verdicts are acknowledged once accepted.
pub async fn await_verdict<S>(
    channel: &mut FramedChannel<S>,
    phase: ProtocolPhase,
) -> Result<Verdict, AdapterError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let byte = channel.read_byte().await?;
    let verdict = Verdict::from_wire(byte, phase)?;
    debug!("{}: received {:?}", phase, verdict);
    if phase.acknowledges_verdict() {
        channel.send_ack().await?;
    }
    Ok(verdict)
}

/// Read one framed block, then acknowledge it.
pub async fn receive_block<S>(channel: &mut FramedChannel<S>) -> Result<Bytes, AdapterError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let block = channel.read_framed_block().await?;
    channel.send_ack().await?;
    Ok(block)
}

/// Read the header block and body block of a block page or replacement.
pub async fn receive_replacement<S>(
    channel: &mut FramedChannel<S>,
) -> Result<Replacement, AdapterError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let header = receive_block(channel).await?;
    let body = receive_block(channel).await?;
    debug!(
        "Replacement received: {} header bytes, {} body bytes",
        header.len(),
        body.len()
    );
    Ok(Replacement { header, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::codec::EofPolicy;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixStream;

    fn pair() -> (FramedChannel<UnixStream>, UnixStream) {
        let (ours, theirs) = UnixStream::pair().unwrap();
        (
            FramedChannel::from_stream(ours, Some(Duration::from_secs(5)), EofPolicy::ImplicitEnd),
            theirs,
        )
    }

    #[tokio::test]
    async fn test_reqmod_verdict_not_acknowledged() {
        let (mut channel, mut peer) = pair();
        peer.write_all(b"v").await.unwrap();
        let verdict = await_verdict(&mut channel, ProtocolPhase::ReqmodVerdict)
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::UseVirgin);

        drop(channel);
        let mut rest = Vec::new();
        peer.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_respmod_verdict_acknowledged() {
        let (mut channel, mut peer) = pair();
        peer.write_all(b"s").await.unwrap();
        let verdict = await_verdict(&mut channel, ProtocolPhase::RespmodPreVerdict)
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::NeedsScan);

        let mut ack = [0u8; 1];
        peer.read_exact(&mut ack).await.unwrap();
        assert_eq!(&ack, b"r");
    }

    #[tokio::test]
    async fn test_verdict_outside_phase_rejected_without_ack() {
        let (mut channel, mut peer) = pair();
        peer.write_all(b"b").await.unwrap();
        let err = await_verdict(&mut channel, ProtocolPhase::RespmodFinalVerdict)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AdapterError::UnexpectedVerdict {
                phase: ProtocolPhase::RespmodFinalVerdict,
                byte: b'b'
            }
        ));

        drop(channel);
        let mut rest = Vec::new();
        peer.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_replacement_acks_each_block() {
        let (mut channel, mut peer) = pair();
        let peer_task = tokio::spawn(async move {
            let mut ack = [0u8; 1];
            peer.write_all(b"HTTP/1.1 403 Forbidden\n\n\0\0").await.unwrap();
            peer.read_exact(&mut ack).await.unwrap();
            assert_eq!(&ack, b"r");
            peer.write_all(b"<html>blocked</html>\n\n\0\0").await.unwrap();
            peer.read_exact(&mut ack).await.unwrap();
            assert_eq!(&ack, b"r");
        });

        let replacement = receive_replacement(&mut channel).await.unwrap();
        assert_eq!(&replacement.header[..], b"HTTP/1.1 403 Forbidden\n\n");
        assert_eq!(&replacement.body[..], b"<html>blocked</html>\n\n");
        peer_task.await.unwrap();
    }
}
