// Scripted filter service peer shared by the scenario tests.
#![allow(dead_code)]

use std::time::Duration;

use filter_shim::adaptation::{ReqmodTransaction, RespmodTransaction, Transaction, XactionOptions};
use filter_shim::engine_core::models::Header;
use filter_shim::replay::{Journal, ReplayHost};
use filter_shim::wire::channel::FramedChannel;
use filter_shim::wire::codec::EofPolicy;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

pub const REQUEST_HEADER: &[u8] = b"GET http://example.com/ HTTP/1.1\r\nHost: example.com\r\n\r\n";
pub const POST_HEADER: &[u8] =
    b"POST http://example.com/upload HTTP/1.1\r\nHost: example.com\r\nContent-Length: 7\r\n\r\n";
pub const RESPONSE_HEADER: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n";

pub fn channel_pair(timeout: Option<Duration>) -> (FramedChannel<UnixStream>, Peer) {
    let (ours, theirs) = UnixStream::pair().unwrap();
    (
        FramedChannel::from_stream(ours, timeout, EofPolicy::ImplicitEnd),
        Peer { stream: theirs },
    )
}

pub fn reqmod(
    host: ReplayHost,
    options: XactionOptions,
) -> (Transaction<ReplayHost>, Journal, Peer) {
    let journal = host.journal();
    let (channel, peer) = channel_pair(Some(Duration::from_secs(5)));
    (
        Transaction::Reqmod(ReqmodTransaction::new(host, channel, options)),
        journal,
        peer,
    )
}

pub fn respmod(
    host: ReplayHost,
    options: XactionOptions,
) -> (Transaction<ReplayHost>, Journal, Peer) {
    let journal = host.journal();
    let (channel, peer) = channel_pair(Some(Duration::from_secs(5)));
    (
        Transaction::Respmod(RespmodTransaction::new(host, channel, options)),
        journal,
        peer,
    )
}

pub fn request_host(header: &'static [u8], body: Option<&'static [u8]>) -> ReplayHost {
    ReplayHost::request(Header::from_image(header), body.map(bytes::Bytes::from_static))
}

pub fn response_host(body: Option<&'static [u8]>) -> ReplayHost {
    ReplayHost::response(
        Header::from_image(REQUEST_HEADER),
        Header::from_image(RESPONSE_HEADER),
        body.map(bytes::Bytes::from_static),
    )
}

/// The filter service side of a channel
pub struct Peer {
    stream: UnixStream,
}

impl Peer {
    pub async fn expect(&mut self, expected: &[u8]) {
        let mut buf = vec![0u8; expected.len()];
        self.stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(
            String::from_utf8_lossy(&buf),
            String::from_utf8_lossy(expected)
        );
    }

    pub async fn expect_ack(&mut self) {
        self.expect(b"r").await;
    }

    pub async fn send(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
    }

    /// Send a framed block and wait for its acknowledgement.
    pub async fn send_block(&mut self, payload: &[u8]) {
        let mut framed = payload.to_vec();
        framed.extend_from_slice(b"\0\0");
        self.send(&framed).await;
        self.expect_ack().await;
    }

    /// Everything the adapter writes until it closes the channel
    pub async fn rest(mut self) -> Vec<u8> {
        let mut rest = Vec::new();
        self.stream.read_to_end(&mut rest).await.unwrap();
        rest
    }
}
