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

//! Virgin body relay.
//!
//! Tracks the receiving side of the body lifecycle and pulls whatever the
//! host currently has. Forwarding the pulled bytes (to the wire or to the
//! adapted buffer) is up to the transaction.

use bytes::Bytes;
use tracing::trace;

use crate::engine_core::errors::AdapterError;
use crate::engine_core::models::OperationState;
use crate::engine_core::traits::HostTransaction;

#[derive(Debug)]
pub struct BodyRelay {
    state: OperationState,
    received: usize,
}

impl Default for BodyRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl BodyRelay {
    pub fn new() -> Self {
        Self {
            state: OperationState::Undecided,
            received: 0,
        }
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    /// Total virgin bytes pulled so far
    pub fn received(&self) -> usize {
        self.received
    }

    /// The virgin body will be pulled. The caller asks the host for it.
    pub fn begin(&mut self) -> Result<(), AdapterError> {
        self.state.advance(OperationState::On)
    }

    /// There is no virgin body to pull, or it is not wanted.
    pub fn skip(&mut self) -> Result<(), AdapterError> {
        self.state.advance(OperationState::Never)
    }

    /// Copy everything the host has available and let it reclaim the region.
    pub fn pull<H: HostTransaction>(&mut self, host: &mut H) -> Result<Bytes, AdapterError> {
        if self.state != OperationState::On {
            return Err(AdapterError::Precondition(
                "virgin body delivered while not receiving it",
            ));
        }
        let chunk = host.take_body_bytes(0, None);
        host.release_body_bytes(chunk.len());
        self.received += chunk.len();
        trace!("Pulled {} virgin bytes, {} in total", chunk.len(), self.received);
        Ok(chunk)
    }

    /// The host delivered the whole body. Returns false when the relay was
    /// already done with the body and the notification should be ignored.
    pub fn finish(&mut self) -> Result<bool, AdapterError> {
        match self.state {
            OperationState::Never | OperationState::Complete => Ok(false),
            OperationState::On => {
                self.state.advance(OperationState::Complete)?;
                Ok(true)
            }
            OperationState::Undecided | OperationState::Waiting => Err(AdapterError::Precondition(
                "virgin body completed before it was requested",
            )),
        }
    }

    /// Stop receiving early. Returns true exactly once, when the host has to
    /// be told to stop producing the virgin body.
    pub fn stop(&mut self) -> Result<bool, AdapterError> {
        match self.state {
            OperationState::On => {
                self.state.advance(OperationState::Complete)?;
                Ok(true)
            }
            OperationState::Complete | OperationState::Never => Ok(false),
            OperationState::Undecided | OperationState::Waiting => Err(AdapterError::Precondition(
                "virgin body stopped before the relay was set up",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_core::models::Header;
    use crate::replay::{HostCall, ReplayHost};

    #[test]
    fn test_pull_takes_everything_and_releases_it() {
        let mut host = ReplayHost::request(
            Header::from_image(&b"POST / HTTP/1.1\r\n\r\n"[..]),
            Some(Bytes::from_static(b"abcdef")),
        );
        let journal = host.journal();
        host.deliver_chunk(3);

        let mut relay = BodyRelay::new();
        relay.begin().unwrap();
        let chunk = relay.pull(&mut host).unwrap();
        assert_eq!(&chunk[..], b"abc");
        assert_eq!(relay.received(), 3);
        assert_eq!(journal.calls(), vec![HostCall::ReleaseBodyBytes { size: 3 }]);
    }

    #[test]
    fn test_pull_requires_receiving() {
        let mut host = ReplayHost::request(Header::from_image(&b"GET / HTTP/1.1\r\n\r\n"[..]), None);
        let mut relay = BodyRelay::new();
        relay.skip().unwrap();
        assert!(matches!(
            relay.pull(&mut host),
            Err(AdapterError::Precondition(_))
        ));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut relay = BodyRelay::new();
        relay.begin().unwrap();
        assert!(relay.stop().unwrap());
        assert!(!relay.stop().unwrap());
        assert_eq!(relay.state(), OperationState::Complete);

        let mut never = BodyRelay::new();
        never.skip().unwrap();
        assert!(!never.stop().unwrap());
    }

    #[test]
    fn test_stop_before_setup_is_rejected() {
        let mut relay = BodyRelay::new();
        assert!(matches!(relay.stop(), Err(AdapterError::Precondition(_))));
    }

    #[test]
    fn test_finish_skipped_when_not_receiving() {
        let mut relay = BodyRelay::new();
        relay.skip().unwrap();
        assert!(!relay.finish().unwrap());

        let mut relay = BodyRelay::new();
        relay.begin().unwrap();
        assert!(relay.finish().unwrap());
        assert!(!relay.finish().unwrap());
    }
}
