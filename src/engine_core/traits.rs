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

//! Host and adapter transaction contracts.
//!
//! `HostTransaction` is what the adapter consumes from the proxy host;
//! `AdapterTransaction` is what the host drives.

use async_trait::async_trait;
use bytes::Bytes;

use crate::engine_core::errors::AdapterError;
use crate::engine_core::models::Message;
use crate::service::ServiceKind;

/// The host's side of one transaction.
///
/// Implementations are cheap handles; the adapter drops its handle after the
/// last host call.
pub trait HostTransaction: Send {
    /// The message under adaptation
    fn virgin(&self) -> &Message;

    /// The request that caused the response under adaptation (response side only)
    fn cause(&self) -> Option<&Message>;

    /// Start delivering the virgin body
    fn request_body(&mut self);

    /// Resume delivery after a pause
    fn request_more_body(&mut self);

    /// The adapter needs no more virgin body
    fn stop_body(&mut self);

    /// Copy of the virgin bytes currently available, starting at `offset`
    fn take_body_bytes(&mut self, offset: usize, size: Option<usize>) -> Bytes;

    /// The first `size` available bytes were copied and can be reclaimed
    fn release_body_bytes(&mut self, size: usize);

    /// Terminal decision: use the original message unchanged
    fn use_virgin(&mut self);

    /// Terminal decision: use the given message instead
    fn use_adapted(&mut self, message: Message);

    /// More adapted body content can be pulled
    fn note_adapted_body_available(&mut self);

    /// No more adapted body content will be produced
    fn note_adapted_body_done(&mut self, at_end: bool);

    /// The adapter gave up on the transaction
    fn adaptation_aborted(&mut self);

    /// Fresh response message used for request satisfaction and replacements
    fn new_response(&self) -> Message {
        Message::empty_response()
    }
}

/// Adapter side of one transaction, driven by the host.
#[async_trait]
pub trait AdapterTransaction: Send {
    fn kind(&self) -> ServiceKind;

    /// Begin adaptation: send header(s) and await the first verdict
    async fn start(&mut self) -> Result<(), AdapterError>;

    /// The host will make no more calls; detach without notifying
    fn stop(&mut self);

    /// The host will not take an adapted body at all
    fn discard_adapted_body(&mut self) -> Result<(), AdapterError>;

    /// The host is ready to pull the adapted body
    fn make_adapted_body(&mut self) -> Result<(), AdapterError>;

    /// The host wants more adapted body after a pause
    fn make_more_adapted_body(&mut self) -> Result<(), AdapterError>;

    /// The host wants no more adapted body
    fn stop_making_adapted_body(&mut self) -> Result<(), AdapterError>;

    /// Adapted bytes at `offset`, at most `size` of them; short reads are legal
    fn adapted_content(&self, offset: usize, size: usize) -> Result<Bytes, AdapterError>;

    /// The host consumed the first `size` adapted bytes
    fn shift_adapted_content(&mut self, size: usize) -> Result<(), AdapterError>;

    /// The host has delivered the whole virgin body
    async fn note_virgin_body_done(&mut self, at_end: bool) -> Result<(), AdapterError>;

    /// The host has more virgin body available
    async fn note_virgin_body_available(&mut self) -> Result<(), AdapterError>;
}
