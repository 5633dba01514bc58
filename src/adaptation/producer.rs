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

//! Adapted body producer.
//!
//! Answers the host's pull API for the adapted body. Content comes from the
//! adapted buffer (virgin passthrough or a replacement) unless the message
//! was blocked, in which case the block page buffer backs every read.
//!
//! The producer never talks to the host. Operations return the
//! [`BodySignal`]s the transaction must forward.

use bytes::{Buf, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::engine_core::errors::AdapterError;
use crate::engine_core::models::OperationState;

/// When a response replacement reports its adapted body as done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonePolicy {
    /// Right after the replacement is handed to the host
    #[default]
    Immediate,
    /// Once the host has shifted out the last byte
    OnDrain,
}

impl DonePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "immediate" => Some(DonePolicy::Immediate),
            "on_drain" | "drain" => Some(DonePolicy::OnDrain),
            _ => None,
        }
    }
}

/// What completes the adapted body when nobody declares it done explicitly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Done as soon as the source has ended (request passthrough)
    WithSource,
    /// Done once the source has ended and the buffer is drained
    OnDrain,
}

/// Notification the transaction forwards to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodySignal {
    Available,
    Done { at_end: bool },
}

#[derive(Debug)]
pub struct AdaptedBodyProducer {
    state: OperationState,
    completion: Completion,
    adapted: BytesMut,
    block_page: BytesMut,
    blocked: bool,
    requested: bool,
    // Some(at_end) once no more content will be appended
    source_end: Option<bool>,
    done_signalled: bool,
}

impl AdaptedBodyProducer {
    pub fn new(completion: Completion) -> Self {
        Self {
            state: OperationState::Undecided,
            completion,
            adapted: BytesMut::new(),
            block_page: BytesMut::new(),
            blocked: false,
            requested: false,
            source_end: None,
            done_signalled: false,
        }
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Bytes the host has not shifted out yet
    pub fn buffered(&self) -> usize {
        self.active().len()
    }

    fn active(&self) -> &BytesMut {
        if self.blocked {
            &self.block_page
        } else {
            &self.adapted
        }
    }

    fn active_mut(&mut self) -> &mut BytesMut {
        if self.blocked {
            &mut self.block_page
        } else {
            &mut self.adapted
        }
    }

    fn has_something(&self) -> bool {
        self.blocked || !self.adapted.is_empty() || self.source_end.is_some()
    }

    /// Append virgin bytes destined for passthrough.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<BodySignal> {
        if self.blocked || self.state.is_final() || chunk.is_empty() {
            return Vec::new();
        }
        self.adapted.extend_from_slice(chunk);
        let was_on = self.state == OperationState::On;
        let mut signals = self.pump();
        if was_on {
            signals.insert(0, BodySignal::Available);
        }
        signals
    }

    /// No more virgin bytes will be appended.
    pub fn finish_source(&mut self, at_end: bool) -> Vec<BodySignal> {
        if self.source_end.is_none() {
            self.source_end = Some(at_end);
        }
        self.pump()
    }

    /// Serve every future read from the block page.
    pub fn load_block_page(&mut self, body: Bytes) {
        self.blocked = true;
        self.block_page = BytesMut::from(&body[..]);
        self.source_end = Some(false);
    }

    /// Drop any cached bytes and serve `body` instead.
    pub fn replace(&mut self, body: Bytes) {
        self.adapted = BytesMut::from(&body[..]);
        self.source_end = Some(true);
    }

    /// Report the body as done now, unless that already happened.
    pub fn declare_done(&mut self, at_end: bool) -> Option<BodySignal> {
        if self.done_signalled {
            return None;
        }
        self.done_signalled = true;
        Some(BodySignal::Done { at_end })
    }

    /// The host will never take an adapted body.
    pub fn discard(&mut self) -> Result<(), AdapterError> {
        match self.state {
            OperationState::Undecided | OperationState::Waiting => {
                self.state.advance(OperationState::Never)
            }
            _ => Err(AdapterError::Precondition(
                "adapted body discarded after it was started",
            )),
        }
    }

    /// The host is ready to pull.
    pub fn request(&mut self) -> Result<Vec<BodySignal>, AdapterError> {
        match self.state {
            OperationState::Undecided | OperationState::Waiting => {}
            _ => {
                return Err(AdapterError::Precondition(
                    "adapted body requested twice or after it ended",
                ))
            }
        }
        self.requested = true;
        if !self.has_something() {
            self.state.advance(OperationState::Waiting)?;
        }
        Ok(self.pump())
    }

    /// The host wants no more content.
    pub fn stop(&mut self) -> Result<(), AdapterError> {
        if self.state == OperationState::Never {
            return Ok(());
        }
        self.state.advance(OperationState::Complete)
    }

    /// Up to `size` bytes starting at `offset`. Short reads are legal.
    pub fn content(&self, offset: usize, size: usize) -> Result<Bytes, AdapterError> {
        self.ensure_pulling()?;
        let buf = self.active();
        let start = offset.min(buf.len());
        let end = start.saturating_add(size).min(buf.len());
        Ok(Bytes::copy_from_slice(&buf[start..end]))
    }

    /// The host consumed the first `size` bytes.
    pub fn shift(&mut self, size: usize) -> Result<Vec<BodySignal>, AdapterError> {
        self.ensure_pulling()?;
        let buf = self.active_mut();
        let n = size.min(buf.len());
        buf.advance(n);
        trace!("Adapted body shifted by {}, {} left", n, buf.len());
        Ok(self.pump())
    }

    fn ensure_pulling(&self) -> Result<(), AdapterError> {
        match self.state {
            OperationState::On | OperationState::Complete => Ok(()),
            _ => Err(AdapterError::Precondition(
                "adapted body accessed before it was started",
            )),
        }
    }

    fn pump(&mut self) -> Vec<BodySignal> {
        let mut signals = Vec::new();
        if self.requested
            && matches!(self.state, OperationState::Undecided | OperationState::Waiting)
            && self.has_something()
        {
            self.state = OperationState::On;
            signals.push(BodySignal::Available);
        }
        if self.state != OperationState::On || self.done_signalled {
            return signals;
        }
        let finished = match (self.completion, self.source_end) {
            (_, None) => None,
            (Completion::WithSource, Some(at_end)) => Some(at_end),
            (Completion::OnDrain, Some(_)) if self.active().is_empty() => Some(true),
            (Completion::OnDrain, Some(_)) => None,
        };
        if let Some(signal) = finished.and_then(|at_end| self.declare_done(at_end)) {
            signals.push(signal);
        }
        signals
    }
}
