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

//! Domain models for the filter-shim adapter.
//!
//! This module contains pure data structures representing messages,
//! verdicts and the body lifecycle states. It is free of I/O side effects.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engine_core::constants::wire;
use crate::engine_core::errors::AdapterError;

/// Which side of the HTTP exchange a message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Request,
    Response,
}

/// Raw header block of an HTTP message.
///
/// HTTP semantics are out of scope: the image is kept as opaque bytes and
/// only split into lines for inspection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Header {
    image: Bytes,
}

impl Header {
    pub fn from_image(image: impl Into<Bytes>) -> Self {
        Self {
            image: image.into(),
        }
    }

    /// Raw bytes as they go on the wire
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// Replace this header with a block returned by the filter service.
    pub fn parse(&mut self, block: &[u8]) -> Result<(), AdapterError> {
        if block.contains(&0) {
            return Err(AdapterError::HeaderParse(
                "header block contains NUL bytes".to_string(),
            ));
        }
        if block.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(AdapterError::HeaderParse("header block is empty".to_string()));
        }
        self.image = Bytes::copy_from_slice(block);
        Ok(())
    }

    /// Non-empty lines of the header, without line terminators
    pub fn lines(&self) -> impl Iterator<Item = &[u8]> {
        self.image
            .split(|b| *b == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
            .filter(|line| !line.is_empty())
    }

    pub fn first_line(&self) -> Option<&[u8]> {
        self.lines().next()
    }
}

/// An HTTP message as the adapter sees it: header plus body presence.
///
/// Cloning copies the header and the body flag, never body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    kind: MessageKind,
    header: Header,
    has_body: bool,
}

impl Message {
    pub fn new(kind: MessageKind, header: Header, has_body: bool) -> Self {
        Self {
            kind,
            header,
            has_body,
        }
    }

    /// Empty response, as produced by the host for request satisfaction
    pub fn empty_response() -> Self {
        Self::new(MessageKind::Response, Header::default(), false)
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    pub fn has_body(&self) -> bool {
        self.has_body
    }

    /// Flag the message as carrying a body. The bytes are pulled separately.
    pub fn add_body(&mut self) {
        self.has_body = true;
    }
}

/// Lifecycle of one body direction (virgin receiving or adapted sending)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    Undecided,
    Waiting,
    On,
    Complete,
    Never,
}

impl OperationState {
    fn rank(self) -> u8 {
        match self {
            OperationState::Undecided => 0,
            OperationState::Waiting => 1,
            OperationState::On => 2,
            OperationState::Complete | OperationState::Never => 3,
        }
    }

    pub fn is_final(self) -> bool {
        matches!(self, OperationState::Complete | OperationState::Never)
    }

    /// Move forward to `next`. Staying put is allowed; going back is not.
    pub fn advance(&mut self, next: OperationState) -> Result<(), AdapterError> {
        if *self == next {
            return Ok(());
        }
        if self.is_final() || next.rank() < self.rank() {
            return Err(AdapterError::Precondition(
                "body lifecycle state cannot move backwards",
            ));
        }
        *self = next;
        Ok(())
    }
}

/// Round-trip phase a verdict byte is read in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolPhase {
    /// Single REQMOD verdict after the request header
    ReqmodVerdict,
    /// First RESPMOD verdict after cause and response headers
    RespmodPreVerdict,
    /// Second RESPMOD verdict after the body was streamed
    RespmodFinalVerdict,
}

impl ProtocolPhase {
    /// Verdicts the filter service may send in this phase
    pub fn allowed(self) -> &'static [Verdict] {
        match self {
            ProtocolPhase::ReqmodVerdict => &[Verdict::UseVirgin, Verdict::Modify, Verdict::Block],
            ProtocolPhase::RespmodPreVerdict => &[Verdict::UseVirgin, Verdict::NeedsScan],
            ProtocolPhase::RespmodFinalVerdict => &[Verdict::UseVirgin, Verdict::Modify],
        }
    }

    /// Whether the verdict byte itself is acknowledged with `r`
    pub fn acknowledges_verdict(self) -> bool {
        !matches!(self, ProtocolPhase::ReqmodVerdict)
    }
}

impl fmt::Display for ProtocolPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolPhase::ReqmodVerdict => write!(f, "REQMOD verdict"),
            ProtocolPhase::RespmodPreVerdict => write!(f, "RESPMOD pre-verdict"),
            ProtocolPhase::RespmodFinalVerdict => write!(f, "RESPMOD final verdict"),
        }
    }
}

/// Single-byte outcome code sent by the filter service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    UseVirgin,
    Modify,
    Block,
    NeedsScan,
}

impl Verdict {
    pub fn as_byte(self) -> u8 {
        match self {
            Verdict::UseVirgin => wire::VERDICT_USE_VIRGIN,
            Verdict::Modify => wire::VERDICT_MODIFY,
            Verdict::Block => wire::VERDICT_BLOCK,
            Verdict::NeedsScan => wire::VERDICT_NEEDS_SCAN,
        }
    }

    /// Decode a verdict byte, rejecting anything outside the phase alphabet.
    pub fn from_wire(byte: u8, phase: ProtocolPhase) -> Result<Self, AdapterError> {
        phase
            .allowed()
            .iter()
            .copied()
            .find(|v| v.as_byte() == byte)
            .ok_or(AdapterError::UnexpectedVerdict { phase, byte })
    }
}

/// Terminal decision delivered to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostDecision {
    UseVirgin,
    UseAdapted,
}

/// Outcome fixed by the first decisive verdict of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passthrough,
    ModifiedHeader,
    Blocked,
    Replaced,
}

/// Header and body blocks returned for a modify/block verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub header: Bytes,
    pub body: Bytes,
}
