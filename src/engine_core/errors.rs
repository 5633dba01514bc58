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

//! Adapter error types.
//!
//! Every failure is fatal to the transaction it happens in. Nothing here is
//! ever turned into a passthrough or block decision.

use std::time::Duration;
use thiserror::Error;

use crate::engine_core::models::ProtocolPhase;

/// Main error type for the adapter
#[derive(Error, Debug)]
pub enum AdapterError {
    /// Missing, empty or unsupported setting; raised before any transaction exists
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Socket creation or connect failure towards the filter service
    #[error("Failed to connect to filter service at '{address}': {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error on an established channel
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking channel operation exceeded its deadline
    #[error("Timed out after {after:?} while {operation}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Framing or sequencing violation by the peer
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Verdict byte outside the alphabet allowed in this phase
    #[error("Unexpected verdict byte {} during {phase}", describe_byte(.byte))]
    UnexpectedVerdict { phase: ProtocolPhase, byte: u8 },

    /// A single-byte marker could not be written in one go
    #[error("Short write of {what}: wrote {written} of {expected} bytes")]
    ShortWrite {
        what: &'static str,
        written: usize,
        expected: usize,
    },

    /// The host (or the adapter itself) broke a call-ordering contract
    #[error("Precondition violated: {0}")]
    Precondition(&'static str),

    /// A host call was attempted after the last host call
    #[error("Host transaction is no longer attached")]
    HostDetached,

    /// A header block returned by the filter service could not be parsed
    #[error("Header parse error: {0}")]
    HeaderParse(String),
}

fn describe_byte(byte: &u8) -> String {
    if byte.is_ascii_graphic() {
        format!("'{}'", *byte as char)
    } else {
        format!("0x{:02x}", byte)
    }
}

impl AdapterError {
    /// Get user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            AdapterError::Configuration(reason) => format!("Configuration error: {}", reason),
            AdapterError::Connect { .. } => "Filter service unavailable".to_string(),
            AdapterError::Io(_) => "Internal system error".to_string(),
            AdapterError::Timeout { .. } => "Filter service did not respond".to_string(),
            AdapterError::ProtocolViolation(_) => "Internal error".to_string(),
            AdapterError::UnexpectedVerdict { .. } => "Internal error".to_string(),
            AdapterError::ShortWrite { .. } => "Internal system error".to_string(),
            AdapterError::Precondition(_) => "Internal error".to_string(),
            AdapterError::HostDetached => "Internal error".to_string(),
            AdapterError::HeaderParse(_) => "Internal error".to_string(),
        }
    }
}
