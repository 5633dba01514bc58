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

//! filter-shim Constants - Single source of truth for all wire and configuration values.
//!
//! This module centralizes the verdict alphabet, framing markers, limits and
//! configuration names so the channel, protocol and service layers agree.

/// Filter service wire alphabet
pub mod wire {
    /// Use the original message unmodified
    pub const VERDICT_USE_VIRGIN: u8 = b'v';
    /// Use the modified header (request) or replacement (response)
    pub const VERDICT_MODIFY: u8 = b'm';
    /// Block with a synthetic response (request side only)
    pub const VERDICT_BLOCK: u8 = b'b';
    /// Stream the body, final verdict follows (response side only)
    pub const VERDICT_NEEDS_SCAN: u8 = b's';
    /// "Message received" acknowledgement sent after each framed block
    pub const ACK_MESSAGE_RECEIVED: u8 = b'r';
    /// Terminator closing every framed block sent by the filter service
    pub const BLOCK_TERMINATOR: &[u8] = b"\n\n\0\0";
    /// Trailing part of the terminator removed before the block is used
    pub const BLOCK_RESERVED_SUFFIX: &[u8] = b"\0\0";
    /// Size of the scratch buffer used for each underlying read
    pub const READ_CHUNK_SIZE: usize = 1024;
}

/// Transport Limits (DoS Protection)
pub mod limits {
    /// Maximum size of one framed block before the terminator (10 MB)
    pub const MAX_BLOCK_SIZE_BYTES: usize = 10 * 1024 * 1024;
    /// Default deadline for every blocking channel operation
    pub const DEFAULT_IO_TIMEOUT_MS: u64 = 30_000;
}

/// Configuration names: environment variables and host option names
pub mod config {
    pub const ENV_LISTEN_SOCKET: &str = "FILTER_SHIM_LISTEN_SOCKET";
    pub const ENV_DEBUG: &str = "FILTER_SHIM_DEBUG";
    pub const ENV_IO_TIMEOUT_MS: &str = "FILTER_SHIM_IO_TIMEOUT_MS";
    pub const ENV_EOF_POLICY: &str = "FILTER_SHIM_EOF_POLICY";
    pub const ENV_DONE_POLICY: &str = "FILTER_SHIM_DONE_POLICY";
    pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
    pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

    pub const OPT_LISTEN_SOCKET: &str = "listen_socket";
    /// Name used by older host configurations
    pub const OPT_LISTEN_SOCKET_LEGACY: &str = "ecapguardian_listen_socket";
    pub const OPT_DEBUG: &str = "debug";
    pub const OPT_IO_TIMEOUT_MS: &str = "io_timeout_ms";
    pub const OPT_EOF_POLICY: &str = "eof_policy";
    pub const OPT_DONE_POLICY: &str = "done_policy";
}

/// Service identity
pub mod service {
    pub const PACKAGE_NAME: &str = "filter-shim";
    pub const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const URI_REQMOD: &str = "ecap://filter-shim.local/reqmod";
    pub const URI_RESPMOD: &str = "ecap://filter-shim.local/respmod";
}
