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

//! filter-shim: an HTTP content-adaptation shim.
//!
//! This library relays request (REQMOD) and response (RESPMOD) messages from
//! a proxy host to an external filter service over a local socket, and turns
//! the service's single-byte verdicts back into host decisions: pass the
//! original through, rewrite the header, replace the body, or block.

pub mod adaptation;
pub mod config;
pub mod engine_core;
pub mod protocol;
pub mod registry;
pub mod replay;
pub mod service;
pub mod wire;
