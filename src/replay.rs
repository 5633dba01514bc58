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

//! In-process host used by the CLI and the tests.
//!
//! `ReplayHost` implements the host contract over a fixed message and body.
//! Every host call is written to a shared journal so a driver can react to
//! the adapter's decisions and report them afterwards.

use bytes::{Buf, Bytes, BytesMut};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;
use uuid::Uuid;

use crate::adaptation::Transaction;
use crate::engine_core::errors::AdapterError;
use crate::engine_core::models::{Header, HostDecision, Message, MessageKind, Outcome, Verdict};
use crate::engine_core::traits::{AdapterTransaction, HostTransaction};
use crate::service::ServiceKind;

/// One call the adapter made into the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum HostCall {
    RequestBody,
    RequestMoreBody,
    StopBody,
    ReleaseBodyBytes { size: usize },
    UseVirgin,
    UseAdapted { header: String, has_body: bool },
    AdaptedBodyAvailable,
    AdaptedBodyDone { at_end: bool },
    AdaptationAborted,
}

#[derive(Debug, Default)]
struct HostState {
    calls: Vec<HostCall>,
    // body the host has not made available yet
    pending: Bytes,
    available: BytesMut,
    adapted: Option<Message>,
}

/// Shared view of a `ReplayHost` that outlives the transaction owning it.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    inner: Arc<Mutex<HostState>>,
}

impl Journal {
    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: HostCall) {
        debug!(?call, "Host call");
        self.lock().calls.push(call);
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.lock().calls.clone()
    }

    fn called(&self, call: &HostCall) -> bool {
        self.lock().calls.iter().any(|c| c == call)
    }

    /// Make up to `max` more body bytes available. Returns how many moved.
    pub fn deliver_chunk(&self, max: usize) -> usize {
        let mut state = self.lock();
        let n = max.max(1).min(state.pending.len());
        let chunk = state.pending.split_to(n);
        state.available.extend_from_slice(&chunk);
        n
    }

    pub fn pending_body(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn body_requested(&self) -> bool {
        self.called(&HostCall::RequestBody)
    }

    pub fn body_stopped(&self) -> bool {
        self.called(&HostCall::StopBody)
    }

    pub fn adapted_body_available(&self) -> bool {
        self.called(&HostCall::AdaptedBodyAvailable)
    }

    /// `Some(at_end)` once the adapter declared the adapted body done
    pub fn adapted_body_done(&self) -> Option<bool> {
        self.lock().calls.iter().find_map(|c| match c {
            HostCall::AdaptedBodyDone { at_end } => Some(*at_end),
            _ => None,
        })
    }

    /// The message handed over with `use_adapted`
    pub fn adapted(&self) -> Option<Message> {
        self.lock().adapted.clone()
    }

    pub fn decision(&self) -> Option<HostDecision> {
        self.lock().calls.iter().find_map(|c| match c {
            HostCall::UseVirgin => Some(HostDecision::UseVirgin),
            HostCall::UseAdapted { .. } => Some(HostDecision::UseAdapted),
            _ => None,
        })
    }
}

pub struct ReplayHost {
    virgin: Message,
    cause: Option<Message>,
    journal: Journal,
}

impl ReplayHost {
    fn with_body(virgin: Message, cause: Option<Message>, body: Bytes) -> Self {
        let journal = Journal::default();
        journal.lock().pending = body;
        Self {
            virgin,
            cause,
            journal,
        }
    }

    /// A request; `body` of `None` means the message has no body at all.
    pub fn request(header: Header, body: Option<Bytes>) -> Self {
        let virgin = Message::new(MessageKind::Request, header, body.is_some());
        Self::with_body(virgin, None, body.unwrap_or_default())
    }

    /// A response together with the request that caused it.
    pub fn response(cause: Header, header: Header, body: Option<Bytes>) -> Self {
        let cause = Message::new(MessageKind::Request, cause, false);
        let virgin = Message::new(MessageKind::Response, header, body.is_some());
        Self::with_body(virgin, Some(cause), body.unwrap_or_default())
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    pub fn deliver_chunk(&mut self, max: usize) -> usize {
        self.journal.deliver_chunk(max)
    }
}

impl HostTransaction for ReplayHost {
    fn virgin(&self) -> &Message {
        &self.virgin
    }

    fn cause(&self) -> Option<&Message> {
        self.cause.as_ref()
    }

    fn request_body(&mut self) {
        self.journal.record(HostCall::RequestBody);
    }

    fn request_more_body(&mut self) {
        self.journal.record(HostCall::RequestMoreBody);
    }

    fn stop_body(&mut self) {
        self.journal.record(HostCall::StopBody);
    }

    fn take_body_bytes(&mut self, offset: usize, size: Option<usize>) -> Bytes {
        let state = self.journal.lock();
        let start = offset.min(state.available.len());
        let end = match size {
            Some(size) => start.saturating_add(size).min(state.available.len()),
            None => state.available.len(),
        };
        Bytes::copy_from_slice(&state.available[start..end])
    }

    fn release_body_bytes(&mut self, size: usize) {
        {
            let mut state = self.journal.lock();
            let n = size.min(state.available.len());
            state.available.advance(n);
        }
        self.journal.record(HostCall::ReleaseBodyBytes { size });
    }

    fn use_virgin(&mut self) {
        self.journal.record(HostCall::UseVirgin);
    }

    fn use_adapted(&mut self, message: Message) {
        self.journal.record(HostCall::UseAdapted {
            header: String::from_utf8_lossy(message.header().image()).into_owned(),
            has_body: message.has_body(),
        });
        self.journal.lock().adapted = Some(message);
    }

    fn note_adapted_body_available(&mut self) {
        self.journal.record(HostCall::AdaptedBodyAvailable);
    }

    fn note_adapted_body_done(&mut self, at_end: bool) {
        self.journal.record(HostCall::AdaptedBodyDone { at_end });
    }

    fn adaptation_aborted(&mut self) {
        self.journal.record(HostCall::AdaptationAborted);
    }
}

/// What a replayed transaction ended with
#[derive(Debug, Clone, Serialize)]
pub struct ReplayOutcome {
    pub xaction: Uuid,
    pub service: ServiceKind,
    pub verdicts: Vec<Verdict>,
    pub outcome: Option<Outcome>,
    pub decision: Option<HostDecision>,
    pub adapted_header: Option<String>,
    pub adapted_body: Option<String>,
    pub calls: Vec<HostCall>,
}

/// Run a transaction to completion the way a host would: start it, feed the
/// virgin body in `chunk_size` pieces while it is wanted, and pull the
/// adapted body once a message with a body was handed over.
pub async fn drive<S>(
    mut xaction: Transaction<ReplayHost, S>,
    journal: Journal,
    chunk_size: usize,
) -> Result<ReplayOutcome, AdapterError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let chunk_size = chunk_size.max(1);
    let mut adapted_body = BytesMut::new();
    let mut pulling = false;
    let mut virgin_done = false;

    xaction.start().await?;
    loop {
        if !pulling && journal.adapted().is_some_and(|m| m.has_body()) {
            xaction.make_adapted_body()?;
            pulling = true;
        }
        if pulling && journal.adapted_body_available() {
            loop {
                let chunk = xaction.adapted_content(0, chunk_size)?;
                if chunk.is_empty() {
                    break;
                }
                adapted_body.extend_from_slice(&chunk);
                xaction.shift_adapted_content(chunk.len())?;
            }
        }

        let feeding = journal.body_requested() && !journal.body_stopped() && !virgin_done;
        if !feeding {
            break;
        }
        if journal.pending_body() > 0 {
            journal.deliver_chunk(chunk_size);
            xaction.note_virgin_body_available().await?;
        } else {
            virgin_done = true;
            xaction.note_virgin_body_done(true).await?;
        }
    }

    let xaction_id = xaction.id();
    let service = xaction.kind();
    let verdicts = xaction.verdicts().to_vec();
    let outcome = xaction.outcome();
    drop(xaction);

    let adapted = journal.adapted();
    Ok(ReplayOutcome {
        xaction: xaction_id,
        service,
        verdicts,
        outcome,
        decision: journal.decision(),
        adapted_header: adapted
            .as_ref()
            .map(|m| String::from_utf8_lossy(m.header().image()).into_owned()),
        adapted_body: adapted
            .filter(|m| m.has_body())
            .map(|_| String::from_utf8_lossy(&adapted_body).into_owned()),
        calls: journal.calls(),
    })
}
