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

//! Request-side transaction.
//!
//! One verdict decides the outcome before any body is looked at:
//! - `v`: the original request goes through unchanged.
//! - `m`: the filter service sends a new header; the virgin body is reused.
//! - `b`: the filter service sends a block page that answers the request
//!   directly (request satisfaction).

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;
use tracing::{debug, info};
use uuid::Uuid;

use super::host_link::HostLink;
use super::producer::{AdaptedBodyProducer, Completion};
use super::relay::BodyRelay;
use super::{forward_signals, XactionOptions};
use crate::engine_core::audit::VerdictAudit;
use crate::engine_core::errors::AdapterError;
use crate::engine_core::models::{
    HostDecision, Message, OperationState, Outcome, ProtocolPhase, Verdict,
};
use crate::engine_core::traits::{AdapterTransaction, HostTransaction};
use crate::protocol::verdict;
use crate::service::ServiceKind;
use crate::wire::channel::FramedChannel;

pub struct ReqmodTransaction<H: HostTransaction, S = UnixStream> {
    id: Uuid,
    options: XactionOptions,
    host: HostLink<H>,
    channel: FramedChannel<S>,
    relay: BodyRelay,
    producer: AdaptedBodyProducer,
    verdicts: Vec<Verdict>,
    outcome: Option<Outcome>,
    audit: VerdictAudit,
    started: bool,
}

impl<H, S> ReqmodTransaction<H, S>
where
    H: HostTransaction,
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(host: H, channel: FramedChannel<S>, options: XactionOptions) -> Self {
        let id = Uuid::new_v4();
        debug!(xaction = %id, "REQMOD transaction created");
        Self {
            id,
            options,
            host: HostLink::new(host),
            channel,
            relay: BodyRelay::new(),
            producer: AdaptedBodyProducer::new(Completion::WithSource),
            verdicts: Vec::new(),
            outcome: None,
            audit: VerdictAudit,
            started: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn verdicts(&self) -> &[Verdict] {
        &self.verdicts
    }

    fn settle(&mut self, outcome: Outcome) {
        self.outcome = Some(outcome);
        self.audit
            .record(&self.id, ServiceKind::Reqmod, &self.verdicts, outcome);
    }

    fn stop_virgin(&mut self) -> Result<(), AdapterError> {
        if self.relay.stop()? {
            debug!(xaction = %self.id, "Asking host to stop the virgin body");
            self.host.get_mut()?.stop_body();
        }
        Ok(())
    }

    fn use_virgin(&mut self) -> Result<(), AdapterError> {
        // the host forwards the original body itself
        self.relay.stop()?;
        self.host.use_virgin()?;
        self.settle(Outcome::Passthrough);
        Ok(())
    }

    async fn use_modified(&mut self, mut adapted: Message) -> Result<(), AdapterError> {
        let header = verdict::receive_block(&mut self.channel).await?;
        if self.options.debug {
            debug!(xaction = %self.id, "Modified request header:\n{}", String::from_utf8_lossy(&header));
        }
        adapted.header_mut().parse(&header)?;
        self.host.use_adapted(adapted)?;
        self.settle(Outcome::ModifiedHeader);
        Ok(())
    }

    async fn block(&mut self) -> Result<(), AdapterError> {
        let page = verdict::receive_replacement(&mut self.channel).await?;
        let mut response = self.host.get()?.new_response();
        response.header_mut().parse(&page.header)?;
        response.add_body();

        // the request is answered here; its body is no longer needed
        self.stop_virgin()?;
        self.producer.load_block_page(page.body);
        self.host.use_adapted(response)?;
        let done = self.producer.declare_done(false);
        forward_signals(&mut self.host, done)?;
        self.settle(Outcome::Blocked);
        Ok(())
    }
}

#[async_trait]
impl<H, S> AdapterTransaction for ReqmodTransaction<H, S>
where
    H: HostTransaction + 'static,
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn kind(&self) -> ServiceKind {
        ServiceKind::Reqmod
    }

    async fn start(&mut self) -> Result<(), AdapterError> {
        if self.started {
            return Err(AdapterError::Precondition("transaction started twice"));
        }
        self.started = true;

        let adapted = self.host.get()?.virgin().clone();
        if adapted.has_body() {
            self.relay.begin()?;
            self.host.get_mut()?.request_body();
        } else {
            self.relay.skip()?;
        }
        if self.options.debug {
            debug!(
                xaction = %self.id,
                has_body = adapted.has_body(),
                "Original request header:\n{}",
                String::from_utf8_lossy(adapted.header().image())
            );
        }

        verdict::send_headers(&mut self.channel, &[adapted.header().image()]).await?;
        let received = verdict::await_verdict(&mut self.channel, ProtocolPhase::ReqmodVerdict).await?;
        self.verdicts.push(received);
        info!(xaction = %self.id, verdict = ?received, "REQMOD verdict");

        match received {
            Verdict::UseVirgin => self.use_virgin(),
            Verdict::Modify => self.use_modified(adapted).await,
            Verdict::Block => self.block().await,
            Verdict::NeedsScan => Err(AdapterError::UnexpectedVerdict {
                phase: ProtocolPhase::ReqmodVerdict,
                byte: received.as_byte(),
            }),
        }
    }

    fn stop(&mut self) {
        debug!(xaction = %self.id, "Host stopped the transaction");
        self.host.detach();
    }

    fn discard_adapted_body(&mut self) -> Result<(), AdapterError> {
        if self.outcome.is_none() {
            return Err(AdapterError::Precondition(
                "adapted body discarded before the verdict is known",
            ));
        }
        self.producer.discard()?;
        self.stop_virgin()
    }

    fn make_adapted_body(&mut self) -> Result<(), AdapterError> {
        if self.host.decision() != Some(HostDecision::UseAdapted) {
            return Err(AdapterError::Precondition(
                "adapted body requested without an adapted message",
            ));
        }
        if !self.producer.is_blocked() && self.relay.state() == OperationState::Never {
            return Err(AdapterError::Precondition(
                "adapted body requested for a request without a body",
            ));
        }
        let signals = self.producer.request()?;
        forward_signals(&mut self.host, signals)
    }

    fn make_more_adapted_body(&mut self) -> Result<(), AdapterError> {
        if !self.producer.is_blocked()
            && self.relay.state() == OperationState::On
        {
            self.host.get_mut()?.request_more_body();
        }
        Ok(())
    }

    fn stop_making_adapted_body(&mut self) -> Result<(), AdapterError> {
        self.producer.stop()?;
        self.stop_virgin()
    }

    fn adapted_content(&self, offset: usize, size: usize) -> Result<Bytes, AdapterError> {
        self.producer.content(offset, size)
    }

    fn shift_adapted_content(&mut self, size: usize) -> Result<(), AdapterError> {
        let signals = self.producer.shift(size)?;
        forward_signals(&mut self.host, signals)
    }

    async fn note_virgin_body_done(&mut self, at_end: bool) -> Result<(), AdapterError> {
        debug!(xaction = %self.id, at_end, "Virgin request body complete");
        if !self.relay.finish()? {
            return Ok(());
        }
        let signals = self.producer.finish_source(at_end);
        forward_signals(&mut self.host, signals)
    }

    async fn note_virgin_body_available(&mut self) -> Result<(), AdapterError> {
        let chunk = self.relay.pull(self.host.get_mut()?)?;
        if self.options.debug {
            debug!(xaction = %self.id, "Buffered {} virgin request bytes", chunk.len());
        }
        let signals = self.producer.push(&chunk);
        forward_signals(&mut self.host, signals)
    }
}
