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

//! Response-side transaction.
//!
//! The cause and response headers go out first. A `v` pre-verdict ends the
//! transaction; `s` means the body has to be streamed to the filter service
//! before the final verdict (`v` or `m`) can be read.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;
use tracing::{debug, info};
use uuid::Uuid;

use super::host_link::HostLink;
use super::producer::{AdaptedBodyProducer, Completion, DonePolicy};
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

pub struct RespmodTransaction<H: HostTransaction, S = UnixStream> {
    id: Uuid,
    options: XactionOptions,
    host: HostLink<H>,
    channel: FramedChannel<S>,
    relay: BodyRelay,
    producer: AdaptedBodyProducer,
    // original response, reused when the final verdict is `v`
    cached: Option<Message>,
    verdicts: Vec<Verdict>,
    outcome: Option<Outcome>,
    audit: VerdictAudit,
    started: bool,
}

impl<H, S> RespmodTransaction<H, S>
where
    H: HostTransaction,
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(host: H, channel: FramedChannel<S>, options: XactionOptions) -> Self {
        let id = Uuid::new_v4();
        debug!(xaction = %id, "RESPMOD transaction created");
        Self {
            id,
            options,
            host: HostLink::new(host),
            channel,
            relay: BodyRelay::new(),
            producer: AdaptedBodyProducer::new(Completion::OnDrain),
            cached: None,
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
            .record(&self.id, ServiceKind::Respmod, &self.verdicts, outcome);
    }

    fn stop_virgin(&mut self) -> Result<(), AdapterError> {
        if self.relay.stop()? {
            debug!(xaction = %self.id, "Asking host to stop the virgin body");
            self.host.get_mut()?.stop_body();
        }
        Ok(())
    }

    /// Second round trip, once the whole body has been streamed.
    async fn conclude(&mut self) -> Result<(), AdapterError> {
        let received =
            verdict::await_verdict(&mut self.channel, ProtocolPhase::RespmodFinalVerdict).await?;
        self.verdicts.push(received);
        info!(xaction = %self.id, verdict = ?received, "RESPMOD final verdict");

        match received {
            Verdict::UseVirgin => {
                let cached = self.cached.take().ok_or(AdapterError::Precondition(
                    "final verdict without a cached response",
                ))?;
                if cached.has_body() {
                    let signals = self.producer.finish_source(true);
                    self.host.use_adapted(cached)?;
                    forward_signals(&mut self.host, signals)?;
                } else {
                    self.host.use_virgin()?;
                }
                self.settle(Outcome::Passthrough);
            }
            Verdict::Modify => {
                let replacement = verdict::receive_replacement(&mut self.channel).await?;
                if self.options.debug {
                    debug!(
                        xaction = %self.id,
                        "Replacement response header:\n{}",
                        String::from_utf8_lossy(&replacement.header)
                    );
                }
                let mut response = self.host.get()?.new_response();
                response.header_mut().parse(&replacement.header)?;
                response.add_body();

                self.cached = None;
                self.producer.replace(replacement.body);
                self.host.use_adapted(response)?;
                if self.options.done_policy == DonePolicy::Immediate {
                    let done = self.producer.declare_done(true);
                    forward_signals(&mut self.host, done)?;
                }
                self.settle(Outcome::Replaced);
            }
            Verdict::Block | Verdict::NeedsScan => {
                return Err(AdapterError::UnexpectedVerdict {
                    phase: ProtocolPhase::RespmodFinalVerdict,
                    byte: received.as_byte(),
                })
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<H, S> AdapterTransaction for RespmodTransaction<H, S>
where
    H: HostTransaction + 'static,
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn kind(&self) -> ServiceKind {
        ServiceKind::Respmod
    }

    async fn start(&mut self) -> Result<(), AdapterError> {
        if self.started {
            return Err(AdapterError::Precondition("transaction started twice"));
        }
        self.started = true;

        let (virgin, cause) = {
            let host = self.host.get()?;
            let cause = host.cause().cloned().ok_or(AdapterError::Precondition(
                "response transaction without a cause",
            ))?;
            (host.virgin().clone(), cause)
        };
        if self.options.debug {
            debug!(
                xaction = %self.id,
                cause_size = cause.header().image().len(),
                response_size = virgin.header().image().len(),
                "Cause header:\n{}",
                String::from_utf8_lossy(cause.header().image())
            );
        }

        verdict::send_headers(
            &mut self.channel,
            &[cause.header().image(), virgin.header().image()],
        )
        .await?;
        let received =
            verdict::await_verdict(&mut self.channel, ProtocolPhase::RespmodPreVerdict).await?;
        self.verdicts.push(received);
        info!(xaction = %self.id, verdict = ?received, "RESPMOD pre-verdict");

        match received {
            Verdict::UseVirgin => {
                self.relay.skip()?;
                self.producer.discard()?;
                self.host.use_virgin()?;
                self.settle(Outcome::Passthrough);
                Ok(())
            }
            Verdict::NeedsScan => {
                let has_body = virgin.has_body();
                self.cached = Some(virgin);
                if has_body {
                    self.relay.begin()?;
                    self.host.get_mut()?.request_body();
                    Ok(())
                } else {
                    // nothing to stream; the final verdict follows right away
                    self.relay.skip()?;
                    self.conclude().await
                }
            }
            Verdict::Modify | Verdict::Block => Err(AdapterError::UnexpectedVerdict {
                phase: ProtocolPhase::RespmodPreVerdict,
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
        let signals = self.producer.request()?;
        forward_signals(&mut self.host, signals)
    }

    fn make_more_adapted_body(&mut self) -> Result<(), AdapterError> {
        // all content is buffered by the time the host pulls it
        if self.relay.state() == OperationState::On {
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
        debug!(
            xaction = %self.id,
            at_end,
            streamed = self.relay.received(),
            "Virgin response body complete"
        );
        if !self.relay.finish()? {
            return Ok(());
        }
        self.conclude().await
    }

    async fn note_virgin_body_available(&mut self) -> Result<(), AdapterError> {
        let chunk = self.relay.pull(self.host.get_mut()?)?;
        if self.options.debug {
            debug!(xaction = %self.id, "Streaming {} virgin response bytes", chunk.len());
        }
        self.channel.write_exact(&chunk).await?;
        // kept in case the final verdict is `v`
        self.producer.push(&chunk);
        Ok(())
    }
}
