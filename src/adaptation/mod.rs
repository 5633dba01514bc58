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

//! Transaction orchestration.
//!
//! Body relay, adapted body producer and the host link are combined into the
//! two transaction state machines. `Transaction` dispatches statically over
//! both so a service can hand out one concrete type.

pub mod host_link;
pub mod producer;
pub mod relay;
pub mod reqmod;
pub mod respmod;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;
use uuid::Uuid;

use crate::config::Config;
use crate::engine_core::errors::AdapterError;
use crate::engine_core::models::{Outcome, Verdict};
use crate::engine_core::traits::{AdapterTransaction, HostTransaction};
use crate::service::ServiceKind;

use host_link::HostLink;
use producer::{BodySignal, DonePolicy};
pub use reqmod::ReqmodTransaction;
pub use respmod::RespmodTransaction;

/// Per-transaction settings taken from the service configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct XactionOptions {
    pub debug: bool,
    pub done_policy: DonePolicy,
}

impl From<&Config> for XactionOptions {
    fn from(config: &Config) -> Self {
        Self {
            debug: config.debug,
            done_policy: config.done_policy,
        }
    }
}

pub(crate) fn forward_signals<H, I>(host: &mut HostLink<H>, signals: I) -> Result<(), AdapterError>
where
    H: HostTransaction,
    I: IntoIterator<Item = BodySignal>,
{
    for signal in signals {
        let host = host.get_mut()?;
        match signal {
            BodySignal::Available => host.note_adapted_body_available(),
            BodySignal::Done { at_end } => host.note_adapted_body_done(at_end),
        }
    }
    Ok(())
}

pub enum Transaction<H: HostTransaction, S = UnixStream> {
    Reqmod(ReqmodTransaction<H, S>),
    Respmod(RespmodTransaction<H, S>),
}

impl<H, S> Transaction<H, S>
where
    H: HostTransaction,
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn id(&self) -> Uuid {
        match self {
            Self::Reqmod(x) => x.id(),
            Self::Respmod(x) => x.id(),
        }
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            Self::Reqmod(x) => x.outcome(),
            Self::Respmod(x) => x.outcome(),
        }
    }

    pub fn verdicts(&self) -> &[Verdict] {
        match self {
            Self::Reqmod(x) => x.verdicts(),
            Self::Respmod(x) => x.verdicts(),
        }
    }
}

#[async_trait]
impl<H, S> AdapterTransaction for Transaction<H, S>
where
    H: HostTransaction + 'static,
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn kind(&self) -> ServiceKind {
        match self {
            Self::Reqmod(x) => x.kind(),
            Self::Respmod(x) => x.kind(),
        }
    }

    async fn start(&mut self) -> Result<(), AdapterError> {
        match self {
            Self::Reqmod(x) => x.start().await,
            Self::Respmod(x) => x.start().await,
        }
    }

    fn stop(&mut self) {
        match self {
            Self::Reqmod(x) => x.stop(),
            Self::Respmod(x) => x.stop(),
        }
    }

    fn discard_adapted_body(&mut self) -> Result<(), AdapterError> {
        match self {
            Self::Reqmod(x) => x.discard_adapted_body(),
            Self::Respmod(x) => x.discard_adapted_body(),
        }
    }

    fn make_adapted_body(&mut self) -> Result<(), AdapterError> {
        match self {
            Self::Reqmod(x) => x.make_adapted_body(),
            Self::Respmod(x) => x.make_adapted_body(),
        }
    }

    fn make_more_adapted_body(&mut self) -> Result<(), AdapterError> {
        match self {
            Self::Reqmod(x) => x.make_more_adapted_body(),
            Self::Respmod(x) => x.make_more_adapted_body(),
        }
    }

    fn stop_making_adapted_body(&mut self) -> Result<(), AdapterError> {
        match self {
            Self::Reqmod(x) => x.stop_making_adapted_body(),
            Self::Respmod(x) => x.stop_making_adapted_body(),
        }
    }

    fn adapted_content(&self, offset: usize, size: usize) -> Result<Bytes, AdapterError> {
        match self {
            Self::Reqmod(x) => x.adapted_content(offset, size),
            Self::Respmod(x) => x.adapted_content(offset, size),
        }
    }

    fn shift_adapted_content(&mut self, size: usize) -> Result<(), AdapterError> {
        match self {
            Self::Reqmod(x) => x.shift_adapted_content(size),
            Self::Respmod(x) => x.shift_adapted_content(size),
        }
    }

    async fn note_virgin_body_done(&mut self, at_end: bool) -> Result<(), AdapterError> {
        match self {
            Self::Reqmod(x) => x.note_virgin_body_done(at_end).await,
            Self::Respmod(x) => x.note_virgin_body_done(at_end).await,
        }
    }

    async fn note_virgin_body_available(&mut self) -> Result<(), AdapterError> {
        match self {
            Self::Reqmod(x) => x.note_virgin_body_available().await,
            Self::Respmod(x) => x.note_virgin_body_available().await,
        }
    }
}
