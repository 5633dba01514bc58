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

//! Non-owning link to the host transaction.
//!
//! The link records the terminal decision exactly once. `use_virgin` is the
//! last host call and detaches the handle; `use_adapted` keeps it because the
//! host still pulls the adapted body afterwards.

use tracing::debug;

use crate::engine_core::errors::AdapterError;
use crate::engine_core::models::{HostDecision, Message};
use crate::engine_core::traits::HostTransaction;

pub struct HostLink<H: HostTransaction> {
    host: Option<H>,
    decision: Option<HostDecision>,
}

impl<H: HostTransaction> HostLink<H> {
    pub fn new(host: H) -> Self {
        Self {
            host: Some(host),
            decision: None,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.host.is_some()
    }

    pub fn decision(&self) -> Option<HostDecision> {
        self.decision
    }

    pub fn get(&self) -> Result<&H, AdapterError> {
        self.host.as_ref().ok_or(AdapterError::HostDetached)
    }

    pub fn get_mut(&mut self) -> Result<&mut H, AdapterError> {
        self.host.as_mut().ok_or(AdapterError::HostDetached)
    }

    fn record(&mut self, decision: HostDecision) -> Result<&mut H, AdapterError> {
        let host = self.host.as_mut().ok_or(AdapterError::HostDetached)?;
        if self.decision.is_some() {
            return Err(AdapterError::Precondition(
                "terminal host decision was already delivered",
            ));
        }
        self.decision = Some(decision);
        Ok(host)
    }

    /// Last host call: use the original message. The handle is released.
    pub fn use_virgin(&mut self) -> Result<(), AdapterError> {
        self.record(HostDecision::UseVirgin)?.use_virgin();
        self.host = None;
        Ok(())
    }

    /// Terminal decision: use `message`. The host keeps pulling the adapted body.
    pub fn use_adapted(&mut self, message: Message) -> Result<(), AdapterError> {
        self.record(HostDecision::UseAdapted)?.use_adapted(message);
        Ok(())
    }

    /// Forget the host without telling it anything.
    pub fn detach(&mut self) {
        self.host = None;
    }
}

impl<H: HostTransaction> Drop for HostLink<H> {
    fn drop(&mut self) {
        if let Some(mut host) = self.host.take() {
            if self.decision.is_none() {
                debug!("Transaction released before a decision, aborting adaptation");
                host.adaptation_aborted();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_core::models::{Header, MessageKind};
    use crate::replay::{HostCall, ReplayHost};

    fn host() -> ReplayHost {
        ReplayHost::request(Header::from_image(&b"GET / HTTP/1.1\r\n\r\n"[..]), None)
    }

    #[test]
    fn test_use_virgin_is_last_host_call() {
        let host = host();
        let journal = host.journal();
        let mut link = HostLink::new(host);

        link.use_virgin().unwrap();
        assert!(!link.is_attached());
        assert!(matches!(link.get(), Err(AdapterError::HostDetached)));
        drop(link);

        assert_eq!(journal.calls(), vec![HostCall::UseVirgin]);
    }

    #[test]
    fn test_second_decision_rejected() {
        let host = host();
        let journal = host.journal();
        let mut link = HostLink::new(host);

        link.use_adapted(Message::empty_response()).unwrap();
        let err = link
            .use_adapted(Message::new(MessageKind::Response, Header::default(), true))
            .unwrap_err();
        assert!(matches!(err, AdapterError::Precondition(_)));
        assert_eq!(link.decision(), Some(HostDecision::UseAdapted));
        drop(link);

        let adapted = journal
            .calls()
            .iter()
            .filter(|c| matches!(c, HostCall::UseAdapted { .. }))
            .count();
        assert_eq!(adapted, 1);
    }

    #[test]
    fn test_drop_without_decision_aborts() {
        let host = host();
        let journal = host.journal();
        drop(HostLink::new(host));
        assert_eq!(journal.calls(), vec![HostCall::AdaptationAborted]);
    }

    #[test]
    fn test_detached_link_drops_silently() {
        let host = host();
        let journal = host.journal();
        let mut link = HostLink::new(host);
        link.detach();
        drop(link);
        assert!(journal.calls().is_empty());
    }
}
