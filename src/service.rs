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

//! Adaptation services.
//!
//! A service is configured once (or reconfigured), started, and then hands
//! out one transaction per message. Each transaction gets its own channel.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::adaptation::{ReqmodTransaction, RespmodTransaction, Transaction, XactionOptions};
use crate::config::{Config, NamedOption};
use crate::engine_core::constants::service as identity;
use crate::engine_core::errors::AdapterError;
use crate::engine_core::traits::HostTransaction;
use crate::wire::channel::FramedChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Reqmod,
    Respmod,
}

impl ServiceKind {
    pub fn uri(self) -> &'static str {
        match self {
            ServiceKind::Reqmod => identity::URI_REQMOD,
            ServiceKind::Respmod => identity::URI_RESPMOD,
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKind::Reqmod => write!(f, "REQMOD"),
            ServiceKind::Respmod => write!(f, "RESPMOD"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Created,
    Configured,
    Running,
    Stopped,
    Retired,
}

/// Summary printed by `describe`
#[derive(Debug, Clone, Serialize)]
pub struct ServiceDescription {
    pub uri: &'static str,
    pub tag: &'static str,
    pub kind: ServiceKind,
    pub description: String,
}

pub struct Service {
    kind: ServiceKind,
    state: ServiceState,
    config: Option<Config>,
}

impl Service {
    pub fn new(kind: ServiceKind) -> Self {
        Self {
            kind,
            state: ServiceState::Created,
            config: None,
        }
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn config(&self) -> Option<&Config> {
        self.config.as_ref()
    }

    pub fn uri(&self) -> &'static str {
        self.kind.uri()
    }

    pub fn tag(&self) -> &'static str {
        identity::PACKAGE_VERSION
    }

    pub fn describe(&self) -> ServiceDescription {
        ServiceDescription {
            uri: self.uri(),
            tag: self.tag(),
            kind: self.kind,
            description: format!(
                "{} {} adapter relaying messages to a local filter service",
                identity::PACKAGE_NAME,
                self.kind
            ),
        }
    }

    /// Apply host options. A missing socket path fails here, before any
    /// transaction can be made.
    pub fn configure(&mut self, options: &[NamedOption]) -> Result<(), AdapterError> {
        let config = Config::from_options(options)?;
        self.install(config)
    }

    pub fn reconfigure(&mut self, options: &[NamedOption]) -> Result<(), AdapterError> {
        debug!(service = %self.kind, "Reconfiguring");
        self.config = None;
        self.configure(options)
    }

    /// Use an already assembled configuration (environment, YAML, CLI).
    pub fn configure_with(&mut self, config: Config) -> Result<(), AdapterError> {
        config.validate()?;
        self.install(config)
    }

    fn install(&mut self, config: Config) -> Result<(), AdapterError> {
        if self.state == ServiceState::Retired {
            return Err(AdapterError::Precondition("service is retired"));
        }
        debug!(
            service = %self.kind,
            socket = ?config.listen_socket,
            debug = config.debug,
            "Service configured"
        );
        self.config = Some(config);
        if self.state == ServiceState::Created {
            self.state = ServiceState::Configured;
        }
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), AdapterError> {
        match self.state {
            ServiceState::Configured | ServiceState::Stopped | ServiceState::Running => {
                info!(service = %self.kind, uri = self.uri(), "Service started");
                self.state = ServiceState::Running;
                Ok(())
            }
            ServiceState::Created => Err(AdapterError::Configuration(
                "service started before it was configured".to_string(),
            )),
            ServiceState::Retired => Err(AdapterError::Precondition("service is retired")),
        }
    }

    pub fn stop(&mut self) {
        if self.state == ServiceState::Running {
            info!(service = %self.kind, "Service stopped");
            self.state = ServiceState::Stopped;
        }
    }

    pub fn retire(&mut self) {
        info!(service = %self.kind, "Service retired");
        self.state = ServiceState::Retired;
    }

    /// Every URL is sent to the filter service.
    pub fn wants_url(&self, _url: &str) -> bool {
        true
    }

    /// Open a channel and create the transaction for one message.
    pub async fn make_transaction<H>(&self, mut host: H) -> Result<Transaction<H>, AdapterError>
    where
        H: HostTransaction,
    {
        if self.state != ServiceState::Running {
            return Err(AdapterError::Precondition("service is not running"));
        }
        let config = self.config.as_ref().ok_or_else(|| {
            AdapterError::Configuration("service is not configured".to_string())
        })?;
        let socket = config.listen_socket.as_deref().ok_or_else(|| {
            AdapterError::Configuration("listen_socket value is not set".to_string())
        })?;

        let channel =
            match FramedChannel::connect(socket, config.io_timeout(), config.eof_policy).await {
                Ok(channel) => channel,
                Err(e) => {
                    warn!(service = %self.kind, error = %e, "Transaction failed to connect");
                    host.adaptation_aborted();
                    return Err(e);
                }
            };

        let options = XactionOptions::from(config);
        Ok(match self.kind {
            ServiceKind::Reqmod => Transaction::Reqmod(ReqmodTransaction::new(host, channel, options)),
            ServiceKind::Respmod => {
                Transaction::Respmod(RespmodTransaction::new(host, channel, options))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_core::models::Header;
    use crate::replay::{HostCall, ReplayHost};

    fn socket_option(path: &str) -> Vec<NamedOption> {
        vec![NamedOption::new("listen_socket", path)]
    }

    #[test]
    fn test_identity() {
        let service = Service::new(ServiceKind::Respmod);
        assert_eq!(service.uri(), "ecap://filter-shim.local/respmod");
        assert_eq!(service.tag(), env!("CARGO_PKG_VERSION"));
        assert!(service.wants_url("http://example.com/"));
        assert!(service.describe().description.contains("RESPMOD"));
    }

    #[test]
    fn test_lifecycle() {
        let mut service = Service::new(ServiceKind::Reqmod);
        assert!(service.start().is_err());

        service.configure(&socket_option("/tmp/a.sock")).unwrap();
        assert_eq!(service.state(), ServiceState::Configured);
        service.start().unwrap();
        assert_eq!(service.state(), ServiceState::Running);

        service.reconfigure(&socket_option("/tmp/b.sock")).unwrap();
        assert_eq!(service.state(), ServiceState::Running);
        assert_eq!(
            service.config().and_then(|c| c.listen_socket.clone()),
            Some(std::path::PathBuf::from("/tmp/b.sock"))
        );

        service.stop();
        assert_eq!(service.state(), ServiceState::Stopped);
        service.retire();
        assert!(service.start().is_err());
    }

    #[test]
    fn test_failed_reconfigure_leaves_service_unconfigured() {
        let mut service = Service::new(ServiceKind::Reqmod);
        service.configure(&socket_option("/tmp/a.sock")).unwrap();
        assert!(service.reconfigure(&[]).is_err());
        assert!(service.config().is_none());
    }

    #[tokio::test]
    async fn test_transaction_requires_running_service() {
        let service = Service::new(ServiceKind::Reqmod);
        let host = ReplayHost::request(Header::from_image(&b"GET / HTTP/1.1\r\n\r\n"[..]), None);
        assert!(matches!(
            service.make_transaction(host).await,
            Err(AdapterError::Precondition(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_failure_aborts_host() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nobody-listens.sock");
        let mut service = Service::new(ServiceKind::Reqmod);
        service
            .configure(&socket_option(path.to_str().unwrap()))
            .unwrap();
        service.start().unwrap();

        let host = ReplayHost::request(Header::from_image(&b"GET / HTTP/1.1\r\n\r\n"[..]), None);
        let journal = host.journal();
        assert!(matches!(
            service.make_transaction(host).await,
            Err(AdapterError::Connect { .. })
        ));
        assert_eq!(journal.calls(), vec![HostCall::AdaptationAborted]);
    }
}
