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

use crate::adaptation::producer::DonePolicy;
use crate::engine_core::constants::{config as names, limits};
use crate::engine_core::errors::AdapterError;
use crate::wire::codec::EofPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One option handed over by the host at (re)configuration time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedOption {
    pub name: String,
    pub value: String,
    /// Options the host assigned for itself are not ours to interpret
    pub host_assigned: bool,
}

impl NamedOption {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            host_assigned: false,
        }
    }

    pub fn host_assigned(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            host_assigned: true,
            ..Self::new(name, value)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_socket: Option<PathBuf>,
    pub debug: bool,
    pub io_timeout_ms: u64,
    pub eof_policy: EofPolicy,
    pub done_policy: DonePolicy,
    pub log_level: String,
    pub log_format: String, // "json" or "text"
}

impl Config {
    pub fn from_env() -> Result<Self, AdapterError> {
        let defaults = Self::default();
        Ok(Self {
            listen_socket: env::var(names::ENV_LISTEN_SOCKET)
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            debug: env::var(names::ENV_DEBUG)
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            io_timeout_ms: match env::var(names::ENV_IO_TIMEOUT_MS) {
                Ok(v) => parse_timeout(&v)?,
                Err(_) => defaults.io_timeout_ms,
            },
            eof_policy: match env::var(names::ENV_EOF_POLICY) {
                Ok(v) => parse_eof_policy(&v)?,
                Err(_) => defaults.eof_policy,
            },
            done_policy: match env::var(names::ENV_DONE_POLICY) {
                Ok(v) => parse_done_policy(&v)?,
                Err(_) => defaults.done_policy,
            },
            log_level: env::var(names::ENV_LOG_LEVEL).unwrap_or(defaults.log_level),
            log_format: env::var(names::ENV_LOG_FORMAT).unwrap_or(defaults.log_format),
        })
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, AdapterError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AdapterError::Configuration(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_yaml_ng::from_str(&content).map_err(|e| {
            AdapterError::Configuration(format!("Failed to parse config YAML: {}", e))
        })
    }

    /// Build a validated configuration from the options the host passes in.
    pub fn from_options<'a, I>(options: I) -> Result<Self, AdapterError>
    where
        I: IntoIterator<Item = &'a NamedOption>,
    {
        let mut config = Self::default();
        for option in options {
            config.apply_option(option)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn apply_option(&mut self, option: &NamedOption) -> Result<(), AdapterError> {
        let value = option.value.as_str();
        match option.name.as_str() {
            names::OPT_LISTEN_SOCKET | names::OPT_LISTEN_SOCKET_LEGACY => {
                if value.is_empty() {
                    return Err(AdapterError::Configuration(format!(
                        "empty {} value is not allowed",
                        option.name
                    )));
                }
                self.listen_socket = Some(PathBuf::from(value));
            }
            // presence alone turns it on
            names::OPT_DEBUG => self.debug = true,
            names::OPT_IO_TIMEOUT_MS => self.io_timeout_ms = parse_timeout(value)?,
            names::OPT_EOF_POLICY => self.eof_policy = parse_eof_policy(value)?,
            names::OPT_DONE_POLICY => self.done_policy = parse_done_policy(value)?,
            _ if option.host_assigned => {}
            other => {
                return Err(AdapterError::Configuration(format!(
                    "unsupported configuration parameter: {}",
                    other
                )))
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), AdapterError> {
        match &self.listen_socket {
            Some(path) if !path.as_os_str().is_empty() => Ok(()),
            _ => Err(AdapterError::Configuration(format!(
                "{} value is not set",
                names::OPT_LISTEN_SOCKET
            ))),
        }
    }

    /// Deadline for each blocking channel operation; `None` when disabled
    pub fn io_timeout(&self) -> Option<Duration> {
        match self.io_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_socket: None,
            debug: false,
            io_timeout_ms: limits::DEFAULT_IO_TIMEOUT_MS,
            eof_policy: EofPolicy::default(),
            done_policy: DonePolicy::default(),
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_timeout(value: &str) -> Result<u64, AdapterError> {
    value.trim().parse().map_err(|_| {
        AdapterError::Configuration(format!("invalid io_timeout_ms value: '{}'", value))
    })
}

fn parse_eof_policy(value: &str) -> Result<EofPolicy, AdapterError> {
    EofPolicy::parse(value)
        .ok_or_else(|| AdapterError::Configuration(format!("invalid eof_policy value: '{}'", value)))
}

fn parse_done_policy(value: &str) -> Result<DonePolicy, AdapterError> {
    DonePolicy::parse(value).ok_or_else(|| {
        AdapterError::Configuration(format!("invalid done_policy value: '{}'", value))
    })
}
