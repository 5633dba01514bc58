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

//! Explicit service registration, done once at process start.

use std::collections::BTreeMap;
use tracing::debug;

use crate::engine_core::errors::AdapterError;
use crate::service::{Service, ServiceKind};

pub type ServiceFactory = fn() -> Service;

#[derive(Default)]
pub struct ServiceRegistry {
    factories: BTreeMap<&'static str, ServiceFactory>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the REQMOD and RESPMOD services.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry
            .factories
            .insert(ServiceKind::Reqmod.uri(), || Service::new(ServiceKind::Reqmod));
        registry
            .factories
            .insert(ServiceKind::Respmod.uri(), || Service::new(ServiceKind::Respmod));
        registry
    }

    pub fn register(&mut self, uri: &'static str, factory: ServiceFactory) -> Result<(), AdapterError> {
        if self.factories.contains_key(uri) {
            return Err(AdapterError::Configuration(format!(
                "service already registered: {}",
                uri
            )));
        }
        debug!(uri, "Service registered");
        self.factories.insert(uri, factory);
        Ok(())
    }

    pub fn create(&self, uri: &str) -> Option<Service> {
        self.factories.get(uri).map(|factory| factory())
    }

    /// Fresh instances of every registered service, ordered by URI
    pub fn services(&self) -> Vec<Service> {
        self.factories.values().map(|factory| factory()).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_services() {
        let registry = ServiceRegistry::with_builtin();
        assert_eq!(registry.len(), 2);
        let service = registry.create("ecap://filter-shim.local/reqmod").unwrap();
        assert_eq!(service.kind(), ServiceKind::Reqmod);
        assert!(registry.create("ecap://elsewhere/reqmod").is_none());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = ServiceRegistry::with_builtin();
        let err = registry
            .register(ServiceKind::Respmod.uri(), || Service::new(ServiceKind::Respmod))
            .unwrap_err();
        assert!(matches!(err, AdapterError::Configuration(_)));
        assert_eq!(registry.len(), 2);
    }
}
