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

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::engine_core::models::{Outcome, Verdict};
use crate::service::ServiceKind;

#[derive(Serialize)]
struct VerdictEntry<'a> {
    xaction: &'a Uuid,
    timestamp: String,
    service: ServiceKind,
    verdicts: &'a [Verdict],
    outcome: Outcome,
}

/// Emits one structured record per decided transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerdictAudit;

impl VerdictAudit {
    pub fn record(&self, xaction: &Uuid, service: ServiceKind, verdicts: &[Verdict], outcome: Outcome) {
        let entry = VerdictEntry {
            xaction,
            timestamp: chrono::Utc::now().to_rfc3339(),
            service,
            verdicts,
            outcome,
        };

        let payload = serde_json::to_string(&entry).unwrap_or_default();

        info!(
            target: "verdict",
            xaction = %xaction,
            payload = %payload,
            "VERDICT"
        );
    }
}
