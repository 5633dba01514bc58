// Copyright 2026 BadCompany
// Licensed under the Apache License, Version 2.0

#![no_main]

use filter_shim::engine_core::models::{ProtocolPhase, Verdict};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let phases = [
        ProtocolPhase::ReqmodVerdict,
        ProtocolPhase::RespmodPreVerdict,
        ProtocolPhase::RespmodFinalVerdict,
    ];
    for (byte, phase) in data.iter().zip(phases.iter().cycle()) {
        if let Ok(verdict) = Verdict::from_wire(*byte, *phase) {
            assert_eq!(verdict.as_byte(), *byte);
            assert!(phase.allowed().contains(&verdict));
        }
    }
});
