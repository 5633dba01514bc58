// Copyright 2026 BadCompany
// Licensed under the Apache License, Version 2.0

#![no_main]

use bytes::BytesMut;
use filter_shim::wire::codec::{BlockCodec, EofPolicy};
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|input: (u8, &[u8])| {
    let (split, data) = input;

    // Feed the block decoder in two reads; no input may make it panic.
    let mut codec = BlockCodec::new(EofPolicy::Strict).with_max_block(4096);
    let cut = (split as usize).min(data.len());
    let mut buffer = BytesMut::from(&data[..cut]);
    while let Ok(Some(_)) = codec.decode(&mut buffer) {}
    buffer.extend_from_slice(&data[cut..]);
    while let Ok(Some(_)) = codec.decode(&mut buffer) {}
    let _ = codec.decode_eof(&mut buffer);
});
