use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use filter_shim::adaptation::producer::{AdaptedBodyProducer, Completion};
use filter_shim::wire::codec::BlockCodec;
use tokio_util::codec::Decoder;

fn bench_codec_decode(c: &mut Criterion) {
    let mut codec = BlockCodec::default();
    let data = b"HTTP/1.1 403 Forbidden\r\nContent-Type: text/html\r\nContent-Length: 20\n\n\0\0";

    c.bench_function("codec_decode_header_block", |b| {
        b.iter(|| {
            let mut src = BytesMut::from(&data[..]);
            let _ = codec.decode(black_box(&mut src));
        })
    });
}

fn bench_codec_decode_split(c: &mut Criterion) {
    let mut page = vec![b'x'; 64 * 1024];
    page.extend_from_slice(b"\n\n\0\0");

    c.bench_function("codec_decode_block_page_1k_reads", |b| {
        b.iter(|| {
            let mut codec = BlockCodec::default();
            let mut src = BytesMut::new();
            for chunk in page.chunks(1024) {
                src.extend_from_slice(chunk);
                if codec.decode(black_box(&mut src)).ok().flatten().is_some() {
                    break;
                }
            }
        })
    });
}

fn bench_producer_drain(c: &mut Criterion) {
    let chunk = vec![b'y'; 4096];

    c.bench_function("producer_push_and_drain_64k", |b| {
        b.iter(|| {
            let mut producer = AdaptedBodyProducer::new(Completion::WithSource);
            let _ = producer.request();
            for _ in 0..16 {
                producer.push(black_box(&chunk));
                let _ = producer.shift(chunk.len());
            }
            producer.finish_source(true)
        })
    });
}

criterion_group!(
    benches,
    bench_codec_decode,
    bench_codec_decode_split,
    bench_producer_drain
);
criterion_main!(benches);
