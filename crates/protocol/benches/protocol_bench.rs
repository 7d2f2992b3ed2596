use bytes::{Bytes, BytesMut};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use std::io::Cursor;

use orion_protocol::{Command, Value};

fn bench_parse_simple_string(c: &mut Criterion) {
    let data = Value::Simple("OK".into()).to_bytes();

    c.bench_function("parse_simple_string", |b| {
        b.iter(|| {
            let mut cursor = Cursor::new(black_box(data.as_ref()));
            Value::parse(&mut cursor).unwrap()
        })
    });
}

fn bench_encode_simple_string(c: &mut Criterion) {
    let value = Value::Simple("OK".into());

    c.bench_function("encode_simple_string", |b| {
        b.iter(|| {
            let mut buf = BytesMut::with_capacity(64);
            black_box(&value).encode(&mut buf);
            buf
        })
    });
}

fn bench_parse_bulk_1kb(c: &mut Criterion) {
    let data = Value::Bulk(Bytes::from(vec![b'x'; 1024])).to_bytes();

    c.bench_function("parse_bulk_1kb", |b| {
        b.iter(|| {
            let mut cursor = Cursor::new(black_box(data.as_ref()));
            Value::parse(&mut cursor).unwrap()
        })
    });
}

fn bench_parse_request_array(c: &mut Criterion) {
    let data = Value::array_from_strs(&["SET", "key", "value", "EX", "10"]).to_bytes();

    c.bench_function("parse_request_array", |b| {
        b.iter(|| {
            let mut cursor = Cursor::new(black_box(data.as_ref()));
            let value = Value::parse(&mut cursor).unwrap();
            Command::from_frame(value).unwrap()
        })
    });
}

fn bench_encode_map(c: &mut Criterion) {
    let value = Value::Map(vec![
        ("first".into(), Value::Integer(1)),
        ("second".into(), Value::bulk("two")),
        ("third".into(), Value::Boolean(true)),
    ]);

    c.bench_function("encode_map", |b| {
        b.iter(|| {
            let mut buf = BytesMut::with_capacity(128);
            black_box(&value).encode(&mut buf);
            buf
        })
    });
}

criterion_group!(
    benches,
    bench_parse_simple_string,
    bench_encode_simple_string,
    bench_parse_bulk_1kb,
    bench_parse_request_array,
    bench_encode_map,
);
criterion_main!(benches);
