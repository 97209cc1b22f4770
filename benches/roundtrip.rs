use criterion::{black_box, criterion_group, criterion_main, Criterion};
use jampack::{Decoder, DecodeOptions, EncodeOptions, Encoder, Value};

fn sample_value() -> Value {
    Value::Object(
        (0..64)
            .map(|i| {
                (
                    format!("field_{i}"),
                    Value::Array(vec![
                        Value::Int(i),
                        Value::Float64(i as f64 * 0.5),
                        Value::String(format!("value-{i}")),
                        Value::Bool(i % 2 == 0),
                    ]),
                )
            })
            .collect(),
    )
}

fn bench_encode(c: &mut Criterion) {
    let value = sample_value();
    c.bench_function("encode", |b| {
        let mut enc = Encoder::new(EncodeOptions::new());
        b.iter(|| black_box(enc.encode(black_box(&value)).unwrap()))
    });
}

fn bench_encode_compressed(c: &mut Criterion) {
    let value = sample_value();
    c.bench_function("encode_compressed_encrypted", |b| {
        let opts = EncodeOptions::new().compress(true).encrypt(true, Some(0xDEAD_BEEF));
        let mut enc = Encoder::new(opts);
        b.iter(|| black_box(enc.encode(black_box(&value)).unwrap()))
    });
}

fn bench_decode(c: &mut Criterion) {
    let value = sample_value();
    let mut enc = Encoder::new(EncodeOptions::new());
    let bytes = enc.encode(&value).unwrap();
    c.bench_function("decode", |b| {
        let mut dec = Decoder::new(DecodeOptions::new());
        b.iter(|| black_box(dec.decode(black_box(&bytes)).unwrap()))
    });
}

criterion_group!(benches, bench_encode, bench_encode_compressed, bench_decode);
criterion_main!(benches);
