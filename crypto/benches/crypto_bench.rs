use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn approval_sign_bench(c: &mut Criterion) {
    let kp = authentimed_crypto::keypair_from_seed(&[7u8; 32]);
    let payload = authentimed_crypto::blake2b_256(b"ABCD12345Z|WXYZ54321A");

    c.bench_function("ed25519_sign_payload", |b| {
        b.iter(|| authentimed_crypto::sign_message(black_box(&payload), &kp.private))
    });
}

fn approval_verify_bench(c: &mut Criterion) {
    let kp = authentimed_crypto::keypair_from_seed(&[7u8; 32]);
    let payload = authentimed_crypto::blake2b_256(b"ABCD12345Z|WXYZ54321A");
    let sig = authentimed_crypto::sign_message(&payload, &kp.private);

    c.bench_function("ed25519_verify_payload", |b| {
        b.iter(|| authentimed_crypto::verify_signature(black_box(&payload), &sig, &kp.public))
    });
}

fn address_roundtrip_bench(c: &mut Criterion) {
    let kp = authentimed_crypto::keypair_from_seed(&[8u8; 32]);
    let addr = authentimed_crypto::derive_address(&kp.public);

    c.bench_function("derive_address", |b| {
        b.iter(|| authentimed_crypto::derive_address(black_box(&kp.public)))
    });
    c.bench_function("decode_address", |b| {
        b.iter(|| authentimed_crypto::decode_address(black_box(addr.as_str())))
    });
}

criterion_group!(
    benches,
    approval_sign_bench,
    approval_verify_bench,
    address_roundtrip_bench
);
criterion_main!(benches);
