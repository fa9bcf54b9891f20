use coap_lite::{CoapOption, Packet};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use oscore_chain::oscore::{
    encode_instructions, ContextDb, ProtectOptions, SecurityContext,
};
use std::collections::LinkedList;

const MASTER_SECRET: [u8; 16] = [
    0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C,
    0x0D, 0x0E, 0x0F, 0x10,
];
const MASTER_SALT: [u8; 8] = [0x9E, 0x7C, 0xA9, 0x22, 0x23, 0x78, 0x63, 0x40];
const PROXY_SECRET: [u8; 16] = [0x5A; 16];
const CLIENT_ID: [u8; 0] = [];
const SERVER_ID: [u8; 1] = [0x01];
const PROXY_ID: [u8; 1] = [0x0A];

const REQ_UNPROTECTED: [u8; 22] = [
    0x44, 0x01, 0x5D, 0x1F, 0x00, 0x00, 0x39, 0x74, 0x39, 0x6C, 0x6F, 0x63,
    0x61, 0x6C, 0x68, 0x6F, 0x73, 0x74, 0x83, 0x74, 0x76, 0x31,
];
const REQ_PROTECTED: [u8; 35] = [
    0x44, 0x02, 0x5D, 0x1F, 0x00, 0x00, 0x39, 0x74, 0x39, 0x6C, 0x6F, 0x63,
    0x61, 0x6C, 0x68, 0x6F, 0x73, 0x74, 0x62, 0x09, 0x14, 0xFF, 0x61, 0x2F,
    0x10, 0x92, 0xF1, 0x77, 0x6F, 0x1C, 0x16, 0x68, 0xB3, 0x82, 0x5E,
];
const RES_UNPROTECTED: [u8; 21] = [
    0x64, 0x45, 0x5D, 0x1F, 0x00, 0x00, 0x39, 0x74, 0xFF, 0x48, 0x65, 0x6C,
    0x6C, 0x6F, 0x20, 0x57, 0x6F, 0x72, 0x6C, 0x64, 0x21,
];

fn context(
    secret: &[u8],
    sender_id: &[u8],
    recipient_id: &[u8],
) -> SecurityContext {
    SecurityContext::new(
        secret.to_vec(),
        MASTER_SALT.to_vec(),
        sender_id.to_vec(),
        recipient_id.to_vec(),
        None,
    )
    .unwrap()
}

fn oscore(c: &mut Criterion) {
    // Check for no_replay enabled, because otherwise unprotection will fail
    if cfg!(not(feature = "no_replay")) {
        panic!("Run with --features no_replay");
    }

    let mut group = c.benchmark_group("oscore");
    let options = ProtectOptions::default();

    group.bench_function("context_derivation", |b| {
        b.iter(|| context(&MASTER_SECRET, &CLIENT_ID, &SERVER_ID))
    });

    let mut req_context = context(&MASTER_SECRET, &CLIENT_ID, &SERVER_ID);
    group.bench_function("protection_request", |b| {
        b.iter(|| {
            req_context
                .protect_request(&REQ_UNPROTECTED, &options)
                .unwrap()
        })
    });

    let mut req_context = context(&MASTER_SECRET, &SERVER_ID, &CLIENT_ID);
    group.bench_function("unprotection_request", |b| {
        b.iter(|| req_context.unprotect_request(&REQ_PROTECTED).unwrap())
    });

    let mut res_context = context(&MASTER_SECRET, &SERVER_ID, &CLIENT_ID);
    group.bench_function("protection_response", |b| {
        b.iter(|| {
            res_context
                .protect_response(&RES_UNPROTECTED, &REQ_PROTECTED, &options)
                .unwrap()
        })
    });

    group.finish();
}

fn chaining(c: &mut Criterion) {
    let mut group = c.benchmark_group("chaining");
    let options = ProtectOptions::default();

    let mut request = Packet::from_bytes(&REQ_UNPROTECTED).unwrap();
    let mut slot = LinkedList::new();
    slot.push_back(encode_instructions(&[&PROXY_ID], &[&[]]).unwrap());
    request.set_option(CoapOption::Oscore, slot);
    let request = request.to_bytes().unwrap();

    let mut db = ContextDb::new();
    db.insert(context(&MASTER_SECRET, &CLIENT_ID, &SERVER_ID));
    db.insert(context(&PROXY_SECRET, &CLIENT_ID, &PROXY_ID));
    group.bench_function("protection_two_layers", |b| {
        b.iter_batched(
            || request.clone(),
            |request| {
                db.protect_request(&request, &SERVER_ID, None, &options)
                    .unwrap()
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(oscore_benches, oscore, chaining);
criterion_main!(oscore_benches);
