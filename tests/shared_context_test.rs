//! Concurrent protection with a context shared between threads.
#![cfg(feature = "std")]

use oscore_chain::oscore::{ProtectOptions, SecurityContext, SharedContext};
use std::thread;

const MASTER_SECRET: [u8; 16] = [
    0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C,
    0x0D, 0x0E, 0x0F, 0x10,
];
const MASTER_SALT: [u8; 8] = [0x9E, 0x7C, 0xA9, 0x22, 0x23, 0x78, 0x63, 0x40];
const CLIENT_ID: [u8; 0] = [];
const SERVER_ID: [u8; 1] = [0x01];

const REQ_UNPROTECTED: [u8; 22] = [
    0x44, 0x01, 0x5D, 0x1F, 0x00, 0x00, 0x39, 0x74, 0x39, 0x6C, 0x6F, 0x63,
    0x61, 0x6C, 0x68, 0x6F, 0x73, 0x74, 0x83, 0x74, 0x76, 0x31,
];

fn context(sender_id: &[u8], recipient_id: &[u8]) -> SecurityContext {
    SecurityContext::new(
        MASTER_SECRET.to_vec(),
        MASTER_SALT.to_vec(),
        sender_id.to_vec(),
        recipient_id.to_vec(),
        None,
    )
    .unwrap()
}

#[test]
fn concurrent_requests_are_all_accepted() {
    let client = SharedContext::new(context(&CLIENT_ID, &SERVER_ID));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            thread::spawn(move || {
                (0..16)
                    .map(|_| {
                        client
                            .protect_request(
                                &REQ_UNPROTECTED,
                                &ProtectOptions::default(),
                            )
                            .unwrap()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let mut requests: Vec<Vec<u8>> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    assert_eq!(128, client.lock().sender_sequence_number());

    // Distinct sequence numbers mean distinct messages
    requests.sort();
    requests.dedup();
    assert_eq!(128, requests.len());

    let server = SharedContext::new(context(&SERVER_ID, &CLIENT_ID));
    for request in &requests {
        assert_eq!(
            &REQ_UNPROTECTED[..],
            &server.unprotect_request(request).unwrap()[..]
        );
    }
}
