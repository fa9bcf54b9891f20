//! Outer block-wise transfer keeps the block option visible to
//! intermediaries.

use coap_lite::{CoapOption, Packet};
use oscore_chain::oscore::{ProtectOptions, SecurityContext};
use std::collections::LinkedList;

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
/// Block2 NUM 0, M set, SZX 2
const BLOCK2: [u8; 1] = [0x0A];

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

fn block2_of(packet: &Packet) -> Option<&Vec<u8>> {
    packet
        .get_option(CoapOption::Block2)
        .and_then(LinkedList::front)
}

#[test]
fn response_block_stays_outer() {
    let mut client = context(&CLIENT_ID, &SERVER_ID);
    let mut server = context(&SERVER_ID, &CLIENT_ID);
    let request = client
        .protect_request(&REQ_UNPROTECTED, &ProtectOptions::default())
        .unwrap();
    server.unprotect_request(&request).unwrap();

    let mut response = Packet::from_bytes(&[0x60, 0x45, 0x5D, 0x1F]).unwrap();
    response.add_option(CoapOption::Block2, BLOCK2.to_vec());
    response.payload = vec![0x2A; 64];
    let response = response.to_bytes().unwrap();

    let options = ProtectOptions {
        outer_blockwise: true,
        ..ProtectOptions::default()
    };
    let protected = server
        .protect_response(&response, &request, &options)
        .unwrap();
    let outer = Packet::from_bytes(&protected).unwrap();
    assert_eq!(Some(&BLOCK2.to_vec()), block2_of(&outer));
    // Code byte, payload marker, payload and tag
    assert_eq!(1 + 1 + 64 + 8, outer.payload.len());

    let unprotected = Packet::from_bytes(
        &client.unprotect_response(&protected, &request).unwrap(),
    )
    .unwrap();
    assert_eq!(Some(&BLOCK2.to_vec()), block2_of(&unprotected));
    assert_eq!(vec![0x2A; 64], unprotected.payload);
}

#[test]
fn request_block_is_not_held() {
    // Block1 is the outer option of requests, Block2 stays inner
    let mut request = Packet::from_bytes(&REQ_UNPROTECTED).unwrap();
    request.add_option(CoapOption::Block2, BLOCK2.to_vec());
    let options = ProtectOptions {
        outer_blockwise: true,
        ..ProtectOptions::default()
    };

    let protected = context(&CLIENT_ID, &SERVER_ID)
        .protect_request(&request.to_bytes().unwrap(), &options)
        .unwrap();
    assert_eq!(None, block2_of(&Packet::from_bytes(&protected).unwrap()));
}
