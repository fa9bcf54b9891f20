use aes::Aes128;
use alloc::vec::Vec;
use ccm::{
    aead::{generic_array::GenericArray, Aead, NewAead, Payload},
    consts::{U13, U8},
    Ccm,
};
use tracing::warn;

use super::{
    util::{KEY_LEN, NONCE_LEN},
    Error, Result,
};

/// AES-CCM-16-64-128: 8 byte tag, 13 byte nonce.
type AesCcm = Ccm<Aes128, U8, U13>;

/// Returns the ciphertext with the authentication tag appended.
pub fn seal(
    key: &[u8; KEY_LEN],
    nonce: [u8; NONCE_LEN],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let ccm = AesCcm::new(GenericArray::from_slice(key));
    ccm.encrypt(
        &nonce.into(),
        Payload {
            aad,
            msg: plaintext,
        },
    )
    .map_err(|_| {
        warn!(len = plaintext.len(), "AEAD refused to seal plaintext");
        Error::SealingFailed
    })
}

/// Returns the plaintext if the ciphertext and AAD are authentic.
pub fn open(
    key: &[u8; KEY_LEN],
    nonce: [u8; NONCE_LEN],
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    let ccm = AesCcm::new(GenericArray::from_slice(key));

    Ok(ccm.decrypt(
        &nonce.into(),
        Payload {
            aad,
            msg: ciphertext,
        },
    )?)
}
