use alloc::vec::Vec;
use hkdf::Hkdf;
use serde_bytes::Bytes;
use sha2::Sha256;

use crate::cbor;

use super::Result;

pub const KEY_LEN: usize = 16;
pub const NONCE_LEN: usize = 13;
pub const TAG_LEN: usize = 8;
/// The COSE algorithm identifier of AES-CCM-16-64-128.
pub const ALG_AES_CCM_16_64_128: u8 = 10;
/// Partial IVs are at most 5 bytes long.
pub const MAX_PIV_LEN: usize = 5;
/// The largest sender sequence number that still fits into a partial IV.
pub const MAX_SEQUENCE_NUMBER: u64 = (1 << 40) - 1;

/// Returns the CBOR encoded `info` structure.
///
/// # Arguments
/// * `id` - The sender ID or recipient ID (or empty for IV).
/// * `id_context` - The ID context, if one is used.
/// * `r#type` - Either "Key" or "IV".
/// * `l` - The size of the key/nonce for the AEAD, in bytes.
pub fn build_info(
    id: &[u8],
    id_context: Option<&[u8]>,
    r#type: &str,
    l: usize,
) -> Result<Vec<u8>> {
    // (id, id_context, alg_aead, type, L)
    let info = (
        Bytes::new(id),
        id_context.map(Bytes::new),
        ALG_AES_CCM_16_64_128,
        r#type,
        l,
    );
    Ok(cbor::encode(info)?)
}

/// Returns the derived key/IV for this `info` structure.
pub fn hkdf(
    master_secret: &[u8],
    master_salt: &[u8],
    info: &[u8],
    l: usize,
) -> Result<Vec<u8>> {
    let h = Hkdf::<Sha256>::new(Some(master_salt), master_secret);
    let mut okm = vec![0; l];
    h.expand(info, &mut okm)?;

    Ok(okm)
}

/// Returns the CBOR encoded AAD array.
///
/// There's no argument for class I options, because the standard doesn't
/// define any at this point.
pub fn build_aad_array(
    request_kid: &[u8],
    request_piv: &[u8],
) -> Result<Vec<u8>> {
    // (oscore_version, algorithms, request_kid, request_piv, options)
    let arr = (
        1,
        [ALG_AES_CCM_16_64_128],
        Bytes::new(request_kid),
        Bytes::new(request_piv),
        Bytes::new(&[]),
    );
    Ok(cbor::encode(arr)?)
}

/// Returns the AAD, the `Enc_structure` around the AAD array.
pub fn build_aad(request_kid: &[u8], request_piv: &[u8]) -> Result<Vec<u8>> {
    let aad_arr = build_aad_array(request_kid, request_piv)?;
    let aad = ("Encrypt0", Bytes::new(&[]), Bytes::new(&aad_arr));

    Ok(cbor::encode(aad)?)
}

/// Returns the nonce for the AEAD.
pub fn compute_nonce(
    mut piv: &[u8],
    mut id_piv: &[u8],
    common_iv: &[u8; NONCE_LEN],
) -> [u8; NONCE_LEN] {
    // ID_PIV longer than the nonce allows is trimmed to its tail
    if id_piv.len() > NONCE_LEN - 6 {
        id_piv = &id_piv[id_piv.len() - (NONCE_LEN - 6)..]
    }
    if piv.len() > MAX_PIV_LEN {
        piv = &piv[piv.len() - MAX_PIV_LEN..];
    }

    let mut nonce = [0; NONCE_LEN];
    // Left-pad the Partial IV (PIV) with zeros to exactly 5 bytes
    nonce[NONCE_LEN - piv.len()..].copy_from_slice(piv);
    // Left-pad ID_PIV with zeros to exactly nonce length minus 6 bytes
    nonce[1 + NONCE_LEN - 6 - id_piv.len()..NONCE_LEN - 5]
        .copy_from_slice(id_piv);
    // The size of ID_PIV goes in front
    nonce[0] = id_piv.len() as u8;
    for (b1, b2) in nonce.iter_mut().zip(common_iv.iter()) {
        *b1 ^= b2;
    }

    nonce
}

/// Returns the `piv` as a u64.
pub fn piv_to_u64(mut piv: &[u8]) -> u64 {
    if piv.len() > 8 {
        piv = &piv[piv.len() - 8..];
    }
    let mut piv_arr = [0; 8];
    piv_arr[8 - piv.len()..].copy_from_slice(piv);

    u64::from_be_bytes(piv_arr)
}

/// Returns the `piv` in its minimal big-endian form, left-padded with zero
/// bytes to at least `min_len` bytes.
pub fn format_piv(piv: u64, min_len: usize) -> Vec<u8> {
    let bytes = piv.to_be_bytes();
    // Zero is still one byte long
    let first_nonzero = bytes.iter().position(|&x| x != 0).unwrap_or(7);
    let start = first_nonzero.min(bytes.len() - min_len.min(MAX_PIV_LEN));

    bytes[start..].to_vec()
}
