//! The plaintext of the AEAD: the real code, the class E options and the
//! payload, laid out like the corresponding part of a CoAP message.

use alloc::{collections::LinkedList, vec::Vec};

use super::{classify::OptionSet, Error, Result};

const PAYLOAD_MARKER: u8 = 0xFF;
/// The largest option delta or length the extended encoding can express.
const MAX_EXTENDED: usize = u16::MAX as usize + 269;

/// Returns the plaintext for the given code, class E options and payload.
///
/// Options are written in ascending order of their number using delta
/// encoding. The payload marker is only present with a non-empty payload.
/// Option values longer than 65804 bytes give `InvalidPlaintext`.
pub fn serialize(
    e_options: &OptionSet,
    payload: &[u8],
    code: u8,
) -> Result<Vec<u8>> {
    let mut plaintext = vec![code];

    let mut previous = 0;
    for (&number, values) in e_options {
        for value in values {
            let (delta_nibble, delta_ext) = extended(number - previous)?;
            let (len_nibble, len_ext) = extended(value.len())?;
            plaintext.push(delta_nibble << 4 | len_nibble);
            plaintext.extend(delta_ext);
            plaintext.extend(len_ext);
            plaintext.extend_from_slice(value);
            previous = number;
        }
    }

    if !payload.is_empty() {
        plaintext.push(PAYLOAD_MARKER);
        plaintext.extend_from_slice(payload);
    }

    Ok(plaintext)
}

/// Parses a plaintext back into code, class E options and payload.
pub fn deserialize(plaintext: &[u8]) -> Result<(u8, OptionSet, Vec<u8>)> {
    let (&code, mut rest) =
        plaintext.split_first().ok_or(Error::InvalidPlaintext)?;

    let mut options = OptionSet::new();
    let mut number = 0;
    while let Some((&first, tail)) = rest.split_first() {
        if first == PAYLOAD_MARKER {
            // A marker must be followed by payload
            if tail.is_empty() {
                return Err(Error::InvalidPlaintext);
            }
            return Ok((code, options, tail.to_vec()));
        }
        let (delta, tail) = read_extended(first >> 4, tail)?;
        let (len, tail) = read_extended(first & 0x0F, tail)?;
        if tail.len() < len {
            return Err(Error::InvalidPlaintext);
        }
        number += delta;
        let (value, tail) = tail.split_at(len);
        options
            .entry(number)
            .or_insert_with(LinkedList::new)
            .push_back(value.to_vec());
        rest = tail;
    }

    Ok((code, options, Vec::new()))
}

/// Returns the 4-bit nibble and the extended bytes encoding `value`.
fn extended(value: usize) -> Result<(u8, Vec<u8>)> {
    match value {
        0..=12 => Ok((value as u8, Vec::new())),
        13..=268 => Ok((13, vec![(value - 13) as u8])),
        269..=MAX_EXTENDED => {
            Ok((14, ((value - 269) as u16).to_be_bytes().to_vec()))
        }
        _ => Err(Error::InvalidPlaintext),
    }
}

/// Reads the value of an option delta or length nibble, consuming its
/// extended bytes.
fn read_extended(nibble: u8, bytes: &[u8]) -> Result<(usize, &[u8])> {
    match nibble {
        0..=12 => Ok((nibble as usize, bytes)),
        13 => {
            let (&b, tail) =
                bytes.split_first().ok_or(Error::InvalidPlaintext)?;
            Ok((b as usize + 13, tail))
        }
        14 => {
            if bytes.len() < 2 {
                return Err(Error::InvalidPlaintext);
            }
            let value = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
            Ok((value + 269, &bytes[2..]))
        }
        // 15 is reserved for the payload marker
        _ => Err(Error::InvalidPlaintext),
    }
}
