//! Helpful functionality around the `serde_cbor` crate.

use alloc::vec::Vec;
use serde::{Deserialize, Serialize};
use serde_cbor::{de, Serializer};

#[cfg_attr(tarpaulin, skip)]
mod error;
pub use error::CborError;

/// The result type for the `cbor` module.
pub type Result<T> = core::result::Result<T, CborError>;

/// Serializes an object into CBOR.
///
/// The buffer grows as needed, so the instruction lists carried in the
/// OSCORE option aren't limited by a fixed size.
pub fn encode(object: impl Serialize) -> Result<Vec<u8>> {
    let mut serializer = Serializer::new(Vec::with_capacity(64));
    object.serialize(&mut serializer)?;

    Ok(serializer.into_inner())
}

/// Deserializes a single CBOR encoded object, rejecting trailing bytes.
///
/// Works on a copy of `bytes`, since `serde_cbor` needs a mutable scratch
/// buffer without `std`.
pub fn decode<T>(bytes: &[u8]) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    if bytes.is_empty() {
        return Err(CborError::Empty);
    }
    let mut scratch = bytes.to_vec();

    Ok(de::from_mut_slice(&mut scratch)?)
}
