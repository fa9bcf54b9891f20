//! The compressed value of the OSCORE option (RFC 8613, Section 6.1).
//!
//! ```text
//!  0 1 2 3 4 5 6 7 <------------- n bytes -------------->
//! +-+-+-+-+-+-+-+-+--------------------------------------
//! |0 0 0|h|k|  n  |       Partial IV (if any) ...
//! +-+-+-+-+-+-+-+-+--------------------------------------
//!
//!  <- 1 byte -> <----- s bytes ------>
//! +------------+----------------------+------------------+
//! | s (if any) | kid context (if any) | kid (if any) ... |
//! +------------+----------------------+------------------+
//! ```

use alloc::vec::Vec;

use super::{util::MAX_PIV_LEN, Error, Result};

const PIV_LEN_MASK: u8 = 0b0000_0111;
const KID_FLAG: u8 = 0b0000_1000;
const KID_CONTEXT_FLAG: u8 = 0b0001_0000;
const RESERVED_MASK: u8 = 0b1110_0000;

/// The fields carried in the OSCORE option.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OscoreOption {
    pub partial_iv: Option<Vec<u8>>,
    pub kid_context: Option<Vec<u8>>,
    pub kid: Option<Vec<u8>>,
}

impl OscoreOption {
    /// Returns the compressed option value.
    ///
    /// An option without any field compresses to the empty byte string, and
    /// an empty partial IV is the same as none. Partial IVs longer than 5
    /// bytes and kid contexts longer than 255 bytes are rejected as
    /// `MalformedOption`.
    pub fn compress(&self) -> Result<Vec<u8>> {
        let partial_iv =
            self.partial_iv.as_ref().filter(|piv| !piv.is_empty());
        if partial_iv.is_none()
            && self.kid_context.is_none()
            && self.kid.is_none()
        {
            return Ok(Vec::new());
        }

        let mut option = vec![0];
        if let Some(piv) = partial_iv {
            if piv.len() > MAX_PIV_LEN {
                return Err(Error::MalformedOption);
            }
            option[0] |= piv.len() as u8 & PIV_LEN_MASK;
            option.extend_from_slice(piv);
        }
        if let Some(kid_context) = &self.kid_context {
            if kid_context.len() > u8::MAX as usize {
                return Err(Error::MalformedOption);
            }
            option[0] |= KID_CONTEXT_FLAG;
            option.push(kid_context.len() as u8);
            option.extend_from_slice(kid_context);
        }
        if let Some(kid) = &self.kid {
            option[0] |= KID_FLAG;
            option.extend_from_slice(kid);
        }

        Ok(option)
    }

    /// Parses a compressed option value.
    pub fn decompress(value: &[u8]) -> Result<OscoreOption> {
        let (&flags, mut rest) = match value.split_first() {
            Some(split) => split,
            None => return Ok(OscoreOption::default()),
        };
        if flags & RESERVED_MASK != 0 {
            return Err(Error::MalformedOption);
        }

        // Partial IV lengths of 6 and 7 are reserved
        let n = (flags & PIV_LEN_MASK) as usize;
        if n > MAX_PIV_LEN || rest.len() < n {
            return Err(Error::MalformedOption);
        }
        let partial_iv = if n > 0 {
            let (piv, tail) = rest.split_at(n);
            rest = tail;
            Some(piv.to_vec())
        } else {
            None
        };

        let kid_context = if flags & KID_CONTEXT_FLAG != 0 {
            let (&s, tail) =
                rest.split_first().ok_or(Error::MalformedOption)?;
            if tail.len() < s as usize {
                return Err(Error::MalformedOption);
            }
            let (kid_context, tail) = tail.split_at(s as usize);
            rest = tail;
            Some(kid_context.to_vec())
        } else {
            None
        };

        let kid = if flags & KID_FLAG != 0 {
            Some(rest.to_vec())
        } else if !rest.is_empty() {
            // Nothing may follow unless it's the kid
            return Err(Error::MalformedOption);
        } else {
            None
        };

        Ok(OscoreOption {
            partial_iv,
            kid_context,
            kid,
        })
    }
}
