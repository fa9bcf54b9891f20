use coap_lite::error as coap;
use core::fmt;
#[cfg(feature = "std")]
use std::error;

use crate::cbor;

/// The catch-all error type for this module.
///
/// Every failure in the protection pipeline surfaces as one of these; nothing
/// is silently downgraded to a log line.
#[derive(Debug)]
pub enum Error {
    /// No security context is available for the message.
    ContextMissing,
    /// A step of the context rederivation procedure failed.
    ContextRegenerationFailed,
    /// The instruction list in the OSCORE option can't be decoded, or was
    /// built from recipient IDs and ID contexts of different length.
    MalformedInstruction,
    /// The AEAD refused to seal the plaintext.
    SealingFailed,
    /// The OSCORE option violates the compressed layout.
    MalformedOption,
    /// The decrypted plaintext is not a valid code, options and payload.
    InvalidPlaintext,
    /// The sender sequence number no longer fits into a partial IV.
    SequenceNumberExhausted,
    /// CoAP message doesn't contain OSCORE option.
    NoOscoreOption,
    /// CoAP request doesn't have kid or piv.
    NoKidPiv,
    /// This message has been received already.
    ReplayDetected,
    /// The AEAD failed to open the ciphertext.
    Aead,
    /// Wraps errors from the `cbor` module.
    Cbor(cbor::CborError),
    /// Wraps errors from `hkdf`.
    Hkdf(hkdf::InvalidLength),
    /// Wraps errors from `coap_lite`.
    Coap(coap::MessageError),
}

impl From<cbor::CborError> for Error {
    fn from(e: cbor::CborError) -> Error {
        Error::Cbor(e)
    }
}

impl From<hkdf::InvalidLength> for Error {
    fn from(e: hkdf::InvalidLength) -> Error {
        Error::Hkdf(e)
    }
}

impl From<ccm::aead::Error> for Error {
    fn from(_: ccm::aead::Error) -> Error {
        Error::Aead
    }
}

impl From<coap::MessageError> for Error {
    fn from(e: coap::MessageError) -> Error {
        Error::Coap(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ContextMissing => write!(f, "Security context is missing"),
            Error::ContextRegenerationFailed => {
                write!(f, "Context re-derivation failed")
            }
            Error::MalformedInstruction => {
                write!(f, "Malformed instructions in OSCORE option")
            }
            Error::SealingFailed => write!(f, "Failed to seal the message"),
            Error::MalformedOption => write!(f, "Malformed OSCORE option"),
            Error::InvalidPlaintext => {
                write!(f, "Decrypted plaintext is not a valid CoAP message")
            }
            Error::SequenceNumberExhausted => {
                write!(f, "Sender sequence number space is exhausted")
            }
            Error::NoOscoreOption => {
                write!(f, "CoAP message doesn't contain OSCORE option")
            }
            Error::NoKidPiv => {
                write!(f, "CoAP request doesn't have kid or piv")
            }
            Error::ReplayDetected => {
                write!(f, "This message has been received already")
            }
            Error::Aead => write!(f, "Error using AEAD"),
            Error::Cbor(e) => e.fmt(f),
            Error::Hkdf(e) => write!(f, "HKDF error: {}", e),
            Error::Coap(e) => write!(f, "CoAP error: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Cbor(e) => Some(e),
            Error::Hkdf(e) => Some(e),
            Error::Coap(e) => Some(e),
            // Other errors that don't wrap a library error
            _ => None,
        }
    }
}
