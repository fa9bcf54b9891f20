//! An experimental
//! [OSCORE](https://tools.ietf.org/html/rfc8613)
//! message protection pipeline for CoAP, intended for embedded devices and
//! the proxies between them.
//!
//! Next to the regular request/response protection, it supports chaining
//! additional protection layers onto a message on its way through
//! intermediaries. The application (or an intermediary) places an instruction
//! list into the OSCORE option of an outgoing message, naming the
//! (recipient ID, ID context) pairs of the hops that should add their own
//! layer. Each layer moves the options meant for its hop from the outer
//! message into the encrypted inner one.
//!
//! Key material is derived from a master secret and master salt, which have
//! to be established out of band (for example with EDHOC). The context
//! rederivation procedure of RFC 8613 Appendix B.2 is available to refresh
//! it.
//!
//! ## Security
//! This should **not currently be used in production code**, use at your own
//! risk.

#![no_std]
#[macro_use]
extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

// Unusual byte groupings are used for consistency with RFC.
#[allow(clippy::unusual_byte_groupings)]
mod cbor;

pub mod oscore;
