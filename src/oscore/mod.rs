//! OSCORE implementation, including the chaining of additional protection
//! layers for intermediaries.

pub mod classify;
mod compression;
mod context;
mod db;
mod encryption;
#[cfg_attr(tarpaulin, skip)]
mod error;
mod instruction;
mod plaintext;
mod promotion;
mod rederivation;
#[cfg(feature = "std")]
mod shared;
#[cfg(test)]
mod test_vectors;
mod util;

pub use compression::OscoreOption;
pub use context::{ProtectOptions, SecurityContext};
pub use db::ContextDb;
pub use error::Error;
pub use instruction::{
    contains_instructions, encode_instructions, Hop, HopOrder,
    InstructionList, OptionParams,
};
pub use plaintext::{
    deserialize as deserialize_plaintext, serialize as serialize_plaintext,
};
pub use promotion::{is_promotable, merge, promote, ALWAYS_OUTER};
pub use rederivation::RederivationPhase;
#[cfg(feature = "std")]
pub use shared::SharedContext;
pub use util::{MAX_PIV_LEN, MAX_SEQUENCE_NUMBER};

/// The result type for the `oscore` module.
pub type Result<T> = core::result::Result<T, Error>;
