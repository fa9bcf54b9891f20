//! Partitioning of CoAP options into the outer (class U) and the encrypted
//! inner (class E) message.

use alloc::{collections::BTreeMap, collections::LinkedList, vec::Vec};
use tracing::trace;

/// The options of a CoAP message, keyed by option number.
pub type OptionSet = BTreeMap<usize, LinkedList<Vec<u8>>>;

pub const IF_MATCH: usize = 1;
pub const URI_HOST: usize = 3;
pub const ETAG: usize = 4;
pub const IF_NONE_MATCH: usize = 5;
pub const OBSERVE: usize = 6;
pub const URI_PORT: usize = 7;
pub const LOCATION_PATH: usize = 8;
pub const OSCORE: usize = 9;
pub const URI_PATH: usize = 11;
pub const CONTENT_FORMAT: usize = 12;
pub const MAX_AGE: usize = 14;
pub const URI_QUERY: usize = 15;
pub const HOP_LIMIT: usize = 16;
pub const ACCEPT: usize = 17;
pub const LOCATION_QUERY: usize = 20;
pub const BLOCK2: usize = 23;
pub const BLOCK1: usize = 27;
pub const SIZE2: usize = 28;
pub const PROXY_URI: usize = 35;
pub const PROXY_SCHEME: usize = 39;
pub const SIZE1: usize = 60;
pub const NO_RESPONSE: usize = 258;

/// Where an option travels in a protected message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionClass {
    /// Unprotected, stays in the outer message.
    U,
    /// Encrypted, only part of the inner message.
    E,
}

/// The class of every option this implementation knows about.
///
/// Options that aren't listed are class E, as RFC 8613 requires for unknown
/// options. Block-wise options are class E here, which is inner block-wise;
/// outer block-wise takes the option out before classification.
static OPTION_CLASSES: [(usize, OptionClass); 22] = [
    (IF_MATCH, OptionClass::E),
    (URI_HOST, OptionClass::U),
    (ETAG, OptionClass::E),
    (IF_NONE_MATCH, OptionClass::E),
    (OBSERVE, OptionClass::U),
    (URI_PORT, OptionClass::U),
    (LOCATION_PATH, OptionClass::E),
    (OSCORE, OptionClass::U),
    (URI_PATH, OptionClass::E),
    (CONTENT_FORMAT, OptionClass::E),
    (MAX_AGE, OptionClass::E),
    (URI_QUERY, OptionClass::E),
    (HOP_LIMIT, OptionClass::U),
    (ACCEPT, OptionClass::E),
    (LOCATION_QUERY, OptionClass::E),
    (BLOCK2, OptionClass::E),
    (BLOCK1, OptionClass::E),
    (SIZE2, OptionClass::E),
    (PROXY_URI, OptionClass::U),
    (PROXY_SCHEME, OptionClass::U),
    (SIZE1, OptionClass::E),
    (NO_RESPONSE, OptionClass::E),
];

/// Returns the class of the option with the given number.
pub fn class_of(number: usize) -> OptionClass {
    OPTION_CLASSES
        .iter()
        .find(|(n, _)| *n == number)
        .map_or(OptionClass::E, |(_, class)| *class)
}

/// The result of classifying the options of a message.
#[derive(Debug, Default, PartialEq)]
pub struct Classified {
    /// Class U options.
    pub u: OptionSet,
    /// Class E options.
    pub e: OptionSet,
    /// The block-wise option taken out for outer block-wise transfer, which
    /// has to be put back unchanged into the outer message.
    pub held: Option<(usize, LinkedList<Vec<u8>>)>,
}

/// Splits `options` into class U and class E.
///
/// With `outer_block` set, that option is held aside instead of being
/// classified, so it is neither encrypted nor part of the plaintext.
pub fn classify(
    options: &OptionSet,
    outer_block: Option<usize>,
) -> Classified {
    let mut classified = Classified::default();
    for (&number, values) in options {
        if Some(number) == outer_block {
            classified.held = Some((number, values.clone()));
            continue;
        }
        let set = match class_of(number) {
            OptionClass::U => &mut classified.u,
            OptionClass::E => &mut classified.e,
        };
        set.insert(number, values.clone());
    }
    trace!(
        u = classified.u.len(),
        e = classified.e.len(),
        held = classified.held.is_some(),
        "Classified options"
    );

    classified
}
