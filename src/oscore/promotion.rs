//! Promotion of outer options into the inner message of an additional
//! protection layer.
//!
//! When a layer for an intermediary is added around an already protected
//! message, the class U options of that message are meant for the
//! intermediary. They are moved into the inner message of the new layer,
//! together with the OSCORE option of the layer below, so only the hop that
//! removes the layer gets to see them.

use alloc::{collections::LinkedList, vec::Vec};
use tracing::trace;

use super::{
    classify::{class_of, OptionClass, OptionSet, OSCORE, URI_HOST, URI_PORT},
    instruction::InstructionList,
};

/// The options that stay in the outer message unless configured otherwise.
pub static ALWAYS_OUTER: [usize; 2] = [URI_HOST, URI_PORT];

/// Returns whether a class U option may be moved into the inner message.
pub fn is_promotable(number: usize, keep_outer: &[usize]) -> bool {
    !(class_of(number) == OptionClass::U && keep_outer.contains(&number))
}

/// Takes the promotable options out of `u` for the layer of the next hop.
///
/// Only does something if the instruction list says a layer has been sealed
/// already and hops remain. In that case the cursor moves past the consumed
/// hop.
pub fn promote(
    u: &mut OptionSet,
    instructions: &mut InstructionList,
    keep_outer: &[usize],
) -> OptionSet {
    let mut promoted = OptionSet::new();
    if instructions.inner_option.is_empty() || instructions.remaining() == 0
    {
        return promoted;
    }

    let numbers: Vec<usize> = u
        .keys()
        .copied()
        .filter(|&number| is_promotable(number, keep_outer))
        .collect();
    for number in numbers {
        if let Some(values) = u.remove(&number) {
            promoted.insert(number, values);
        }
    }

    let mut inner_option = LinkedList::new();
    inner_option.push_back(instructions.inner_option.clone());
    promoted.insert(OSCORE, inner_option);

    instructions.advance();
    trace!(
        promoted = promoted.len(),
        cursor = instructions.cursor(),
        "Promoted options"
    );

    promoted
}

/// Merges promoted options into the class E set.
///
/// The promoted value wins for option numbers present in both, since it
/// belongs to the layer added later.
pub fn merge(e: OptionSet, promoted: OptionSet) -> OptionSet {
    let mut merged = e;
    merged.extend(promoted);
    merged
}
