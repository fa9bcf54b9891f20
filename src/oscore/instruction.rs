//! Parameters an application (or an intermediary) places into the OSCORE
//! option of an outgoing message before it is protected.
//!
//! A non-empty option value is a CBOR map with integer keys:
//!
//! | key | value                                              |
//! |-----|----------------------------------------------------|
//! | 1   | pairwise mode flag                                 |
//! | 2   | URI associated with the sender context             |
//! | 3   | recipient ID                                       |
//! | 5   | instruction list of additional protection layers   |
//!
//! The instruction list is a CBOR array. Its first item is the OSCORE option
//! of the layer that was sealed last (empty before any layer), the second the
//! index of the next unused hop in the array, and every further item a map
//! `{"RID": bstr, "IDCONTEXT": bstr}` naming the context of one more layer.

use alloc::{string::String, vec::Vec};
use core::fmt;
use serde::{
    de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor},
    ser::{SerializeMap, SerializeSeq},
    Deserialize, Deserializer, Serialize, Serializer,
};
use serde_bytes::{ByteBuf, Bytes};

use super::{Error, Result};
use crate::cbor;

const KEY_PAIRWISE_MODE: u8 = 1;
const KEY_CONTEXT_URI: u8 = 2;
const KEY_RID: u8 = 3;
const KEY_INSTRUCTIONS: u8 = 5;

/// Index of the first hop in the encoded instruction array.
const FIRST_HOP_INDEX: u64 = 2;

/// The order in which the hops of an instruction list are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopOrder {
    /// The first hop in the list is the first layer added around the
    /// end-to-end protection.
    InnermostFirst,
    /// The first hop in the list is the outermost layer, so it is applied
    /// last.
    OutermostFirst,
}

impl Default for HopOrder {
    fn default() -> HopOrder {
        HopOrder::InnermostFirst
    }
}

/// The context of one additional protection layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    #[serde(rename = "RID", with = "serde_bytes")]
    pub rid: Vec<u8>,
    #[serde(rename = "IDCONTEXT", with = "serde_bytes")]
    pub id_context: Vec<u8>,
}

/// An ordered list of additional protection layers and a cursor into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionList {
    /// The OSCORE option of the most recently sealed layer.
    pub inner_option: Vec<u8>,
    consumed: usize,
    hops: Vec<Hop>,
}

impl InstructionList {
    /// Builds a fresh instruction list from pairs of recipient IDs and ID
    /// contexts, which must have the same length.
    pub fn new(
        rids: &[&[u8]],
        id_contexts: &[&[u8]],
    ) -> Result<InstructionList> {
        if rids.len() != id_contexts.len() {
            return Err(Error::MalformedInstruction);
        }
        let hops = rids
            .iter()
            .zip(id_contexts)
            .map(|(rid, id_context)| Hop {
                rid: rid.to_vec(),
                id_context: id_context.to_vec(),
            })
            .collect();

        Ok(InstructionList {
            inner_option: Vec::new(),
            consumed: 0,
            hops,
        })
    }

    /// Returns the cursor, the array index of the next hop.
    pub fn cursor(&self) -> u64 {
        FIRST_HOP_INDEX + self.consumed as u64
    }

    /// Returns all hops in list order.
    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    /// Returns the number of hops that haven't been applied yet.
    pub fn remaining(&self) -> usize {
        self.hops.len() - self.consumed
    }

    /// Returns the hop whose layer is applied next.
    pub fn next_hop(&self, order: HopOrder) -> Option<&Hop> {
        if self.remaining() == 0 {
            return None;
        }
        let index = match order {
            HopOrder::InnermostFirst => self.consumed,
            HopOrder::OutermostFirst => self.hops.len() - 1 - self.consumed,
        };
        self.hops.get(index)
    }

    /// Moves the cursor past the next hop.
    pub fn advance(&mut self) {
        if self.remaining() > 0 {
            self.consumed += 1;
        }
    }
}

impl Serialize for InstructionList {
    fn serialize<S>(
        &self,
        serializer: S,
    ) -> core::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(2 + self.hops.len()))?;
        seq.serialize_element(Bytes::new(&self.inner_option))?;
        seq.serialize_element(&self.cursor())?;
        for hop in &self.hops {
            seq.serialize_element(hop)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for InstructionList {
    fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ListVisitor;

        impl<'de> Visitor<'de> for ListVisitor {
            type Value = InstructionList;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "an OSCORE instruction array")
            }

            fn visit_seq<A>(
                self,
                mut seq: A,
            ) -> core::result::Result<InstructionList, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let inner_option: ByteBuf = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let cursor: u64 = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                let mut hops = Vec::new();
                while let Some(hop) = seq.next_element::<Hop>()? {
                    hops.push(hop);
                }

                // The cursor may point right after the last hop, but not
                // anywhere else outside of them
                if cursor < FIRST_HOP_INDEX
                    || cursor > FIRST_HOP_INDEX + hops.len() as u64
                {
                    return Err(de::Error::custom("cursor out of range"));
                }

                Ok(InstructionList {
                    inner_option: inner_option.into_vec(),
                    consumed: (cursor - FIRST_HOP_INDEX) as usize,
                    hops,
                })
            }
        }

        deserializer.deserialize_seq(ListVisitor)
    }
}

/// The decoded value of an OSCORE option set by the application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionParams {
    pub pairwise_mode: Option<bool>,
    pub context_uri: Option<String>,
    pub rid: Option<Vec<u8>>,
    pub instructions: Option<InstructionList>,
}

impl OptionParams {
    /// Returns the parameters for a request in group or pairwise mode.
    pub fn new(
        pairwise_mode: bool,
        context_uri: &str,
        rid: Option<&[u8]>,
    ) -> OptionParams {
        OptionParams {
            pairwise_mode: Some(pairwise_mode),
            context_uri: Some(String::from(context_uri)),
            rid: rid.map(<[u8]>::to_vec),
            instructions: None,
        }
    }

    /// Returns the parameters carrying only an instruction list.
    pub fn with_instructions(instructions: InstructionList) -> OptionParams {
        OptionParams {
            instructions: Some(instructions),
            ..OptionParams::default()
        }
    }

    /// Returns the CBOR encoded option value.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(cbor::encode(self)?)
    }

    /// Decodes an option value, which must not be empty.
    pub fn decode(value: &[u8]) -> Result<OptionParams> {
        cbor::decode(value).map_err(|_| Error::MalformedInstruction)
    }
}

impl Serialize for OptionParams {
    fn serialize<S>(
        &self,
        serializer: S,
    ) -> core::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = self.pairwise_mode.is_some() as usize
            + self.context_uri.is_some() as usize
            + self.rid.is_some() as usize
            + self.instructions.is_some() as usize;
        let mut map = serializer.serialize_map(Some(len))?;
        if let Some(pairwise_mode) = &self.pairwise_mode {
            map.serialize_entry(&KEY_PAIRWISE_MODE, pairwise_mode)?;
        }
        if let Some(context_uri) = &self.context_uri {
            map.serialize_entry(&KEY_CONTEXT_URI, context_uri)?;
        }
        if let Some(rid) = &self.rid {
            map.serialize_entry(&KEY_RID, Bytes::new(rid))?;
        }
        if let Some(instructions) = &self.instructions {
            map.serialize_entry(&KEY_INSTRUCTIONS, instructions)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for OptionParams {
    fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ParamsVisitor;

        impl<'de> Visitor<'de> for ParamsVisitor {
            type Value = OptionParams;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a map of OSCORE option parameters")
            }

            fn visit_map<A>(
                self,
                mut map: A,
            ) -> core::result::Result<OptionParams, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut params = OptionParams::default();
                while let Some(key) = map.next_key::<u8>()? {
                    match key {
                        KEY_PAIRWISE_MODE => {
                            params.pairwise_mode = Some(map.next_value()?)
                        }
                        KEY_CONTEXT_URI => {
                            params.context_uri = Some(map.next_value()?)
                        }
                        KEY_RID => {
                            let rid: ByteBuf = map.next_value()?;
                            params.rid = Some(rid.into_vec());
                        }
                        KEY_INSTRUCTIONS => {
                            params.instructions = Some(map.next_value()?)
                        }
                        _ => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }

                Ok(params)
            }
        }

        deserializer.deserialize_map(ParamsVisitor)
    }
}

/// Returns the option value carrying a fresh instruction list for the given
/// recipient IDs and ID contexts.
pub fn encode_instructions(
    rids: &[&[u8]],
    id_contexts: &[&[u8]],
) -> Result<Vec<u8>> {
    let list = InstructionList::new(rids, id_contexts)?;
    OptionParams::with_instructions(list).encode()
}

/// Returns whether an OSCORE option value carries an instruction list.
///
/// An absent or empty value carries none, a value that doesn't decode is an
/// error.
pub fn contains_instructions(value: Option<&[u8]>) -> Result<bool> {
    match value {
        None => Ok(false),
        Some(value) if value.is_empty() => Ok(false),
        Some(value) => {
            Ok(OptionParams::decode(value)?.instructions.is_some())
        }
    }
}
