use alloc::{
    collections::{BTreeMap, LinkedList},
    vec::Vec,
};
use coap_lite::{CoapOption, Packet};
use tracing::{debug, warn};

use super::{
    context::{option_of, ProtectOptions, SecurityContext},
    instruction::{contains_instructions, InstructionList, OptionParams},
    Error, Result,
};

/// Contexts are found by recipient ID and ID context.
type ContextKey = (Vec<u8>, Option<Vec<u8>>);

/// The security contexts of an endpoint.
///
/// Besides resolving the context for incoming requests, it applies the
/// additional protection layers named in an instruction list, each with the
/// context of its hop.
#[derive(Default)]
pub struct ContextDb {
    contexts: BTreeMap<ContextKey, SecurityContext>,
}

impl ContextDb {
    pub fn new() -> ContextDb {
        ContextDb::default()
    }

    /// Adds a context, replacing one with the same recipient ID and ID
    /// context.
    pub fn insert(&mut self, context: SecurityContext) {
        self.contexts.insert(key_of(&context), context);
    }

    /// Removes and returns the context for the given recipient.
    pub fn remove(
        &mut self,
        rid: &[u8],
        id_context: Option<&[u8]>,
    ) -> Option<SecurityContext> {
        self.contexts
            .remove(&(rid.to_vec(), id_context.map(<[u8]>::to_vec)))
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Returns the context for the given recipient.
    pub fn get(
        &self,
        rid: &[u8],
        id_context: Option<&[u8]>,
    ) -> Result<&SecurityContext> {
        self.contexts
            .get(&(rid.to_vec(), id_context.map(<[u8]>::to_vec)))
            .ok_or(Error::ContextMissing)
    }

    /// Protects a request for the recipient `rid` and applies every layer
    /// its instruction list names.
    pub fn protect_request(
        &mut self,
        coap_msg: &[u8],
        rid: &[u8],
        id_context: Option<&[u8]>,
        options: &ProtectOptions,
    ) -> Result<Vec<u8>> {
        let message = Packet::from_bytes(coap_msg)?;
        // Every context is resolved before the first one is touched
        let target = self.exact(rid, id_context)?;
        let hops = match instructions_of(&message)? {
            Some(list) => self.hop_keys(list, options)?,
            None => Vec::new(),
        };

        let mut message = self.with_context(&target, |context| {
            context.protect_outgoing(message, None, options)
        })?;
        for key in &hops {
            debug!(rid = ?key.0, "Adding layer");
            message = self.with_context(key, |context| {
                context.protect_outgoing(message, None, options)
            })?;
        }

        Ok(message.to_bytes()?)
    }

    /// Returns the original CoAP request, using the context the OSCORE
    /// option of the message points to.
    pub fn unprotect_request(
        &mut self,
        oscore_msg: &[u8],
    ) -> Result<Vec<u8>> {
        let option = option_of(&Packet::from_bytes(oscore_msg)?)?;
        let kid = option.kid.ok_or(Error::NoKidPiv)?;
        let key = self.find(&kid, option.kid_context.as_deref())?;

        self.with_context(&key, |context| {
            context.unprotect_request(oscore_msg)
        })
    }

    /// Returns the keys of the contexts for the remaining hops of an
    /// instruction list, in the order their layers are added.
    fn hop_keys(
        &self,
        mut list: InstructionList,
        options: &ProtectOptions,
    ) -> Result<Vec<ContextKey>> {
        let mut keys = Vec::with_capacity(list.remaining());
        while let Some(hop) = list.next_hop(options.hop_order) {
            // An empty ID context names none
            let id_context =
                Some(hop.id_context.as_slice()).filter(|c| !c.is_empty());
            keys.push(self.exact(&hop.rid, id_context)?);
            list.advance();
        }

        Ok(keys)
    }

    /// Returns the key of the context for the recipient if there is one.
    fn exact(
        &self,
        rid: &[u8],
        id_context: Option<&[u8]>,
    ) -> Result<ContextKey> {
        let key = (rid.to_vec(), id_context.map(<[u8]>::to_vec));
        if self.contexts.contains_key(&key) {
            Ok(key)
        } else {
            warn!(?rid, ?id_context, "No security context for recipient");
            Err(Error::ContextMissing)
        }
    }

    /// Returns the key of the context an incoming request is for.
    ///
    /// Without an exact match, the only context of that recipient is used,
    /// since a new ID context might be the start of a rederivation.
    fn find(
        &self,
        rid: &[u8],
        id_context: Option<&[u8]>,
    ) -> Result<ContextKey> {
        let exact = (rid.to_vec(), id_context.map(<[u8]>::to_vec));
        if self.contexts.contains_key(&exact) {
            return Ok(exact);
        }
        let mut candidates =
            self.contexts.keys().filter(|(candidate, _)| candidate == rid);
        match (candidates.next(), candidates.next()) {
            (Some(key), None) => Ok(key.clone()),
            _ => {
                warn!(?rid, "No security context for recipient");
                Err(Error::ContextMissing)
            }
        }
    }

    /// Runs `f` on a context, filing it under its key afterwards since a
    /// rederivation changes its ID context.
    fn with_context<T>(
        &mut self,
        key: &ContextKey,
        f: impl FnOnce(&mut SecurityContext) -> Result<T>,
    ) -> Result<T> {
        let mut context =
            self.contexts.remove(key).ok_or(Error::ContextMissing)?;
        let result = f(&mut context);
        self.insert(context);

        result
    }
}

/// Returns the instruction list in the OSCORE option of a message that
/// hasn't been sealed for the hop yet.
fn instructions_of(message: &Packet) -> Result<Option<InstructionList>> {
    let slot = message
        .get_option(CoapOption::Oscore)
        .and_then(LinkedList::front)
        .map(Vec::as_slice);
    if !contains_instructions(slot)? {
        return Ok(None);
    }

    Ok(slot
        .map(OptionParams::decode)
        .transpose()?
        .and_then(|params| params.instructions))
}

fn key_of(context: &SecurityContext) -> ContextKey {
    (
        context.recipient_id().to_vec(),
        context.id_context().map(<[u8]>::to_vec),
    )
}
