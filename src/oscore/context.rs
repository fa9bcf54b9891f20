use alloc::{collections::LinkedList, vec::Vec};
use coap_lite::{CoapOption, MessageClass, Packet, RequestType, ResponseType};
use tracing::{trace, warn};

use super::{
    classify::{self, class_of, Classified, OptionClass, OptionSet},
    compression::OscoreOption,
    encryption,
    instruction::{contains_instructions, HopOrder, OptionParams},
    plaintext,
    promotion::{self, ALWAYS_OUTER},
    rederivation::{Rederivation, RederivationPhase},
    util::{self, KEY_LEN, MAX_SEQUENCE_NUMBER, NONCE_LEN},
    Error, Result,
};

/// The common context part of the security context.
struct CommonContext {
    // Kept around to derive new keys on rederivation
    master_secret: Vec<u8>,
    master_salt: Vec<u8>,
    id_context: Option<Vec<u8>>,
    common_iv: [u8; NONCE_LEN],
}

/// The sender context part of the security context.
struct SenderContext {
    sender_id: Vec<u8>,
    sender_key: [u8; KEY_LEN],
    sender_sequence_number: u64,
    min_piv_len: usize,
}

/// The recipient context part of the security context.
struct RecipientContext {
    recipient_id: Vec<u8>,
    recipient_key: [u8; KEY_LEN],
    // We're assuming a reliable transport and therefore only store the last
    // received partial IV for simplicity
    replay_window: Option<u64>,
}

/// The security context.
pub struct SecurityContext {
    common_context: CommonContext,
    sender_context: SenderContext,
    recipient_context: RecipientContext,
    responses_include_partial_iv: bool,
    rederivation: Rederivation,
}

/// Per-message settings for protecting a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectOptions {
    /// Whether a response uses a partial IV from the own sender sequence
    /// number instead of the request's. Requests always do.
    pub new_partial_iv: bool,
    /// Whether block-wise transfer happens on the outer message. The Block1
    /// option of a request or the Block2 option of a response then stays
    /// outside the encryption.
    pub outer_blockwise: bool,
    /// Class U options that are never promoted into an additional layer.
    pub keep_outer: Vec<usize>,
    /// The convention for the order of hops in an instruction list.
    pub hop_order: HopOrder,
    /// The server's nonce for the rederivation procedure, required for the
    /// first response after a client started one.
    pub rederivation_nonce: Option<Vec<u8>>,
}

impl Default for ProtectOptions {
    fn default() -> ProtectOptions {
        ProtectOptions {
            new_partial_iv: false,
            outer_blockwise: false,
            keep_outer: ALWAYS_OUTER.to_vec(),
            hop_order: HopOrder::default(),
            rederivation_nonce: None,
        }
    }
}

/// The kid and partial IV of the request a response belongs to.
struct RequestBinding {
    kid: Vec<u8>,
    piv: Vec<u8>,
}

impl RequestBinding {
    /// Extracts the binding from a protected request.
    fn from_request(request: &Packet) -> Result<RequestBinding> {
        let option = option_of(request)?;
        match (option.kid, option.partial_iv) {
            (Some(kid), Some(piv)) => Ok(RequestBinding { kid, piv }),
            // This is a request, so they need to be present
            _ => Err(Error::NoKidPiv),
        }
    }
}

impl SecurityContext {
    /// Creates a new `SecurityContext`.
    pub fn new(
        master_secret: Vec<u8>,
        master_salt: Vec<u8>,
        sender_id: Vec<u8>,
        recipient_id: Vec<u8>,
        id_context: Option<Vec<u8>>,
    ) -> Result<SecurityContext> {
        let derive = |id: &[u8], r#type: &str, l: usize| -> Result<Vec<u8>> {
            util::hkdf(
                &master_secret,
                &master_salt,
                &util::build_info(id, id_context.as_deref(), r#type, l)?,
                l,
            )
        };
        let mut sender_key = [0; KEY_LEN];
        sender_key.copy_from_slice(&derive(&sender_id, "Key", KEY_LEN)?);
        let mut recipient_key = [0; KEY_LEN];
        recipient_key.copy_from_slice(&derive(&recipient_id, "Key", KEY_LEN)?);
        let mut common_iv = [0; NONCE_LEN];
        common_iv.copy_from_slice(&derive(&[], "IV", NONCE_LEN)?);

        Ok(SecurityContext {
            common_context: CommonContext {
                master_secret,
                master_salt,
                id_context,
                common_iv,
            },
            sender_context: SenderContext {
                sender_id,
                sender_key,
                sender_sequence_number: 0,
                min_piv_len: 0,
            },
            recipient_context: RecipientContext {
                recipient_id,
                recipient_key,
                replay_window: None,
            },
            responses_include_partial_iv: false,
            rederivation: Rederivation::default(),
        })
    }

    pub fn sender_id(&self) -> &[u8] {
        &self.sender_context.sender_id
    }

    pub fn recipient_id(&self) -> &[u8] {
        &self.recipient_context.recipient_id
    }

    pub fn id_context(&self) -> Option<&[u8]> {
        self.common_context.id_context.as_deref()
    }

    pub fn sender_sequence_number(&self) -> u64 {
        self.sender_context.sender_sequence_number
    }

    /// Sets the sender sequence number, e.g. when restoring a persisted
    /// context.
    pub fn set_sender_sequence_number(&mut self, n: u64) {
        self.sender_context.sender_sequence_number = n;
    }

    pub fn rederivation_phase(&self) -> RederivationPhase {
        self.rederivation.phase()
    }

    /// Sets whether every response carries a partial IV of its own.
    pub fn set_responses_include_partial_iv(&mut self, include: bool) {
        self.responses_include_partial_iv = include;
    }

    /// Sets the width partial IVs are left-padded to, at most 5 bytes.
    pub fn set_min_partial_iv_len(&mut self, len: usize) {
        self.sender_context.min_piv_len = len.min(util::MAX_PIV_LEN);
    }

    /// Starts the rederivation procedure as a client, switching to key
    /// material derived from the nonce `r1`.
    pub fn initiate_rederivation(&mut self, r1: &[u8]) -> Result<()> {
        let mut rederivation = self.rederivation.clone();
        let id_context = rederivation.initiate(r1)?;
        let mut next = self.rederived(id_context)?;
        next.rederivation = rederivation;
        *self = next;

        Ok(())
    }

    /// Returns an OSCORE message based on the original CoAP request.
    ///
    /// # Arguments
    /// * `coap_msg` - The original CoAP request to protect.
    /// * `options` - How to protect it.
    pub fn protect_request(
        &mut self,
        coap_msg: &[u8],
        options: &ProtectOptions,
    ) -> Result<Vec<u8>> {
        let message = Packet::from_bytes(coap_msg)?;

        Ok(self.protect_outgoing(message, None, options)?.to_bytes()?)
    }

    /// Returns an OSCORE message based on the original CoAP response.
    ///
    /// # Arguments
    /// * `coap_msg` - The original CoAP response to protect.
    /// * `request` - The OSCORE request to which to respond. Necessary to
    ///   extract `kid` and `piv` values.
    /// * `options` - How to protect it.
    pub fn protect_response(
        &mut self,
        coap_msg: &[u8],
        request: &[u8],
        options: &ProtectOptions,
    ) -> Result<Vec<u8>> {
        let message = Packet::from_bytes(coap_msg)?;
        let request = Packet::from_bytes(request)?;

        Ok(self
            .protect_outgoing(message, Some(&request), options)?
            .to_bytes()?)
    }

    /// Protects a message, a response if the protected `request` it answers
    /// is given and a request otherwise.
    ///
    /// If the OSCORE option of the message carries an instruction list, the
    /// layer sealed here is recorded in it and the options for the next hop
    /// are promoted. Nothing in the context changes unless the message is
    /// protected successfully.
    pub fn protect_outgoing(
        &mut self,
        mut message: Packet,
        request: Option<&Packet>,
        options: &ProtectOptions,
    ) -> Result<Packet> {
        let binding = request.map(RequestBinding::from_request).transpose()?;
        let is_response = binding.is_some();

        // Outgoing responses consult the rederivation procedure first
        let mut rederivation = self.rederivation.clone();
        let mut new_piv = !is_response;
        let mut kid_context = if is_response {
            None
        } else {
            self.common_context.id_context.clone()
        };
        if is_response {
            rederivation.outgoing_response(
                options.rederivation_nonce.as_deref(),
            )?;
            new_piv = options.new_partial_iv
                || self.responses_include_partial_iv;
            if rederivation.forces_unauthorized() {
                message.header.code =
                    MessageClass::Response(ResponseType::Unauthorized);
                message.payload.clear();
                new_piv = true;
                kid_context =
                    rederivation.pending_id_context().map(<[u8]>::to_vec);
            }
        }

        // The slot of the OSCORE option might hold instructions
        let slot = message
            .get_option(CoapOption::Oscore)
            .and_then(LinkedList::front)
            .cloned();
        let mut instructions = if contains_instructions(slot.as_deref())? {
            slot.as_deref()
                .map(OptionParams::decode)
                .transpose()?
                .and_then(|params| params.instructions)
        } else {
            None
        };
        message.clear_option(CoapOption::Oscore);

        let all: OptionSet = message
            .options()
            .map(|(&number, values)| (number, values.clone()))
            .collect();
        let outer_block = match (options.outer_blockwise, is_response) {
            (false, _) => None,
            (true, false) => Some(classify::BLOCK1),
            (true, true) => Some(classify::BLOCK2),
        };
        let Classified { mut u, e, held } =
            classify::classify(&all, outer_block);
        let e = match instructions.as_mut() {
            Some(list) => promotion::merge(
                e,
                promotion::promote(&mut u, list, &options.keep_outer),
            ),
            None => e,
        };
        let code: u8 = message.header.code.into();
        let plaintext = plaintext::serialize(&e, &message.payload, code)?;

        // Read the sequence number, but only commit it after sealing
        let reserved = if new_piv {
            Some(self.reserve_piv()?)
        } else {
            None
        };
        let sender_id = &self.sender_context.sender_id;
        let common_iv = &self.common_context.common_iv;
        let (aad, nonce) = match (&binding, &reserved) {
            (None, Some((_, piv))) => (
                util::build_aad(sender_id, piv)?,
                util::compute_nonce(piv, sender_id, common_iv),
            ),
            (Some(binding), Some((_, piv))) => (
                util::build_aad(&binding.kid, &binding.piv)?,
                util::compute_nonce(piv, sender_id, common_iv),
            ),
            // Same nonce as the request
            (Some(binding), None) => (
                util::build_aad(&binding.kid, &binding.piv)?,
                util::compute_nonce(
                    &binding.piv,
                    &self.recipient_context.recipient_id,
                    common_iv,
                ),
            ),
            (None, None) => return Err(Error::NoKidPiv),
        };
        let ciphertext = encryption::seal(
            &self.sender_context.sender_key,
            nonce,
            &aad,
            &plaintext,
        )?;
        let option = OscoreOption {
            partial_iv: reserved.as_ref().map(|(_, piv)| piv.clone()),
            kid_context,
            kid: if is_response {
                None
            } else {
                Some(sender_id.clone())
            },
        }
        .compress()?;

        // Only class U options remain in the outer message
        for &number in all.keys() {
            message.clear_option(CoapOption::from(number));
        }
        for (number, values) in u {
            message.set_option(CoapOption::from(number), values);
        }
        let slot = match instructions {
            Some(mut list) if list.remaining() > 0 => {
                list.inner_option = option;
                OptionParams::with_instructions(list).encode()?
            }
            _ => option,
        };
        message.add_option(CoapOption::Oscore, slot);
        if let Some((number, values)) = held {
            message.set_option(CoapOption::from(number), values);
        }
        message.header.code = if is_response {
            MessageClass::Response(ResponseType::Changed)
        } else {
            MessageClass::Request(RequestType::Post)
        };
        message.payload = ciphertext;

        if let Some((n, _)) = reserved {
            self.sender_context.sender_sequence_number = n + 1;
            trace!(sequence_number = n, "Committed sender sequence number");
        }
        self.rederivation = rederivation;

        Ok(message)
    }

    /// Returns the original CoAP request protected in the OSCORE message.
    ///
    /// # Arguments
    /// * `oscore_msg` - The OSCORE message protecting the CoAP request.
    pub fn unprotect_request(&mut self, oscore_msg: &[u8]) -> Result<Vec<u8>> {
        let original = Packet::from_bytes(oscore_msg)?;
        let option = option_of(&original)?;
        let (kid, piv) = match (&option.kid, &option.partial_iv) {
            (Some(kid), Some(piv)) => (kid, piv),
            _ => return Err(Error::NoKidPiv),
        };
        if kid != &self.recipient_context.recipient_id {
            return Err(Error::ContextMissing);
        }

        // A new kid context needs new keys before decryption, but they're
        // only kept if the request is authentic
        let mut rederivation = self.rederivation.clone();
        let unprotected = match rederivation.incoming_request(
            self.common_context.id_context.as_deref(),
            option.kid_context.as_deref(),
        )? {
            Some(id_context) => {
                let mut next = self.rederived(id_context)?;
                let unprotected = next.open_request(original, kid, piv)?;
                next.rederivation = rederivation;
                *self = next;
                unprotected
            }
            None => {
                let unprotected = self.open_request(original, kid, piv)?;
                self.rederivation = rederivation;
                unprotected
            }
        };

        Ok(unprotected.to_bytes()?)
    }

    /// Returns the original CoAP response protected in the OSCORE message.
    ///
    /// # Arguments
    /// * `oscore_msg` - The OSCORE message protecting the CoAP response.
    /// * `request` - The OSCORE request this is the response to.
    pub fn unprotect_response(
        &mut self,
        oscore_msg: &[u8],
        request: &[u8],
    ) -> Result<Vec<u8>> {
        let original = Packet::from_bytes(oscore_msg)?;
        let binding =
            RequestBinding::from_request(&Packet::from_bytes(request)?)?;
        let option = option_of(&original)?;

        let aad = util::build_aad(&binding.kid, &binding.piv)?;
        let nonce = match &option.partial_iv {
            // Using the server's sender context
            Some(piv) => util::compute_nonce(
                piv,
                &self.recipient_context.recipient_id,
                &self.common_context.common_iv,
            ),
            // Using our kid & piv
            None => util::compute_nonce(
                &binding.piv,
                &self.sender_context.sender_id,
                &self.common_context.common_iv,
            ),
        };
        let unprotected = self.unprotect_message(original, &aad, nonce)?;

        let mut rederivation = self.rederivation.clone();
        match rederivation.incoming_response(option.kid_context.as_deref())? {
            Some(id_context) => {
                let mut next = self.rederived(id_context)?;
                next.rederivation = rederivation;
                *self = next;
            }
            None => self.rederivation = rederivation,
        }

        Ok(unprotected.to_bytes()?)
    }

    /// Decrypts a request after making sure it isn't a replay.
    fn open_request(
        &mut self,
        original: Packet,
        kid: &[u8],
        piv: &[u8],
    ) -> Result<Packet> {
        self.check_replay(piv)?;

        let aad = util::build_aad(kid, piv)?;
        let nonce = util::compute_nonce(
            piv,
            &self.recipient_context.recipient_id,
            &self.common_context.common_iv,
        );
        let unprotected = self.unprotect_message(original, &aad, nonce)?;
        // Remember it only once it's known to be authentic
        self.recipient_context.replay_window = Some(util::piv_to_u64(piv));

        Ok(unprotected)
    }

    /// Returns the original CoAP message protected in the OSCORE message.
    ///
    /// # Arguments
    /// * `original` - The OSCORE message protecting the CoAP message.
    /// * `aad` - The AAD for the AEAD.
    /// * `nonce` - The AEAD nonce to use.
    fn unprotect_message(
        &self,
        mut original: Packet,
        aad: &[u8],
        nonce: [u8; NONCE_LEN],
    ) -> Result<Packet> {
        let plaintext = encryption::open(
            &self.recipient_context.recipient_key,
            nonce,
            aad,
            &original.payload,
        )?;
        let (code, inner_options, payload) =
            plaintext::deserialize(&plaintext)?;

        // Discard the OSCORE option and whatever class E options an
        // intermediary might have added, apart from outer block-wise
        let to_discard: Vec<usize> = original
            .options()
            .map(|(&number, _)| number)
            .filter(|&number| {
                number == classify::OSCORE
                    || (class_of(number) == OptionClass::E
                        && !is_outer_blockwise(number))
            })
            .collect();
        for number in to_discard {
            original.clear_option(CoapOption::from(number));
        }

        for (number, values) in inner_options {
            original.set_option(CoapOption::from(number), values);
        }
        original.header.code = MessageClass::from(code);
        original.payload = payload;

        Ok(original)
    }

    /// Throws an error if the `piv` has been received before.
    fn check_replay(&self, piv: &[u8]) -> Result<()> {
        let piv_64 = util::piv_to_u64(piv);
        if let Some(previous) = self.recipient_context.replay_window {
            if previous == piv_64 {
                warn!(piv = piv_64, "Rejected replayed request");
                #[cfg(not(feature = "no_replay"))]
                return Err(Error::ReplayDetected);
            }
        }

        Ok(())
    }

    /// Returns the current sender sequence number and its partial IV, failing
    /// if it no longer fits.
    fn reserve_piv(&self) -> Result<(u64, Vec<u8>)> {
        let n = self.sender_context.sender_sequence_number;
        if n > MAX_SEQUENCE_NUMBER {
            warn!(sequence_number = n, "Sender sequence number exhausted");
            return Err(Error::SequenceNumberExhausted);
        }

        Ok((n, util::format_piv(n, self.sender_context.min_piv_len)))
    }

    /// Returns a context with the same configuration but key material
    /// derived for `id_context`, with a fresh sequence number and replay
    /// window.
    fn rederived(&self, id_context: Vec<u8>) -> Result<SecurityContext> {
        let mut next = SecurityContext::new(
            self.common_context.master_secret.clone(),
            self.common_context.master_salt.clone(),
            self.sender_context.sender_id.clone(),
            self.recipient_context.recipient_id.clone(),
            Some(id_context),
        )?;
        next.sender_context.min_piv_len = self.sender_context.min_piv_len;
        next.responses_include_partial_iv = self.responses_include_partial_iv;

        Ok(next)
    }
}

/// Returns whether an option may be part of an outer block-wise transfer.
fn is_outer_blockwise(number: usize) -> bool {
    [classify::BLOCK1, classify::BLOCK2, classify::SIZE1, classify::SIZE2]
        .contains(&number)
}

/// Returns the decompressed OSCORE option of a protected message.
pub(crate) fn option_of(message: &Packet) -> Result<OscoreOption> {
    let value = message
        .get_option(CoapOption::Oscore)
        .and_then(LinkedList::front)
        .ok_or(Error::NoOscoreOption)?;

    OscoreOption::decompress(value).map_err(|e| {
        warn!(len = value.len(), "Rejected malformed OSCORE option");
        e
    })
}
