//! The context rederivation procedure of RFC 8613, Appendix B.2.
//!
//! Both peers agree on a new ID context, from which fresh key material is
//! derived with the same master secret and master salt. The client
//! contributes the nonce R1, the server the nonce R2, and the final ID
//! context is R2 || R1.
//!
//! This module only tracks the phases. Whenever a transition requires new
//! key material, it returns the ID context to derive it from and leaves the
//! derivation to the security context.

use alloc::vec::Vec;
use tracing::debug;

use super::{Error, Result};

/// The phase of the rederivation procedure a context is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RederivationPhase {
    /// No procedure is running.
    None,
    /// The client sent a request with its nonce R1 as kid context.
    ClientPhase1,
    /// The client learned R2 || R1 and uses it for its requests.
    ClientPhase2,
    /// The server received a request with an unknown kid context R1.
    ServerPhase1,
    /// The server answers with 4.01 Unauthorized carrying R2 || R1.
    ServerPhase2,
}

/// The state of the rederivation procedure.
#[derive(Debug, Clone)]
pub struct Rederivation {
    phase: RederivationPhase,
    r1: Vec<u8>,
    pending_id_context: Option<Vec<u8>>,
}

impl Default for Rederivation {
    fn default() -> Rederivation {
        Rederivation {
            phase: RederivationPhase::None,
            r1: Vec::new(),
            pending_id_context: None,
        }
    }
}

impl Rederivation {
    /// Returns the current phase.
    pub fn phase(&self) -> RederivationPhase {
        self.phase
    }

    /// Returns whether the next outgoing response has to be the 4.01
    /// challenge.
    pub fn forces_unauthorized(&self) -> bool {
        self.phase == RederivationPhase::ServerPhase2
    }

    /// Returns the kid context to send along with the challenge.
    pub fn pending_id_context(&self) -> Option<&[u8]> {
        match self.phase {
            RederivationPhase::ServerPhase2 => {
                self.pending_id_context.as_deref()
            }
            _ => None,
        }
    }

    /// Starts the procedure on the client with nonce `r1`.
    ///
    /// Returns the ID context to derive the context from.
    pub fn initiate(&mut self, r1: &[u8]) -> Result<Vec<u8>> {
        if self.phase != RederivationPhase::None || r1.is_empty() {
            return Err(Error::ContextRegenerationFailed);
        }
        self.r1 = r1.to_vec();
        self.transition(RederivationPhase::ClientPhase1);

        Ok(self.r1.clone())
    }

    /// Handles the kid context of an incoming request.
    ///
    /// Returns the ID context to rederive the context with before the
    /// request can be decrypted, if any.
    pub fn incoming_request(
        &mut self,
        id_context: Option<&[u8]>,
        kid_context: Option<&[u8]>,
    ) -> Result<Option<Vec<u8>>> {
        let kid_context = match kid_context {
            Some(kid_context) if Some(kid_context) != id_context => {
                kid_context
            }
            // Nothing new from the peer
            _ => return Ok(None),
        };

        match self.phase {
            RederivationPhase::None | RederivationPhase::ServerPhase1 => {
                self.r1 = kid_context.to_vec();
                self.pending_id_context = None;
                self.transition(RederivationPhase::ServerPhase1);
                Ok(Some(self.r1.clone()))
            }
            RederivationPhase::ServerPhase2 => {
                if Some(kid_context) == self.pending_id_context.as_deref() {
                    let id_context = self.pending_id_context.take();
                    self.transition(RederivationPhase::None);
                    Ok(id_context)
                } else {
                    Err(Error::ContextRegenerationFailed)
                }
            }
            // A client doesn't take ID contexts from requests
            RederivationPhase::ClientPhase1
            | RederivationPhase::ClientPhase2 => {
                Err(Error::ContextRegenerationFailed)
            }
        }
    }

    /// Prepares an outgoing response, using `r2` as the server's nonce if
    /// the procedure needs one now.
    pub fn outgoing_response(&mut self, r2: Option<&[u8]>) -> Result<()> {
        if self.phase != RederivationPhase::ServerPhase1 {
            return Ok(());
        }
        let r2 = match r2 {
            Some(r2) if !r2.is_empty() => r2,
            _ => return Err(Error::ContextRegenerationFailed),
        };
        let mut id_context = r2.to_vec();
        id_context.extend_from_slice(&self.r1);
        self.pending_id_context = Some(id_context);
        self.transition(RederivationPhase::ServerPhase2);

        Ok(())
    }

    /// Handles the kid context of a successfully decrypted response.
    ///
    /// Returns the ID context to rederive the context with, if any.
    pub fn incoming_response(
        &mut self,
        kid_context: Option<&[u8]>,
    ) -> Result<Option<Vec<u8>>> {
        match self.phase {
            RederivationPhase::ClientPhase1 => match kid_context {
                Some(id_context)
                    if id_context.len() > self.r1.len()
                        && id_context.ends_with(&self.r1) =>
                {
                    self.transition(RederivationPhase::ClientPhase2);
                    Ok(Some(id_context.to_vec()))
                }
                _ => Err(Error::ContextRegenerationFailed),
            },
            RederivationPhase::ClientPhase2 => {
                self.r1.clear();
                self.transition(RederivationPhase::None);
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn transition(&mut self, phase: RederivationPhase) {
        debug!(from = ?self.phase, to = ?phase, "Context rederivation");
        self.phase = phase;
    }
}
